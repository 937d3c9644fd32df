//! Record source loading and listing.
//!
//! Reads every configured CSV file in full and decodes it with
//! [`decode_source`]. Any source that cannot be read aborts the load.

use anyhow::Result;
use merchant_insights_core::chunk::decode_source;
use merchant_insights_core::models::RecordSource;
use merchant_insights_core::SourceReadError;
use tracing::info;

use crate::config::{Config, SourceConfig};

/// Read and decode one configured source.
pub fn load_source(source: &SourceConfig) -> Result<RecordSource, SourceReadError> {
    let name = source.display_name();
    let bytes = std::fs::read(&source.path).map_err(|e| SourceReadError::Io {
        name: name.clone(),
        source: e,
    })?;
    let record = decode_source(&name, &bytes)?;
    info!(
        source = %name,
        rows = record.len(),
        columns = record.columns.len(),
        "loaded source"
    );
    Ok(record)
}

/// Read every configured source, in configuration order.
pub fn load_sources(sources: &[SourceConfig]) -> Result<Vec<RecordSource>, SourceReadError> {
    sources.iter().map(load_source).collect()
}

/// Print each configured source with its shape, or why it failed to load.
pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<32} {:>8} {:>8}  STATUS", "SOURCE", "ROWS", "COLUMNS");
    let mut failures = 0;
    for source in &config.sources {
        match load_source(source) {
            Ok(record) => println!(
                "{:<32} {:>8} {:>8}  OK",
                record.name,
                record.len(),
                record.columns.len()
            ),
            Err(e) => {
                failures += 1;
                println!("{:<32} {:>8} {:>8}  ERROR: {}", source.display_name(), "-", "-", e);
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{} source(s) failed to load", failures);
    }
    Ok(())
}
