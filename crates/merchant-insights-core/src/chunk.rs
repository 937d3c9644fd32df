//! Record normalizer: tabular rows to chunk text.
//!
//! Turns each row of each [`RecordSource`] into one [`Chunk`] whose text
//! enumerates every column in declared order:
//!
//! ```text
//! <source-name> | <col1>: <val1> | <col2>: <val2> | ...
//! ```
//!
//! Chunk text is a pure function of the source name, the column list, and
//! the row, so identical input always yields byte-identical output.
//!
//! # Decoding
//!
//! [`decode_source`] turns raw file bytes into a [`RecordSource`]:
//!
//! 1. Strip a UTF-8 BOM if present and decode as strict UTF-8.
//! 2. On failure, decode the same BOM-stripped bytes as ISO-8859-1, mapping
//!    each byte to the code point of equal value. This accepts every input.
//! 3. Parse the text as CSV with a header row. Rows shorter than the header
//!    are kept and their missing cells render as empty values; a row longer
//!    than the header is an error.
//!
//! # Example
//!
//! ```rust
//! use merchant_insights_core::chunk::{chunk_sources, decode_source};
//!
//! let source = decode_source("txns.csv", b"amount,status\n100,refunded\n").unwrap();
//! let chunks = chunk_sources(&[source]);
//! assert_eq!(chunks[0].text, "txns.csv | amount: 100 | status: refunded");
//! ```

use std::borrow::Cow;

use encoding_rs::{mem::decode_latin1, UTF_8};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::SourceReadError;
use crate::models::{Chunk, RecordSource};

/// Separator between the source name and each `column: value` segment.
pub const SEGMENT_SEPARATOR: &str = " | ";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Encoding a source was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    /// ISO-8859-1.
    Latin1,
}

impl SourceEncoding {
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Latin1 => "ISO-8859-1",
        }
    }
}

/// Decode raw CSV bytes into a [`RecordSource`].
///
/// # Errors
///
/// - [`SourceReadError::Empty`] if the input has no header row.
/// - [`SourceReadError::ExtraFields`] if a row has more fields than the header.
/// - [`SourceReadError::Csv`] if the CSV is otherwise malformed.
pub fn decode_source(name: &str, bytes: &[u8]) -> Result<RecordSource, SourceReadError> {
    let (text, encoding) = decode_text(bytes);
    if encoding != SourceEncoding::Utf8 {
        warn!(
            source = name,
            encoding = encoding.name(),
            "source is not valid UTF-8, used fallback"
        );
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let csv_err = |source| SourceReadError::Csv {
        name: name.to_string(),
        source,
    };

    let columns: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    if columns.is_empty() {
        return Err(SourceReadError::Empty {
            name: name.to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        if record.len() > columns.len() {
            return Err(SourceReadError::ExtraFields {
                name: name.to_string(),
                line: record.position().map_or(0, |p| p.line()),
                found: record.len(),
                expected: columns.len(),
            });
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RecordSource::new(name, columns, rows))
}

/// Decode bytes as UTF-8, falling back to ISO-8859-1.
///
/// A leading UTF-8 BOM is dropped under either encoding. Returns the decoded
/// text and the encoding that produced it.
pub fn decode_text(bytes: &[u8]) -> (Cow<'_, str>, SourceEncoding) {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match UTF_8.decode_without_bom_handling_and_without_replacement(body) {
        Some(text) => (text, SourceEncoding::Utf8),
        None => (decode_latin1(body), SourceEncoding::Latin1),
    }
}

/// Render one row as chunk text.
///
/// Cells are used verbatim. A row shorter than `columns` renders the
/// missing cells as empty values.
pub fn chunk_row(source_name: &str, columns: &[String], row: &[String]) -> String {
    let mut text = String::from(source_name);
    for (i, column) in columns.iter().enumerate() {
        let value = row.get(i).map(String::as_str).unwrap_or_default();
        text.push_str(SEGMENT_SEPARATOR);
        text.push_str(column);
        text.push_str(": ");
        text.push_str(value);
    }
    text
}

/// Normalize every row of one source, in row order.
pub fn chunk_source(source: &RecordSource) -> Vec<Chunk> {
    source
        .rows
        .iter()
        .enumerate()
        .map(|(row, cells)| Chunk {
            source: source.name.clone(),
            row,
            text: chunk_row(&source.name, &source.columns, cells),
        })
        .collect()
}

/// Normalize every source, in source-then-row order.
pub fn chunk_sources(sources: &[RecordSource]) -> Vec<Chunk> {
    sources.iter().flat_map(chunk_source).collect()
}

/// SHA-256 over the ordered chunk texts, lowercase hex.
///
/// Identical input yields an identical fingerprint.
pub fn corpus_fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.text.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
