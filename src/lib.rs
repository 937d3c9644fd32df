//! # Merchant Insights
//!
//! A retrieval-augmented chatbot over merchant payment data.
//!
//! Payment CSVs (transactions, refunds, settlements, support tickets) are
//! read once at startup, normalized into one text chunk per row, embedded,
//! and held in an exact in-memory vector index. Questions are answered by
//! retrieving the nearest chunks and handing them to a completion model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  CSV files  │──▶│  Normalize   │──▶│ Embed + Index│
//! │ (sources)   │   │  row→chunk   │   │  (Pipeline)  │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │ Ready
//!                      ┌──────────────────────┤
//!                      ▼                      ▼
//!                 ┌──────────┐          ┌──────────┐
//!                 │   CLI    │          │   HTTP   │
//!                 │(insights)│          │  /ask    │
//!                 └──────────┘          └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! insights chunks --limit 5          # inspect normalized rows
//! insights retrieve "failed refunds" # ranked chunks with distances
//! insights ask "Why was UTR123 not settled?"
//! insights serve                     # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`sources`] | CSV source loading |
//! | [`openai`] | Shared OpenAI HTTP client |
//! | [`embedding`] | OpenAI embedding provider |
//! | [`synthesize`] | Answer synthesis |
//! | [`commands`] | Startup and one-shot commands |
//! | [`server`] | HTTP server |

pub mod commands;
pub mod config;
pub mod embedding;
pub mod openai;
pub mod server;
pub mod sources;
pub mod synthesize;

#[cfg(test)]
mod testing;
