//! # docqa
//!
//! Cited question answering over a fixed corpus of technical documents.
//!
//! Passages produced by an external chunker are imported into SQLite,
//! embedded, and served through a retrieval pipeline that either trusts
//! semantic similarity alone (baseline) or re-ranks a wider semantic pool
//! with BM25 (hybrid). Answers are extracted sentences with numbered
//! sources, or an explicit abstention with a reason.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────────┐   ┌───────────┐
//! │ JSON      │──▶│ import +    │──▶│  SQLite   │
//! │ passages  │   │ embed       │   │ + vectors │
//! └───────────┘   └─────────────┘   └─────┬─────┘
//!                                         │ load once
//!                      ┌──────────────────┤
//!                      ▼                  ▼
//!                 ┌──────────┐      ┌──────────┐
//!                 │   CLI    │      │   HTTP   │
//!                 │ (docqa)  │      │  /ask    │
//!                 └──────────┘      └──────────┘
//! ```
//!
//! The ranking and answer logic lives in the `docqa-core` crate.
//!
//! ## Quick Start
//!
//! ```bash
//! docqa init
//! docqa import passages.json
//! docqa embed pending
//! docqa ask "What is ISO 13849-1?" --mode hybrid
//! docqa serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Passage and embedding queries |
//! | [`import`] | JSON passage import |
//! | [`embedding`] | Embedding providers |
//! | [`embed_cmd`] | Embedding backfill |
//! | [`retriever`] | Embedding-backed retriever and engine loading |
//! | [`ask`] | `ask` and `compare` commands |
//! | [`stats`] | Corpus statistics |
//! | [`server`] | HTTP server |

pub mod ask;
pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod import;
pub mod migrate;
pub mod retriever;
pub mod server;
pub mod stats;
pub mod store;
