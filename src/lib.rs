//! # Campus Connect
//!
//! A local-first knowledge base and task tracker for Campus Connect
//! exports, with a chat assistant that answers from stored notes and
//! tasks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │   Snapshot   │──▶│    Import    │──▶│  SQLite  │
//! │    (JSON)    │   │ entries+tasks│   │  (Store) │
//! └──────────────┘   └──────────────┘   └────┬─────┘
//!                                            │
//!                 ┌──────────────────────────┤
//!                 ▼                          ▼
//!          ┌─────────────┐           ┌──────────────┐
//!          │ search /    │──────────▶│ agent + LLM  │
//!          │ ranking     │           │  (fallback)  │
//!          └─────────────┘           └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! campus init
//! campus seed --sample
//! campus search-notes --query "fafsa"
//! campus chat
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Library error type |
//! | [`models`] | Core data types and row mapping |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Persistence gateway (SQLite and in-memory) |
//! | [`similarity`] | Fuzzy string similarity |
//! | [`search`] | Knowledge search |
//! | [`ranking`] | Task ranking |
//! | [`knowledge`] | Note creation and listing |
//! | [`tasks`] | Task management and follow-up generation |
//! | [`llm`] | Completion client and offline fallback |
//! | [`agent`] | Question answering over notes and tasks |
//! | [`chat`] | Interactive chat session |
//! | [`import`] | Snapshot import |

pub mod agent;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod knowledge;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod ranking;
pub mod search;
pub mod similarity;
pub mod store;
pub mod tasks;
