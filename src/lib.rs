//! # StratumDB
//!
//! An embeddable, persistent key-value store built on a layered
//! **Log-Structured Merge Tree (LSM-tree)** storage engine, fronted by a
//! text-line TCP/UDP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      Engine façade (C7)                     │
//! │  ┌───────────────┐   ┌──────────────────┐   ┌────────────┐ │
//! │  │  LSM           │   │  Write-ahead     │   │  Partitioned│ │
//! │  │  coordinator    │   │  log (C5)        │   │  snapshot   │ │
//! │  │  (C1-C4)        │◄──┤                  │   │  store (C6) │ │
//! │  └───────┬─────────┘   └──────────────────┘   └──────┬──────┘ │
//! │          │ flush/compact                               │ cold │
//! │          ▼                                             │ load │
//! │  ┌────────────────┐                                    ▼      │
//! │  │  Sorted blocks  │  (in-process only, never persisted)      │
//! │  └────────────────┘                                           │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`pair`] | The fundamental key/value/tombstone unit |
//! | [`encoding`] | Deterministic binary framing for sorted-block records |
//! | [`memtable`] | In-memory ordered write buffer |
//! | [`sstable`] | Immutable, sparse-indexed, in-process sorted run |
//! | [`bloom`] | Probabilistic membership filter |
//! | [`engine`] | LSM coordinator: put/get/delete, flush, background compaction |
//! | [`wal`] | Text-format, crash-safe write-ahead log |
//! | [`snapshot`] | Hash-partitioned persistent key→value store |
//! | [`facade`] | Composes the above into one recoverable put/get/delete surface |
//! | [`config`] | Layered configuration loading |
//! | [`server`] | TCP/UDP front end |
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use stratumdb::config::{DbEngineConfig, DiskStoreConfig};
//! use stratumdb::facade::EngineFacade;
//!
//! let facade = EngineFacade::start(&DbEngineConfig::default(), &DiskStoreConfig::default()).unwrap();
//! facade.put("hello", "world").unwrap();
//! assert_eq!(facade.get("hello").unwrap(), Some("world".to_string()));
//! facade.delete("hello").unwrap();
//! assert_eq!(facade.get("hello").unwrap(), None);
//! facade.shutdown().unwrap();
//! ```

pub mod bloom;
pub mod config;
pub mod encoding;
pub mod engine;
pub mod facade;
pub mod memtable;
pub mod pair;
pub mod server;
pub mod snapshot;
pub mod sstable;
pub mod wal;
