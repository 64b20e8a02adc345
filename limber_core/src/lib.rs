#![forbid(unsafe_code)]

//! Core domain model and business logic for Limber, a stretch and exercise
//! tracker.
//!
//! This crate provides:
//! - Domain types (catalog items, regimens, history entries, session view)
//! - Catalog parsing, validation and version-aware caching
//! - Regimen resolution by weekday
//! - Session materialization from template plus history
//! - History persistence (JSONL store) and CSV export

pub mod types;
pub mod error;
pub mod catalog;
pub mod loader;
pub mod config;
pub mod logging;
pub mod regimen;
pub mod session;
pub mod history;
pub mod csv_export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{parse_catalog, DEFAULT_CATALOG_YAML};
pub use config::Config;
pub use loader::{CatalogLoader, CatalogSnapshot, CatalogSource, FileSource};
pub use regimen::{resolve_for_day, select_items, Selection, SelectedItems};
pub use session::{build_session, SessionDate};
pub use history::{HistoryStore, InMemoryHistoryStore, JsonlHistoryStore};
