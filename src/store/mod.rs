//! # Storage Module
//!
//! This module contains the storage components for filekv:
//!
//! - **`backend`**: Byte-store interface plus file-system and in-memory backends
//! - **`document`**: The parsed file contents and the initialization marker
//! - **`search`**: Predicate options for `find` and `filter`
//! - **`json_store`**: The `Store` handle and every public operation
//!
//! ## Design Philosophy
//!
//! The store owns no copy of the data. Each operation reads the whole file,
//! changes it and writes it back through a `Backend`, so swapping the backend
//! swaps where bytes live without touching any operation.

pub mod backend;
pub mod document;
pub mod json_store;
pub mod search;

// Re-export the store surface for convenience
pub use backend::{Backend, FsBackend, MemoryBackend};
pub use document::{Document, Entry, MARKER_KEY};
pub use json_store::{parse_amount, Ensured, Store, DEFAULT_EXTENSION};
pub use search::{Found, SearchOptions, SearchOptionsBuilder};
