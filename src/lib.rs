//! # filekv - Single-File JSON Key-Value Store
//!
//! An embedded store for scripts and small tools that want persistent state
//! without running a server. The whole mapping lives in one JSON file which
//! every operation reads, changes and writes back in full.
//!
//! ```rust,no_run
//! use filekv::{SearchOptions, Store};
//! use serde_json::{json, Value};
//!
//! let store = Store::new("data/db.json");
//! store.init()?;
//! store.set("fruit", json!(["apple"]))?;
//! store.push("fruit", json!(["orange", "banana"]))?;
//! store.filter("fruit", &SearchOptions::all(|v: &Value| v != "orange"))?;
//! assert_eq!(store.get("fruit")?, json!(["apple", "banana"]));
//! # Ok::<(), filekv::StoreError>(())
//! ```

pub mod config;
pub mod error;
pub mod store;

pub use config::Config;
pub use error::{Result, StoreError};
pub use store::{
    parse_amount, Backend, Document, Ensured, Entry, Found, FsBackend, MemoryBackend,
    SearchOptions, Store,
};
