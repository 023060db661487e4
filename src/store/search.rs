//! # Search Options
//!
//! `find()` and `filter()` take a predicate plus a flag saying whether to stop
//! at the first match. The options are transient and never persisted.
//!
//! ```rust
//! use filekv::SearchOptions;
//! use serde_json::Value;
//!
//! // First key starting with "user:"
//! let opts = SearchOptions::first(|key: &str, _: &Value| key.starts_with("user:"));
//! assert!(!opts.find_all());
//! ```

use std::fmt;

use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::store::document::Entry;

/// A predicate and a first-vs-all flag.
///
/// For `find()` the predicate is `Fn(&str, &Value) -> bool` and sees each key
/// with its value. For `filter()` it is `Fn(&Value) -> bool` and sees each
/// array element.
#[derive(Clone)]
pub struct SearchOptions<F> {
    predicate: F,
    find_all: bool,
}

impl<F> SearchOptions<F> {
    pub fn new(predicate: F, find_all: bool) -> Self {
        Self {
            predicate,
            find_all,
        }
    }

    /// Stop at the first match.
    pub fn first(predicate: F) -> Self {
        Self::new(predicate, false)
    }

    /// Collect every match.
    pub fn all(predicate: F) -> Self {
        Self::new(predicate, true)
    }

    /// Start building options piece by piece, e.g. from parsed user input.
    pub fn builder() -> SearchOptionsBuilder<F> {
        SearchOptionsBuilder::default()
    }

    pub fn find_all(&self) -> bool {
        self.find_all
    }

    pub fn predicate(&self) -> &F {
        &self.predicate
    }
}

impl<F> fmt::Debug for SearchOptions<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchOptions")
            .field("find_all", &self.find_all)
            .finish_non_exhaustive()
    }
}

/// Builder that reports `Validation` when a field is left unset.
pub struct SearchOptionsBuilder<F> {
    predicate: Option<F>,
    find_all: Option<bool>,
}

impl<F> Default for SearchOptionsBuilder<F> {
    fn default() -> Self {
        Self {
            predicate: None,
            find_all: None,
        }
    }
}

impl<F> SearchOptionsBuilder<F> {
    pub fn predicate(mut self, predicate: F) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn find_all(mut self, find_all: bool) -> Self {
        self.find_all = Some(find_all);
        self
    }

    pub fn build(self) -> Result<SearchOptions<F>> {
        let predicate = self
            .predicate
            .ok_or_else(|| StoreError::validation("search options are missing a predicate"))?;
        let find_all = self
            .find_all
            .ok_or_else(|| StoreError::validation("search options are missing the find_all flag"))?;
        Ok(SearchOptions::new(predicate, find_all))
    }
}

/// Outcome of `find()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Found {
    /// First match, when `find_all` was false
    One(Entry),
    /// Every match in stored order, when `find_all` was true
    Many(Vec<Entry>),
}

impl Found {
    pub fn into_entries(self) -> Vec<Entry> {
        match self {
            Found::One(entry) => vec![entry],
            Found::Many(entries) => entries,
        }
    }
}
