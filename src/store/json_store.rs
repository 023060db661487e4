//! # JSON File Store
//!
//! [`Store`] is bound to one file path and exposes every operation on the
//! key-value document kept in that file.
//!
//! ## Round trips
//!
//! Each call is self-contained: read the whole file, parse it, apply one
//! change, encode it and write the whole file back. Nothing is cached between
//! calls, the file is the only source of truth.
//!
//! ## Single writer
//!
//! A store holds a `Mutex` for the duration of each round trip. Threads sharing
//! one handle (e.g. through `Arc<Store>`) are serialized, so no update is lost.
//! Separate processes writing the same file are not coordinated.
//!
//! ## Validation
//!
//! Arguments and the loaded document are checked before anything is written;
//! a failed call leaves the file unchanged.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use serde_json::{Number, Value};

use super::backend::{Backend, FsBackend};
use super::document::{value_kind, Document, Entry, MARKER_KEY};
use super::search::{Found, SearchOptions};
use crate::config::Config;
use crate::error::{Result, StoreError};

/// Extension a store file must carry unless configured otherwise
pub const DEFAULT_EXTENSION: &str = "json";

/// Outcome of [`Store::ensure`].
#[derive(Debug, Clone, PartialEq)]
pub enum Ensured {
    /// The key already held a value; nothing was written
    Present,
    /// The key was missing and has been set; carries the new document
    Inserted(Document),
}

/// A key-value store persisted in a single JSON file.
#[derive(Debug)]
pub struct Store<B: Backend = FsBackend> {
    /// Path of the backing file, fixed for the lifetime of the handle
    path: PathBuf,
    backend: B,
    /// Required extension of `path`, without the leading dot
    extension: String,
    /// Write indented JSON
    pretty: bool,
    /// Held for the whole read-modify-write cycle of every operation
    lock: Mutex<()>,
}

impl Store<FsBackend> {
    /// Create a handle for the file at `path`. Nothing is touched until `init()`.
    ///
    /// # Example
    /// ```rust,no_run
    /// use filekv::Store;
    /// use serde_json::json;
    ///
    /// let store = Store::new("data/db.json");
    /// store.init()?;
    /// store.set("visits", json!(1))?;
    /// # Ok::<(), filekv::StoreError>(())
    /// ```
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_backend(path, FsBackend::new())
    }

    /// Create a file-backed handle from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::with_backend(&config.path, FsBackend::with_sync(config.sync))
            .with_extension(&config.extension)
            .with_pretty(config.pretty)
    }
}

impl<B: Backend> Store<B> {
    pub fn with_backend(path: impl Into<PathBuf>, backend: B) -> Self {
        Self {
            path: path.into(),
            backend,
            extension: DEFAULT_EXTENSION.to_string(),
            pretty: false,
            lock: Mutex::new(()),
        }
    }

    /// Require a different file extension. A leading dot is ignored.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prepare the backing file for use.
    ///
    /// Creates the file with an empty document if it does not exist, then
    /// records the initialization marker if it is not already set. Safe to call
    /// any number of times; user keys are never touched.
    ///
    /// # Returns
    /// * `Result<bool>` - The marker value, always `true` on success
    ///
    /// # Errors
    /// * `InvalidFormat` - The path does not have the expected extension
    pub fn init(&self) -> Result<bool> {
        let received = self.backend.extension_of(&self.path);
        if received != self.extension {
            return Err(StoreError::InvalidFormat {
                expected: self.extension.clone(),
                received,
            });
        }

        let _guard = self.guard();
        if !self.backend.exists(&self.path) {
            info!("Creating store file {}", self.path.display());
            self.persist(&Document::new())?;
        }

        let mut doc = self.load()?;
        if !doc.is_initialized() {
            doc.mark_initialized();
            self.persist(&doc)?;
            info!("Initialized store at {}", self.path.display());
        }
        Ok(doc.is_initialized())
    }

    /// Store `value` under `key`, overwriting any previous value.
    ///
    /// Falsy values such as `0`, `false`, `""` or `[]` are stored like any
    /// other; only `null` is rejected since it stands for "no value".
    ///
    /// # Returns
    /// * `Result<Document>` - The document as written
    pub fn set(&self, key: &str, value: Value) -> Result<Document> {
        require_writable_key(key)?;
        require_value(&value)?;
        self.mutate(|doc| {
            doc.insert(key, value)?;
            Ok(())
        })
    }

    /// Value stored under `key`.
    ///
    /// # Errors
    /// * `InvalidKey` - `key` is empty
    /// * `NotFound` - `key` is not present
    pub fn get(&self, key: &str) -> Result<Value> {
        require_key(key)?;
        self.read(|doc| {
            doc.get(key)
                .cloned()
                .ok_or_else(|| StoreError::not_found(format!("no value was found for key '{}'", key)))
        })
    }

    /// Search the document by key and value.
    ///
    /// The predicate sees every user key with its value, in stored order.
    ///
    /// # Returns
    /// * `Found::One` - The first match when `find_all` is false
    /// * `Found::Many` - Every match when `find_all` is true
    ///
    /// # Errors
    /// * `NotFound` - Nothing matched
    pub fn find<F>(&self, options: &SearchOptions<F>) -> Result<Found>
    where
        F: Fn(&str, &Value) -> bool,
    {
        self.read(|doc| {
            let predicate = options.predicate();
            let mut matches = doc.iter().filter(|(key, value)| predicate(key.as_str(), value));

            let found = if options.find_all() {
                let entries: Vec<Entry> = matches.map(to_entry).collect();
                if entries.is_empty() {
                    None
                } else {
                    Some(Found::Many(entries))
                }
            } else {
                matches.next().map(to_entry).map(Found::One)
            };

            found.ok_or_else(|| StoreError::not_found("nothing passes the search predicate"))
        })
    }

    /// Append to the array stored under `key`.
    ///
    /// An array `value` is concatenated; anything else is appended as one
    /// element.
    ///
    /// # Errors
    /// * `InvalidKey` - `key` is empty or not present
    /// * `InvalidValue` - `value` is `null`
    /// * `IllegalOperation` - The stored value is not an array
    pub fn push(&self, key: &str, value: Value) -> Result<Document> {
        require_key(key)?;
        require_value(&value)?;
        self.mutate(|doc| {
            let target = doc
                .get_mut(key)
                .ok_or_else(|| StoreError::invalid_key(format!("key '{}' doesn't exist", key)))?;
            let items = match target {
                Value::Array(items) => items,
                other => {
                    return Err(StoreError::illegal_operation(format!(
                        "cannot push onto a value of type {}",
                        value_kind(other)
                    )))
                }
            };
            match value {
                Value::Array(more) => items.extend(more),
                single => items.push(single),
            }
            Ok(())
        })
    }

    /// Add `amount` (default 1) to the number stored under `key`.
    ///
    /// # Errors
    /// * `InvalidKey` - `key` is empty or not present
    /// * `IllegalOperation` - The stored value is not a number, or the result
    ///   does not fit
    pub fn add(&self, key: &str, amount: Option<i64>) -> Result<Document> {
        self.apply_delta(key, amount.unwrap_or(1), "add to")
    }

    /// Subtract `amount` (default 1) from the number stored under `key`.
    ///
    /// Same errors as [`add`](Self::add).
    pub fn subtract(&self, key: &str, amount: Option<i64>) -> Result<Document> {
        let amount = amount.unwrap_or(1);
        let delta = amount.checked_neg().ok_or_else(|| {
            StoreError::illegal_operation(format!("cannot subtract {}", amount))
        })?;
        self.apply_delta(key, delta, "subtract from")
    }

    fn apply_delta(&self, key: &str, delta: i64, verb: &str) -> Result<Document> {
        require_key(key)?;
        self.mutate(|doc| {
            let target = doc
                .get_mut(key)
                .ok_or_else(|| StoreError::invalid_key(format!("key '{}' doesn't exist", key)))?;
            let next = match target {
                Value::Number(n) => offset_number(n, delta).ok_or_else(|| {
                    StoreError::illegal_operation(format!(
                        "result of adjusting {} by {} is out of range",
                        n, delta
                    ))
                })?,
                other => {
                    return Err(StoreError::illegal_operation(format!(
                        "cannot {} a value of type {}, only numbers are allowed",
                        verb,
                        value_kind(other)
                    )))
                }
            };
            *target = next;
            Ok(())
        })
    }

    /// Remove `key` and its value.
    ///
    /// # Errors
    /// * `InvalidKey` - `key` is empty or not present
    pub fn delete(&self, key: &str) -> Result<Document> {
        require_key(key)?;
        self.mutate(|doc| {
            doc.remove(key)
                .map(|_| ())
                .ok_or_else(|| StoreError::invalid_key(format!("key '{}' does not exist", key)))
        })
    }

    /// Replace the whole document with an empty one.
    ///
    /// The marker is wiped as well: the store must be initialized again before
    /// any other operation succeeds.
    pub fn clear(&self) -> Result<bool> {
        let _guard = self.guard();
        self.load_initialized()?;
        self.persist(&Document::new())?;
        info!("Cleared store at {}", self.path.display());
        Ok(true)
    }

    /// User keys in stored order.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.read(|doc| Ok(doc.keys()))
    }

    /// User values in stored order.
    pub fn values(&self) -> Result<Vec<Value>> {
        self.read(|doc| Ok(doc.values()))
    }

    /// Every user key with its value, in stored order.
    pub fn all(&self) -> Result<Vec<Entry>> {
        self.read(|doc| Ok(doc.entries()))
    }

    /// Whether `key` holds a value. Falsy values count as present.
    pub fn has(&self, key: &str) -> Result<bool> {
        require_key(key)?;
        self.read(|doc| Ok(doc.contains_key(key)))
    }

    /// Make sure `key` holds a value, setting it to `value` if it does not.
    ///
    /// Check and insert happen in a single round trip.
    ///
    /// # Errors
    /// * `InvalidKey` - `key` is empty or reserved
    /// * `InvalidValue` - `key` is missing and `value` is absent or `null`
    pub fn ensure(&self, key: &str, value: Option<Value>) -> Result<Ensured> {
        require_key(key)?;
        let _guard = self.guard();
        let mut doc = self.load_initialized()?;
        if doc.contains_key(key) {
            return Ok(Ensured::Present);
        }

        require_writable_key(key)?;
        let value = value.ok_or_else(|| {
            StoreError::invalid_value(format!("key '{}' does not exist but no value was given", key))
        })?;
        require_value(&value)?;

        doc.insert(key, value)?;
        self.persist(&doc)?;
        Ok(Ensured::Inserted(doc))
    }

    /// Keep only the elements of the array under `key` that satisfy the
    /// predicate.
    ///
    /// # Errors
    /// * `InvalidKey` - `key` is empty or not present
    /// * `IllegalOperation` - The stored value is not an array
    pub fn filter<F>(&self, key: &str, options: &SearchOptions<F>) -> Result<Document>
    where
        F: Fn(&Value) -> bool,
    {
        require_key(key)?;
        self.mutate(|doc| {
            let target = doc
                .get_mut(key)
                .ok_or_else(|| StoreError::invalid_key(format!("no match for key '{}' was found", key)))?;
            match target {
                Value::Array(items) => {
                    let predicate = options.predicate();
                    items.retain(|item| predicate(item));
                    Ok(())
                }
                other => Err(StoreError::illegal_operation(format!(
                    "cannot filter a value of type {}",
                    value_kind(other)
                ))),
            }
        })
    }

    /// Number of user keys; the marker is not counted.
    pub fn count(&self) -> Result<usize> {
        self.read(|doc| Ok(doc.len()))
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The lock protects no data, so a panic elsewhere cannot leave it inconsistent
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> Result<Document> {
        let bytes = self.backend.read_all(&self.path)?;
        debug!("Read {} bytes from {}", bytes.len(), self.path.display());
        Document::from_slice(&bytes)
    }

    fn load_initialized(&self) -> Result<Document> {
        if !self.backend.exists(&self.path) {
            warn!("Store file {} does not exist", self.path.display());
            return Err(StoreError::NotInitialized);
        }
        let doc = self.load()?;
        if !doc.is_initialized() {
            warn!("Store at {} is not initialized", self.path.display());
            return Err(StoreError::NotInitialized);
        }
        Ok(doc)
    }

    fn persist(&self, doc: &Document) -> Result<()> {
        let bytes = doc.to_bytes(self.pretty)?;
        self.backend.write_all(&self.path, &bytes)?;
        Ok(())
    }

    /// Run `f` against the loaded document without writing.
    fn read<T>(&self, f: impl FnOnce(&Document) -> Result<T>) -> Result<T> {
        let _guard = self.guard();
        let doc = self.load_initialized()?;
        f(&doc)
    }

    /// Load, change, persist. Nothing is written if `f` fails.
    fn mutate(&self, f: impl FnOnce(&mut Document) -> Result<()>) -> Result<Document> {
        let _guard = self.guard();
        let mut doc = self.load_initialized()?;
        f(&mut doc)?;
        self.persist(&doc)?;
        Ok(doc)
    }
}

/// Lenient integer parsing for textual amounts.
///
/// Leading whitespace and an optional sign are accepted, then as many digits
/// as are present; trailing garbage is ignored (`"12abc"` is 12, `"4.7"` is 4).
/// Input without a leading integer, or one that overflows, yields 1.
pub fn parse_amount(text: &str) -> i64 {
    let text = text.trim_start();
    let digits_start = usize::from(text.starts_with(['+', '-']));
    let digits_len = text[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return 1;
    }
    text[..digits_start + digits_len].parse().unwrap_or(1)
}

fn require_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StoreError::invalid_key("key not given"));
    }
    Ok(())
}

fn require_writable_key(key: &str) -> Result<()> {
    require_key(key)?;
    if key == MARKER_KEY {
        return Err(StoreError::invalid_key(format!(
            "'{}' is reserved by the store",
            MARKER_KEY
        )));
    }
    Ok(())
}

fn require_value(value: &Value) -> Result<()> {
    if value.is_null() {
        return Err(StoreError::invalid_value("value not given"));
    }
    Ok(())
}

fn to_entry((key, value): (&String, &Value)) -> Entry {
    Entry {
        key: key.clone(),
        value: value.clone(),
    }
}

/// `n + delta`, keeping integers integral. `None` on overflow.
fn offset_number(n: &Number, delta: i64) -> Option<Value> {
    let int = n
        .as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from));
    if let Some(int) = int {
        let sum = int + i128::from(delta);
        return match i64::try_from(sum) {
            Ok(i) => Some(Value::from(i)),
            Err(_) => u64::try_from(sum).ok().map(Value::from),
        };
    }
    n.as_f64()
        .and_then(|f| Number::from_f64(f + delta as f64))
        .map(Value::Number)
}
