//! # VaultStore: Document Store for Indexed Vaults
//!
//! Indexed vaults live in sled, one tree per collection. A collection is a
//! factory suffix (`sudostake.near`), so each deployment's vaults are kept
//! and queried separately.
//!
//! ## Tree Layout
//!
//! | Tree                 | Key                  | Value                              |
//! |----------------------|----------------------|------------------------------------|
//! | `vaults/<suffix>`    | vault id (UTF-8)     | `json(TransformedVaultState)`      |
//!
//! Values are stored as JSON rather than a binary encoding because queries
//! address fields by path (`accepted_offer.lender`) and need a
//! self-describing document to walk.
//!
//! ## Queries
//!
//! Queries are full scans of one collection with an equality filter and an
//! optional sort. Collections hold one document per vault of a single
//! factory, which keeps scans small.

use serde_json::Value;
use sled::{Db, Tree};
use std::cmp::Ordering;
use std::path::Path;

use crate::vault::{TransformedVaultState, VaultDocument};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Prefix for collection tree names.
const COLLECTION_PREFIX: &str = "vaults/";

// ---------------------------------------------------------------------------
// VaultStore
// ---------------------------------------------------------------------------

/// Persistent document store for transformed vault states.
///
/// sled is internally synchronized, so a `VaultStore` can be shared across
/// tasks via `Arc` (or cloned, which shares the same handle).
#[derive(Debug, Clone)]
pub struct VaultStore {
    db: Db,
}

impl VaultStore {
    /// Open or create a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// Create a temporary in-memory store, removed on drop.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn collection(&self, name: &str) -> StoreResult<Tree> {
        Ok(self.db.open_tree(format!("{}{}", COLLECTION_PREFIX, name))?)
    }

    // -- Documents ----------------------------------------------------------

    /// Insert or replace the document `key` in `collection`.
    pub fn write(
        &self,
        collection: &str,
        key: &str,
        value: &TransformedVaultState,
    ) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tree = self.collection(collection)?;
        tree.insert(key.as_bytes(), bytes)?;
        tree.flush()?;
        Ok(())
    }

    /// Read a single document.
    pub fn get(&self, collection: &str, key: &str) -> StoreResult<Option<TransformedVaultState>> {
        match self.collection(collection)?.get(key.as_bytes())? {
            Some(bytes) => {
                let state = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        Ok(self.collection(collection)?.len())
    }

    /// Names of collections that have been written to or queried.
    pub fn collections(&self) -> Vec<String> {
        self.db
            .tree_names()
            .into_iter()
            .filter_map(|name| {
                std::str::from_utf8(&name)
                    .ok()
                    .and_then(|n| n.strip_prefix(COLLECTION_PREFIX))
                    .map(str::to_string)
            })
            .collect()
    }

    /// Block until all pending writes are durable.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    // -- Queries ------------------------------------------------------------

    /// Documents whose `field` (a dotted path) equals `value`, in key order.
    pub fn query_by_equality(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<VaultDocument>> {
        let matches = self.scan(collection, |doc| lookup(doc, field) == Some(value))?;
        matches.into_iter().map(|(id, doc)| into_document(id, doc)).collect()
    }

    /// Like [`query_by_equality`](Self::query_by_equality), sorted by
    /// `order_field`. Documents without `order_field` are left out.
    pub fn query_by_equality_ordered(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        order_field: &str,
        direction: SortDirection,
    ) -> StoreResult<Vec<VaultDocument>> {
        let mut matches = self.scan(collection, |doc| {
            lookup(doc, field) == Some(value) && lookup(doc, order_field).is_some()
        })?;

        matches.sort_by(|(_, a), (_, b)| {
            let ord = match (lookup(a, order_field), lookup(b, order_field)) {
                (Some(x), Some(y)) => compare_values(x, y),
                _ => Ordering::Equal,
            };
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });

        matches.into_iter().map(|(id, doc)| into_document(id, doc)).collect()
    }

    fn scan<F>(&self, collection: &str, keep: F) -> StoreResult<Vec<(String, Value)>>
    where
        F: Fn(&Value) -> bool,
    {
        let mut out = Vec::new();
        for entry in self.collection(collection)?.iter() {
            let (key, bytes) = entry?;
            let doc: Value = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if keep(&doc) {
                let id = String::from_utf8(key.to_vec())
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                out.push((id, doc));
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve a dotted field path (`accepted_offer.lender`) inside a document.
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |node, segment| node.get(segment))
}

/// Total order over JSON values: null < bool < number < string < array < object.
/// Numbers compare numerically, strings lexicographically.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x.cmp(&y)
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x.cmp(&y)
            } else {
                let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn into_document(id: String, doc: Value) -> StoreResult<VaultDocument> {
    let vault = serde_json::from_value(doc).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(VaultDocument { id, vault })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
