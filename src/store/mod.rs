//! Canonical document store interface.
//!
//! Documents are JSON blobs keyed by id within a named collection. The
//! store offers partial-field updates, atomic multi-document batches and
//! a push-based change feed; permission denial has its own error variant
//! because the fallback layers key off it.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreError;

pub mod memory;

pub use memory::MemoryStore;

/// Conceptual collection names, shared by every backend.
pub mod collections {
    pub const USERS: &str = "users";
    pub const LISTINGS: &str = "listings";
    pub const CAMPAIGNS: &str = "campaigns";
    pub const DEPOSITS: &str = "deposits";
    pub const WITHDRAWALS: &str = "withdrawals";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const SETTINGS: &str = "settings";

    pub const ALL: &[&str] = &[
        USERS,
        LISTINGS,
        CAMPAIGNS,
        DEPOSITS,
        WITHDRAWALS,
        NOTIFICATIONS,
        SETTINGS,
    ];
}

/// One write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Full write/replace.
    Set {
        collection: String,
        id: String,
        doc: Value,
    },
    /// Merge patch into an existing document.
    Update {
        collection: String,
        id: String,
        patch: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    pub fn set(collection: &str, id: impl Into<String>, doc: Value) -> Self {
        WriteOp::Set {
            collection: collection.to_string(),
            id: id.into(),
            doc,
        }
    }

    pub fn update(collection: &str, id: impl Into<String>, patch: Value) -> Self {
        WriteOp::Update {
            collection: collection.to_string(),
            id: id.into(),
            patch,
        }
    }

    pub fn delete(collection: &str, id: impl Into<String>) -> Self {
        WriteOp::Delete {
            collection: collection.to_string(),
            id: id.into(),
        }
    }
}

/// Change-feed event for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub collection: String,
    pub id: String,
    pub deleted: bool,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Merge `patch` into the document with RFC 7396 semantics: nested
    /// objects merge recursively, `null` removes a key, arrays and
    /// scalars replace. `NotFound` if the document does not exist.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError>;

    /// Apply `patch` only when `field` currently equals `expected`.
    /// Returns whether the patch was applied; the check and the write are
    /// one atomic step at the backend.
    async fn update_if_eq(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &str,
        patch: Value,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Filtered scan: documents whose top-level `field` equals `value`.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>, StoreError>;

    /// Atomic batch; all writes land or none do.
    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    /// Push feed of changes to one collection, as observed through this
    /// store instance.
    fn watch(&self, collection: &str) -> broadcast::Receiver<StoreEvent>;
}

/// RFC 7396 merge patch, the same semantics as MySQL's
/// `JSON_MERGE_PATCH`: objects merge recursively, `null` removes a key,
/// anything else (arrays included) replaces the existing value.
pub(crate) fn apply_patch(doc: &mut Value, patch: &Value) {
    let fields = match patch.as_object() {
        Some(fields) => fields,
        None => {
            *doc = patch.clone();
            return;
        }
    };
    if !doc.is_object() {
        *doc = Value::Object(serde_json::Map::new());
    }
    if let Some(target) = doc.as_object_mut() {
        for (key, value) in fields {
            if value.is_null() {
                target.remove(key);
            } else if value.is_object() {
                let child = target
                    .entry(key.clone())
                    .or_insert(Value::Object(serde_json::Map::new()));
                apply_patch(child, value);
            } else {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
