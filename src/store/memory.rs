//! In-process document store.
//!
//! Backs the offline demo mode and every test. `deny_writes` flips the
//! store into the degraded-backend posture: reads keep working, every
//! write comes back `PermissionDenied`, which is exactly what a
//! locked-down remote backend looks like to the services. `deny_reads`
//! goes further and fails reads as well, for an unreachable backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreError;

use super::{apply_patch, DocumentStore, StoreEvent, WriteOp};

type Collection = BTreeMap<String, Value>;

#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Collection>>,
    deny_writes: AtomicBool,
    deny_reads: AtomicBool,
    feeds: Mutex<HashMap<String, broadcast::Sender<StoreEvent>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the degraded-backend posture.
    pub fn deny_writes(&self, deny: bool) {
        self.deny_writes.store(deny, Ordering::SeqCst);
    }

    /// Make reads fail too, as an unreachable backend would.
    pub fn deny_reads(&self, deny: bool) {
        self.deny_reads.store(deny, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.deny_writes.load(Ordering::SeqCst) {
            Err(StoreError::PermissionDenied(
                "writes rejected by backend rules".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn check_readable(&self) -> Result<(), StoreError> {
        if self.deny_reads.load(Ordering::SeqCst) {
            Err(StoreError::PermissionDenied(
                "reads rejected by backend rules".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn emit(&self, collection: &str, id: &str, deleted: bool) {
        let feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = feeds.get(collection) {
            let _ = tx.send(StoreEvent {
                collection: collection.to_string(),
                id: id.to_string(),
                deleted,
            });
        }
    }

    /// Number of documents in a collection. Test/diagnostic helper.
    pub fn len(&self, collection: &str) -> usize {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.get(collection).map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.check_readable()?;
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(data.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        self.check_writable()?;
        {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            data.entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), doc);
        }
        self.emit(collection, id, false);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        self.check_writable()?;
        {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            let doc = data
                .get_mut(collection)
                .and_then(|c| c.get_mut(id))
                .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;
            apply_patch(doc, &patch);
        }
        self.emit(collection, id, false);
        Ok(())
    }

    async fn update_if_eq(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &str,
        patch: Value,
    ) -> Result<bool, StoreError> {
        self.check_writable()?;
        let applied = {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            let doc = data
                .get_mut(collection)
                .and_then(|c| c.get_mut(id))
                .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;
            if doc.get(field).and_then(Value::as_str) == Some(expected) {
                apply_patch(doc, &patch);
                true
            } else {
                false
            }
        };
        if applied {
            self.emit(collection, id, false);
        }
        Ok(applied)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            if let Some(c) = data.get_mut(collection) {
                c.remove(id);
            }
        }
        self.emit(collection, id, true);
        Ok(())
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        self.check_readable()?;
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        let hits = data
            .get(collection)
            .map(|c| {
                c.iter()
                    .filter(|(_, doc)| doc.get(field) == Some(value))
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(hits)
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut touched = Vec::with_capacity(ops.len());
        {
            let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
            // validate update targets first so the batch is all-or-nothing
            for op in &ops {
                if let WriteOp::Update { collection, id, .. } = op {
                    let exists = data
                        .get(collection.as_str())
                        .map(|c| c.contains_key(id.as_str()))
                        .unwrap_or(false);
                    if !exists {
                        return Err(StoreError::NotFound(format!("{}/{}", collection, id)));
                    }
                }
            }
            for op in ops {
                match op {
                    WriteOp::Set {
                        collection,
                        id,
                        doc,
                    } => {
                        data.entry(collection.clone())
                            .or_default()
                            .insert(id.clone(), doc);
                        touched.push((collection, id, false));
                    }
                    WriteOp::Update {
                        collection,
                        id,
                        patch,
                    } => {
                        if let Some(doc) =
                            data.get_mut(collection.as_str()).and_then(|c| c.get_mut(id.as_str()))
                        {
                            apply_patch(doc, &patch);
                        }
                        touched.push((collection, id, false));
                    }
                    WriteOp::Delete { collection, id } => {
                        if let Some(c) = data.get_mut(collection.as_str()) {
                            c.remove(id.as_str());
                        }
                        touched.push((collection, id, true));
                    }
                }
            }
        }
        for (collection, id, deleted) in touched {
            self.emit(&collection, &id, deleted);
        }
        Ok(())
    }

    fn watch(&self, collection: &str) -> broadcast::Receiver<StoreEvent> {
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        feeds
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(256).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .set("users", "u1", json!({"id": "u1", "email": "a@b.pk"}))
            .await
            .unwrap();
        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc["email"], "a@b.pk");
    }

    #[tokio::test]
    async fn test_update_merges_scalar_fields() {
        let store = MemoryStore::new();
        store
            .set("listings", "l1", json!({"id": "l1", "isPromoted": false, "price": 500}))
            .await
            .unwrap();
        store
            .update("listings", "l1", json!({"isPromoted": true}))
            .await
            .unwrap();
        let doc = store.get("listings", "l1").await.unwrap().unwrap();
        assert_eq!(doc["isPromoted"], true);
        assert_eq!(doc["price"], 500);
    }

    #[tokio::test]
    async fn test_update_merges_nested_objects_recursively() {
        let store = MemoryStore::new();
        store
            .set(
                "users",
                "u1",
                json!({"id": "u1", "name": "A", "wallet": {"balance": 100, "totalSpend": 50}}),
            )
            .await
            .unwrap();
        store
            .update("users", "u1", json!({"wallet": {"balance": 80}}))
            .await
            .unwrap();
        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc["wallet"]["balance"], 80);
        assert_eq!(doc["wallet"]["totalSpend"], 50);
        assert_eq!(doc["name"], "A");
    }

    #[tokio::test]
    async fn test_update_null_removes_a_field_and_arrays_replace() {
        let store = MemoryStore::new();
        store
            .set(
                "users",
                "u1",
                json!({"id": "u1", "referredBy": "u0", "walletHistory": [{"id": "tx_a"}]}),
            )
            .await
            .unwrap();
        store
            .update(
                "users",
                "u1",
                json!({"referredBy": null, "walletHistory": [{"id": "tx_b"}]}),
            )
            .await
            .unwrap();
        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert!(doc.get("referredBy").is_none());
        assert_eq!(doc["walletHistory"], json!([{"id": "tx_b"}]));
    }

    #[tokio::test]
    async fn test_deny_reads_fails_gets_with_permission_denied() {
        let store = MemoryStore::new();
        store.set("users", "u1", json!({"id": "u1"})).await.unwrap();
        store.deny_reads(true);
        let err = store.get("users", "u1").await.unwrap_err();
        assert!(err.is_permission_denied());
        store.deny_reads(false);
        assert!(store.get("users", "u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_missing_doc_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("listings", "nope", json!({"isPromoted": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_if_eq_is_single_shot() {
        let store = MemoryStore::new();
        store
            .set("deposits", "d1", json!({"id": "d1", "status": "pending"}))
            .await
            .unwrap();
        let first = store
            .update_if_eq("deposits", "d1", "status", "pending", json!({"status": "approved"}))
            .await
            .unwrap();
        let second = store
            .update_if_eq("deposits", "d1", "status", "pending", json!({"status": "approved"}))
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn test_deny_writes_keeps_reads_working() {
        let store = MemoryStore::new();
        store.set("users", "u1", json!({"id": "u1"})).await.unwrap();
        store.deny_writes(true);
        let err = store.set("users", "u2", json!({"id": "u2"})).await.unwrap_err();
        assert!(err.is_permission_denied());
        assert!(store.get("users", "u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        store
            .set("campaigns", "c1", json!({"id": "c1", "status": "pending_approval"}))
            .await
            .unwrap();
        let ops = vec![
            WriteOp::update("campaigns", "c1", json!({"status": "active"})),
            WriteOp::update("listings", "missing", json!({"isPromoted": true})),
        ];
        assert!(store.commit(ops).await.is_err());
        let doc = store.get("campaigns", "c1").await.unwrap().unwrap();
        assert_eq!(doc["status"], "pending_approval");
    }

    #[tokio::test]
    async fn test_query_eq_filters_by_field() {
        let store = MemoryStore::new();
        store
            .set("deposits", "d1", json!({"userId": "u1", "status": "pending"}))
            .await
            .unwrap();
        store
            .set("deposits", "d2", json!({"userId": "u2", "status": "pending"}))
            .await
            .unwrap();
        let hits = store
            .query_eq("deposits", "userId", &json!("u1"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "d1");
    }

    #[tokio::test]
    async fn test_watch_sees_writes() {
        let store = MemoryStore::new();
        let mut feed = store.watch("deposits");
        store.set("deposits", "d1", json!({"id": "d1"})).await.unwrap();
        let event = feed.recv().await.unwrap();
        assert_eq!(event.id, "d1");
        assert!(!event.deleted);
    }
}
