//! Best-effort notification emitter.
//!
//! Notifications are informational only: a failed write is logged and
//! dropped, never retried and never mirrored locally. Financial and
//! promotional state gets a fallback path; these do not.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::error::StoreError;
use crate::models::notification::{Notification, NotificationKind};
use crate::store::{collections, DocumentStore, WriteOp};

pub struct Notifier {
    store: Arc<dyn DocumentStore>,
}

impl Notifier {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Build the store write for a notification, for inclusion in a batch.
    pub fn write_op(notification: &Notification) -> Result<WriteOp, StoreError> {
        Ok(WriteOp::set(
            collections::NOTIFICATIONS,
            notification.id.clone(),
            serde_json::to_value(notification)?,
        ))
    }

    /// Fire-and-forget creation. Failure means the notification simply
    /// never appears.
    pub async fn emit(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        kind: NotificationKind,
        link: Option<String>,
    ) {
        let notification = Notification::new(user_id, title, message, kind, link);
        let doc = match serde_json::to_value(&notification) {
            Ok(doc) => doc,
            Err(e) => {
                debug!(user_id, error = %e, "notification not serializable, dropped");
                return;
            }
        };
        if let Err(e) = self
            .store
            .set(collections::NOTIFICATIONS, &notification.id, doc)
            .await
        {
            debug!(user_id, error = %e, "notification write failed, dropped");
        }
    }

    /// All notifications for a user, newest first.
    pub async fn list_for(&self, user_id: &str) -> Result<Vec<Notification>, StoreError> {
        let hits = self
            .store
            .query_eq(collections::NOTIFICATIONS, "userId", &json!(user_id))
            .await?;
        let mut notifications: Vec<Notification> = hits
            .into_iter()
            .filter_map(|(_, doc)| serde_json::from_value(doc).ok())
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<usize, StoreError> {
        Ok(self
            .list_for(user_id)
            .await?
            .iter()
            .filter(|n| !n.is_read)
            .count())
    }

    /// Direct mutation, no undo.
    pub async fn mark_read(&self, notification_id: &str) -> Result<(), StoreError> {
        self.store
            .update(
                collections::NOTIFICATIONS,
                notification_id,
                json!({ "isRead": true }),
            )
            .await
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<(), StoreError> {
        let hits = self
            .store
            .query_eq(collections::NOTIFICATIONS, "userId", &json!(user_id))
            .await?;
        let ops: Vec<WriteOp> = hits
            .into_iter()
            .map(|(id, _)| WriteOp::update(collections::NOTIFICATIONS, id, json!({ "isRead": true })))
            .collect();
        if ops.is_empty() {
            return Ok(());
        }
        self.store.commit(ops).await
    }
}
