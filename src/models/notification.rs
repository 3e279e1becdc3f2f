//! User-facing notification records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Wallet,
    Campaign,
    Deposit,
    Withdrawal,
    Referral,
    System,
}

/// Best-effort record in the `notifications` collection. No delivery
/// guarantee; a failed write means it never appears.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
        link: Option<String>,
    ) -> Self {
        Self {
            id: format!("ntf_{}", Uuid::new_v4().simple()),
            user_id: user_id.into(),
            title: title.into(),
            message: message.into(),
            kind,
            is_read: false,
            created_at: Utc::now(),
            link,
        }
    }
}
