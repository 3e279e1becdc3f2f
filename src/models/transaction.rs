//! Wallet transaction records

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Direction/purpose of a transaction. The sign of the wallet effect is
/// implied by the kind; `amount` is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Deposit,
    Withdrawal,
    Adjustment,
    Bonus,
    Penalty,
    Fee,
    Commission,
    Promotion,
    ReferralBonus,
}

impl TxKind {
    /// Identifier slug used in transaction ids and notification copy.
    pub fn slug(&self) -> &'static str {
        match self {
            TxKind::Deposit => "deposit",
            TxKind::Withdrawal => "withdrawal",
            TxKind::Adjustment => "adjustment",
            TxKind::Bonus => "bonus",
            TxKind::Penalty => "penalty",
            TxKind::Fee => "fee",
            TxKind::Commission => "commission",
            TxKind::Promotion => "promotion",
            TxKind::ReferralBonus => "referral_bonus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Completed,
    Pending,
    Failed,
}

/// Immutable once appended; lives only inside a user's wallet history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    /// Positive Rs. amount; direction implied by `kind`.
    pub amount: i64,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    pub status: TxStatus,
    pub description: String,
}

impl Transaction {
    /// Build a `completed` transaction dated today with a fresh id.
    pub fn completed(kind: TxKind, amount: i64, description: impl Into<String>) -> Self {
        Self {
            id: fresh_id(kind.slug()),
            kind,
            amount,
            date: Utc::now().format("%Y-%m-%d").to_string(),
            status: TxStatus::Completed,
            description: description.into(),
        }
    }
}

static TX_SEQ: AtomicU64 = AtomicU64::new(0);

/// `tx_<purpose>_<unix_millis><3-digit sequence>`; the sequence keeps ids
/// distinct when two records are cut in the same millisecond.
pub fn fresh_id(purpose: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let seq = TX_SEQ.fetch_add(1, Ordering::Relaxed) % 1000;
    format!("tx_{}_{}{:03}", purpose, millis, seq)
}
