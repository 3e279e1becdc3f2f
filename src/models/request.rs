//! Deposit and withdrawal request models

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Created `pending`, resolved exactly once by an admin; `approved` and
/// `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

/// User-submitted deposit request (`deposits` collection).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    /// Payment channel the user claims to have used (Easypaisa, JazzCash, bank).
    pub method: String,
    /// Externally-supplied payment reference.
    pub transaction_id: String,
    /// Hosted URL of the payment-proof screenshot.
    pub screenshot_url: String,
    pub status: RequestStatus,
    pub date: String,
}

impl DepositRequest {
    pub fn new(
        user_id: impl Into<String>,
        amount: i64,
        method: impl Into<String>,
        transaction_id: impl Into<String>,
        screenshot_url: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("dep_{}", Uuid::new_v4().simple()),
            user_id: user_id.into(),
            amount,
            method: method.into(),
            transaction_id: transaction_id.into(),
            screenshot_url: screenshot_url.into(),
            status: RequestStatus::Pending,
            date: Utc::now().format("%Y-%m-%d").to_string(),
        }
    }
}

/// User-submitted withdrawal request (`withdrawals` collection).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub method: String,
    /// Account number / mobile wallet the payout should go to.
    pub account_details: String,
    pub status: RequestStatus,
    pub date: String,
}

impl WithdrawalRequest {
    pub fn new(
        user_id: impl Into<String>,
        amount: i64,
        method: impl Into<String>,
        account_details: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("wd_{}", Uuid::new_v4().simple()),
            user_id: user_id.into(),
            amount,
            method: method.into(),
            account_details: account_details.into(),
            status: RequestStatus::Pending,
            date: Utc::now().format("%Y-%m-%d").to_string(),
        }
    }
}
