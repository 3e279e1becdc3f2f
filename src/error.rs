use thiserror::Error;

use crate::models::campaign::CampaignStatus;

/// Errors from either persistence backend (canonical document store or
/// the MySQL implementation behind it).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this failure is the degraded-backend signal that the
    /// fallback paths mask rather than surface.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoreError::PermissionDenied(_))
    }
}

/// Wallet ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid ledger operation: {0}")]
    Validation(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Campaign lifecycle errors
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("Invalid campaign operation: {0}")]
    Validation(String),
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },
    #[error("Insufficient balance: need Rs. {needed}, have Rs. {available}")]
    InsufficientFunds { needed: i64, available: i64 },
    #[error("Campaign not found: {0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl From<serde_json::Error> for CampaignError {
    fn from(e: serde_json::Error) -> Self {
        CampaignError::Store(StoreError::Serde(e))
    }
}

/// Deposit/withdrawal request errors
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Request not found: {0}")]
    NotFound(String),
    #[error("Request already resolved (status: {0})")]
    AlreadyResolved(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl From<serde_json::Error> for RequestError {
    fn from(e: serde_json::Error) -> Self {
        RequestError::Store(StoreError::Serde(e))
    }
}

/// Asset upload errors
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Upload endpoint not configured: {0}")]
    Config(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upload rejected: {0}")]
    Rejected(String),
}
