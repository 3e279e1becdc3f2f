//! bazaari, a classifieds marketplace core.
//!
//! The heart of the crate is the wallet ledger and ad-campaign lifecycle
//! with dual-path persistence: every mutation lands in a synchronous
//! local mirror first and is then attempted against the canonical
//! document store, so the application stays usable when backend writes
//! are permission-denied. The mirror is a best-effort shadow, not a
//! financial ledger engine; divergence from canonical state is an
//! accepted cost of staying responsive.
//!
//! - [`services::WalletLedger`]: signed deltas + append-only history
//! - [`services::CampaignManager`]: pending/active/rejected/completed
//!   transitions with refunds and listing promotion
//! - [`services::DepositService`] / [`services::WithdrawalService`]:
//!   admin-resolved money movement requests
//! - [`mirror::MirrorStore`]: the local shadow layer
//! - [`store::DocumentStore`]: the canonical store interface, with a
//!   MySQL backend in [`db`] and an in-memory one for tests and demos

pub mod assets;
pub mod db;
pub mod error;
pub mod merge;
pub mod mirror;
pub mod models;
pub mod services;
pub mod signal;
pub mod store;

pub use error::{AssetError, CampaignError, LedgerError, RequestError, StoreError};
pub use mirror::MirrorStore;
pub use services::{
    CampaignManager, DepositService, Notifier, ReferralService, WalletLedger, WithdrawalService,
};
pub use signal::{Signal, UpdateBus};
pub use store::{DocumentStore, MemoryStore};
