pub mod campaign;
pub mod listing;
pub mod notification;
pub mod request;
pub mod settings;
pub mod transaction;
pub mod user;

pub use campaign::{AdCampaign, CampaignKind, CampaignPatch, CampaignStatus, Priority};
pub use listing::{Listing, ListingPatch};
pub use notification::{Notification, NotificationKind};
pub use request::{DepositRequest, RequestStatus, WithdrawalRequest};
pub use settings::{AdPricing, PaymentInfo, ReferralSettings};
pub use transaction::{Transaction, TxKind, TxStatus};
pub use user::{User, Wallet, WalletPatch};
