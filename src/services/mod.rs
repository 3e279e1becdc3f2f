pub mod campaigns;
pub mod deposits;
pub mod ledger;
pub mod notifications;
pub mod referrals;
pub mod withdrawals;

pub use campaigns::CampaignManager;
pub use deposits::DepositService;
pub use ledger::{PendingKind, WalletAffects, WalletLedger};
pub use notifications::Notifier;
pub use referrals::ReferralService;
pub use withdrawals::WithdrawalService;
