//! Wallet ledger.
//!
//! Applies a signed Rs. delta plus an append-only transaction record to a
//! user's wallet. Writes go to the local mirror first, computed from the
//! mirror's own snapshot or the caller's cached wallet rather than a
//! canonical round trip, then best-effort to the canonical store; a
//! canonical failure is logged and masked, never surfaced to the acting
//! user. Retries are NOT idempotent: the same logical intent applied
//! twice produces two transactions and double-applies the delta, so
//! callers own single-invocation semantics.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::error::{LedgerError, StoreError};
use crate::merge::{merge_history, merge_wallet};
use crate::mirror::MirrorStore;
use crate::models::notification::NotificationKind;
use crate::models::transaction::{Transaction, TxKind};
use crate::models::user::{User, Wallet, WalletPatch};
use crate::services::notifications::Notifier;
use crate::store::{collections, DocumentStore};

/// Which wallet fields a delta touches.
///
/// `balance` and `total_spend` move with the signed amount (spending
/// lowers balance and raises total spend; a refund does the reverse,
/// floored at zero). The pending fields are decremented by the amount's
/// magnitude on resolution of a request of that kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletAffects {
    pub balance: bool,
    pub total_spend: bool,
    pub pending_deposit: bool,
    pub pending_withdrawal: bool,
}

impl WalletAffects {
    pub fn balance_only() -> Self {
        Self {
            balance: true,
            ..Default::default()
        }
    }

    /// Purchase/refund: balance and running spend move together.
    pub fn balance_and_spend() -> Self {
        Self {
            balance: true,
            total_spend: true,
            ..Default::default()
        }
    }

    /// Resolution of a deposit request.
    pub fn deposit_resolution() -> Self {
        Self {
            balance: true,
            pending_deposit: true,
            ..Default::default()
        }
    }

    /// Resolution of a withdrawal request.
    pub fn withdrawal_resolution() -> Self {
        Self {
            balance: true,
            pending_withdrawal: true,
            ..Default::default()
        }
    }

    fn any(&self) -> bool {
        self.balance || self.total_spend || self.pending_deposit || self.pending_withdrawal
    }
}

/// Which pending counter a request submission bumps.
#[derive(Debug, Clone, Copy)]
pub enum PendingKind {
    Deposit,
    Withdrawal,
}

pub struct WalletLedger {
    store: Arc<dyn DocumentStore>,
    mirror: Arc<MirrorStore>,
    notifier: Arc<Notifier>,
}

impl WalletLedger {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        mirror: Arc<MirrorStore>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            store,
            mirror,
            notifier,
        }
    }

    /// Canonical user document, or `None` when it is missing or the read
    /// failed (the failure is logged; the mirror carries on).
    async fn canonical_user(&self, user_id: &str) -> Option<User> {
        match self.store.get(collections::USERS, user_id).await {
            Ok(Some(doc)) => match serde_json::from_value::<User>(doc) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(user_id, error = %e, "canonical user document unparseable");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(user_id, error = %e, "canonical user read failed, using mirror state");
                None
            }
        }
    }

    /// Best local notion of the wallet: the mirror snapshot wins, then
    /// the caller's copy. Only a user this process has never touched and
    /// whose wallet the caller does not hold falls back to a one-time
    /// canonical hydration read.
    async fn local_wallet(&self, user_id: &str, cached: Option<&Wallet>) -> Wallet {
        if let Some(patch) = self.mirror.wallet_override(user_id) {
            return merge_wallet(&Wallet::default(), &patch);
        }
        if let Some(wallet) = cached {
            return wallet.clone();
        }
        self.canonical_user(user_id)
            .await
            .map(|u| u.wallet)
            .unwrap_or_default()
    }

    /// Apply a signed delta and append a `completed` transaction.
    ///
    /// The local mirror write lands first, computed from local state
    /// (or `cached`) without a canonical round trip; the canonical write
    /// is attempted afterwards and a permission/IO failure there still
    /// counts as success for the caller.
    pub async fn apply_delta(
        &self,
        user_id: &str,
        amount: i64,
        kind: TxKind,
        description: &str,
        affects: WalletAffects,
        cached: Option<&Wallet>,
    ) -> Result<Transaction, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::Validation("amount must be non-zero".to_string()));
        }
        if !affects.any() {
            return Err(LedgerError::Validation(
                "delta must touch at least one wallet field".to_string(),
            ));
        }

        let mut wallet = self.local_wallet(user_id, cached).await;

        if affects.balance {
            wallet.balance += amount;
        }
        if affects.total_spend {
            wallet.total_spend = (wallet.total_spend - amount).max(0);
        }
        if affects.pending_deposit {
            wallet.pending_deposit = (wallet.pending_deposit - amount.abs()).max(0);
        }
        if affects.pending_withdrawal {
            wallet.pending_withdrawal = (wallet.pending_withdrawal - amount.abs()).max(0);
        }

        let tx = Transaction::completed(kind, amount.abs(), description);

        // local first; this also signals every open view
        self.mirror
            .put_wallet_override(user_id, &WalletPatch::snapshot(&wallet));
        self.mirror.prepend_transaction(user_id, &tx);

        // then canonical, best-effort
        match self.canonical_user(user_id).await {
            Some(user) => {
                let mut history = user.wallet_history;
                history.insert(0, tx.clone());
                let patch = json!({
                    "wallet": wallet,
                    "walletHistory": history,
                });
                if let Err(e) = self
                    .store
                    .update(collections::USERS, user_id, patch)
                    .await
                {
                    warn!(user_id, error = %e, "canonical wallet write failed, mirror retains the delta");
                }
            }
            None => {
                debug!(user_id, "no canonical user snapshot, skipping canonical wallet write");
            }
        }

        Ok(tx)
    }

    /// Bump a pending counter on request submission. No transaction is
    /// recorded; the completed transaction is cut at resolution time.
    pub async fn bump_pending(
        &self,
        user_id: &str,
        kind: PendingKind,
        delta: i64,
        cached: Option<&Wallet>,
    ) -> Result<(), LedgerError> {
        let mut wallet = self.local_wallet(user_id, cached).await;

        match kind {
            PendingKind::Deposit => {
                wallet.pending_deposit = (wallet.pending_deposit + delta).max(0)
            }
            PendingKind::Withdrawal => {
                wallet.pending_withdrawal = (wallet.pending_withdrawal + delta).max(0)
            }
        }

        self.mirror
            .put_wallet_override(user_id, &WalletPatch::snapshot(&wallet));

        if self.canonical_user(user_id).await.is_some() {
            let patch = json!({ "wallet": wallet });
            if let Err(e) = self
                .store
                .update(collections::USERS, user_id, patch)
                .await
            {
                warn!(user_id, error = %e, "canonical pending-counter write failed");
            }
        }
        Ok(())
    }

    /// Canonical user overlaid with the local mirror: override wallet
    /// fields replace canonical ones, histories are merged with
    /// deduplication by transaction id.
    pub async fn merged_user_view(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        match self.store.get(collections::USERS, user_id).await {
            Ok(Some(doc)) => {
                let mut user: User = serde_json::from_value(doc)?;
                if let Some(patch) = self.mirror.wallet_override(user_id) {
                    user.wallet = merge_wallet(&user.wallet, &patch);
                }
                let local = self.mirror.local_history(user_id);
                if !local.is_empty() {
                    user.wallet_history = merge_history(&user.wallet_history, &local);
                }
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) if e.is_permission_denied() => {
                warn!(user_id, error = %e, "canonical user unreadable, serving mirror-only view");
                let patch = self.mirror.wallet_override(user_id);
                let history = self.mirror.local_history(user_id);
                if patch.is_none() && history.is_empty() {
                    return Ok(None);
                }
                let mut user = User::new(user_id, "");
                user.referral_code = None;
                if let Some(patch) = patch {
                    user.wallet = merge_wallet(&Wallet::default(), &patch);
                }
                user.wallet_history = history;
                Ok(Some(user))
            }
            Err(e) => Err(e),
        }
    }

    /// Admin-issued manual wallet adjustment. `amount` is a positive Rs.
    /// magnitude; the kind decides the direction.
    pub async fn admin_adjust(
        &self,
        user_id: &str,
        amount: i64,
        kind: TxKind,
        note: &str,
    ) -> Result<Transaction, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::Validation(
                "adjustment amount must be positive".to_string(),
            ));
        }
        let signed = match kind {
            TxKind::Bonus | TxKind::Adjustment => amount,
            TxKind::Penalty | TxKind::Fee | TxKind::Commission => -amount,
            other => {
                return Err(LedgerError::Validation(format!(
                    "kind {} is not an admin adjustment",
                    other.slug()
                )))
            }
        };

        let tx = self
            .apply_delta(user_id, signed, kind, note, WalletAffects::balance_only(), None)
            .await?;

        let direction = if signed > 0 { "credited to" } else { "debited from" };
        self.notifier
            .emit(
                user_id,
                "Wallet updated",
                &format!("Rs. {} was {} your wallet. {}", amount, direction, note),
                NotificationKind::Wallet,
                None,
            )
            .await;

        Ok(tx)
    }
}

/// Refund math for a rejected campaign: cost returns to balance, running
/// spend drops by the same amount floored at zero, and one `adjustment`
/// transaction records the reason.
pub fn refund_for_rejection(wallet: &Wallet, total_cost: i64, reason: &str) -> (Wallet, Transaction) {
    let refunded = Wallet {
        balance: wallet.balance + total_cost,
        total_spend: (wallet.total_spend - total_cost).max(0),
        pending_deposit: wallet.pending_deposit,
        pending_withdrawal: wallet.pending_withdrawal,
    };
    let tx = Transaction::completed(
        TxKind::Adjustment,
        total_cost,
        format!("Refund for rejected campaign: {}", reason),
    );
    (refunded, tx)
}
