//! Withdrawal requests, the payout mirror of deposits.
//!
//! Submission reserves the amount in the wallet's pending counter;
//! approval debits the balance and clears the reservation in one ledger
//! delta, rejection just releases the reservation.

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::error::{RequestError, StoreError};
use crate::mirror::MirrorStore;
use crate::models::notification::NotificationKind;
use crate::models::request::{RequestStatus, WithdrawalRequest};
use crate::models::transaction::TxKind;
use crate::services::ledger::{PendingKind, WalletAffects, WalletLedger};
use crate::services::notifications::Notifier;
use crate::store::{collections, DocumentStore};

pub struct WithdrawalService {
    store: Arc<dyn DocumentStore>,
    mirror: Arc<MirrorStore>,
    ledger: Arc<WalletLedger>,
    notifier: Arc<Notifier>,
}

impl WithdrawalService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        mirror: Arc<MirrorStore>,
        ledger: Arc<WalletLedger>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            store,
            mirror,
            ledger,
            notifier,
        }
    }

    pub async fn submit(
        &self,
        user_id: &str,
        amount: i64,
        method: &str,
        account_details: &str,
    ) -> Result<WithdrawalRequest, RequestError> {
        if amount <= 0 {
            return Err(RequestError::Validation(
                "withdrawal amount must be positive".to_string(),
            ));
        }
        if account_details.trim().is_empty() {
            return Err(RequestError::Validation(
                "payout account details are required".to_string(),
            ));
        }

        let wallet = self
            .ledger
            .merged_user_view(user_id)
            .await?
            .map(|u| u.wallet)
            .unwrap_or_default();
        // the balance must cover this request plus what is already reserved
        if wallet.balance < amount + wallet.pending_withdrawal {
            return Err(RequestError::Validation(format!(
                "balance Rs. {} cannot cover a withdrawal of Rs. {}",
                wallet.balance, amount
            )));
        }

        let request = WithdrawalRequest::new(user_id, amount, method, account_details);
        match self
            .store
            .set(
                collections::WITHDRAWALS,
                &request.id,
                serde_json::to_value(&request)?,
            )
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_permission_denied() => {
                warn!(user_id, error = %e, "withdrawal request write denied, wallet pending counter still tracks it");
            }
            Err(e) => return Err(e.into()),
        }

        self.ledger
            .bump_pending(user_id, PendingKind::Withdrawal, amount, Some(&wallet))
            .await?;

        self.notifier
            .emit(
                user_id,
                "Withdrawal request received",
                &format!(
                    "Your withdrawal of Rs. {} via {} is awaiting review.",
                    amount, method
                ),
                NotificationKind::Withdrawal,
                None,
            )
            .await;

        Ok(request)
    }

    async fn load(&self, request_id: &str) -> Result<WithdrawalRequest, RequestError> {
        let doc = self
            .store
            .get(collections::WITHDRAWALS, request_id)
            .await?
            .ok_or_else(|| RequestError::NotFound(request_id.to_string()))?;
        Ok(serde_json::from_value(doc).map_err(StoreError::from)?)
    }

    /// Pending-only status flip with the same local fallback as
    /// deposits: a denied canonical flip is recorded in the mirror so
    /// the request stays single-shot.
    async fn resolve_status(
        &self,
        request: &WithdrawalRequest,
        to: RequestStatus,
    ) -> Result<(), RequestError> {
        if request.status != RequestStatus::Pending {
            return Err(RequestError::AlreadyResolved(
                request.status.as_str().to_string(),
            ));
        }
        if let Some(status) = self.mirror.request_override(&request.id) {
            return Err(RequestError::AlreadyResolved(status));
        }
        match self
            .store
            .update_if_eq(
                collections::WITHDRAWALS,
                &request.id,
                "status",
                RequestStatus::Pending.as_str(),
                json!({ "status": to.as_str() }),
            )
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(RequestError::AlreadyResolved("resolved".to_string())),
            Err(e) if e.is_permission_denied() => {
                warn!(request_id = %request.id, error = %e, "status flip denied, recording the resolution locally");
                self.mirror.put_request_override(&request.id, to.as_str());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Approve: pay out, debiting the balance and releasing the
    /// reservation in one delta.
    pub async fn approve(&self, request_id: &str) -> Result<WithdrawalRequest, RequestError> {
        let mut request = self.load(request_id).await?;
        self.resolve_status(&request, RequestStatus::Approved).await?;

        self.ledger
            .apply_delta(
                &request.user_id,
                -request.amount,
                TxKind::Withdrawal,
                &format!("Withdrawal to {} approved", request.method),
                WalletAffects::withdrawal_resolution(),
                None,
            )
            .await?;

        self.notifier
            .emit(
                &request.user_id,
                "Withdrawal approved",
                &format!(
                    "Rs. {} is on its way to your {} account.",
                    request.amount, request.method
                ),
                NotificationKind::Withdrawal,
                None,
            )
            .await;

        request.status = RequestStatus::Approved;
        Ok(request)
    }

    /// Reject: release the reservation; the balance never moved.
    pub async fn reject(
        &self,
        request_id: &str,
        reason: &str,
    ) -> Result<WithdrawalRequest, RequestError> {
        let mut request = self.load(request_id).await?;
        self.resolve_status(&request, RequestStatus::Rejected).await?;

        self.ledger
            .bump_pending(&request.user_id, PendingKind::Withdrawal, -request.amount, None)
            .await?;

        let message = if reason.trim().is_empty() {
            format!("Your withdrawal of Rs. {} was rejected.", request.amount)
        } else {
            format!(
                "Your withdrawal of Rs. {} was rejected: {}",
                request.amount, reason
            )
        };
        self.notifier
            .emit(
                &request.user_id,
                "Withdrawal rejected",
                &message,
                NotificationKind::Withdrawal,
                None,
            )
            .await;

        request.status = RequestStatus::Rejected;
        Ok(request)
    }

    pub async fn pending(&self) -> Result<Vec<WithdrawalRequest>, RequestError> {
        let hits = self
            .store
            .query_eq(collections::WITHDRAWALS, "status", &json!("pending"))
            .await?;
        Ok(hits
            .into_iter()
            .filter(|(id, _)| self.mirror.request_override(id).is_none())
            .filter_map(|(_, doc)| serde_json::from_value(doc).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::UpdateBus;
    use crate::store::MemoryStore;

    struct Harness {
        store: Arc<MemoryStore>,
        ledger: Arc<WalletLedger>,
        service: WithdrawalService,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let mirror = Arc::new(MirrorStore::new(UpdateBus::default()));
        let dyn_store = store.clone() as Arc<dyn DocumentStore>;
        let notifier = Arc::new(Notifier::new(dyn_store.clone()));
        let ledger = Arc::new(WalletLedger::new(
            dyn_store.clone(),
            mirror.clone(),
            notifier.clone(),
        ));
        let service = WithdrawalService::new(dyn_store, mirror, ledger.clone(), notifier);
        Harness {
            store,
            ledger,
            service,
        }
    }

    async fn seed_user(h: &Harness, id: &str, balance: i64) {
        let mut user = crate::models::user::User::new(id, format!("{}@bazaari.pk", id));
        user.wallet.balance = balance;
        h.store
            .set(collections::USERS, id, serde_json::to_value(&user).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_submit_reserves_and_approve_pays_out() {
        let h = harness();
        seed_user(&h, "u1", 1000).await;

        let request = h
            .service
            .submit("u1", 400, "JazzCash", "0300-1234567")
            .await
            .unwrap();
        let view = h.ledger.merged_user_view("u1").await.unwrap().unwrap();
        assert_eq!(view.wallet.pending_withdrawal, 400);
        assert_eq!(view.wallet.balance, 1000);

        h.service.approve(&request.id).await.unwrap();
        let view = h.ledger.merged_user_view("u1").await.unwrap().unwrap();
        assert_eq!(view.wallet.balance, 600);
        assert_eq!(view.wallet.pending_withdrawal, 0);
        assert_eq!(view.wallet_history[0].kind, TxKind::Withdrawal);
    }

    #[tokio::test]
    async fn test_submit_rejects_amounts_beyond_available_balance() {
        let h = harness();
        seed_user(&h, "u1", 300).await;

        assert!(matches!(
            h.service.submit("u1", 500, "Bank", "PK36-001").await,
            Err(RequestError::Validation(_))
        ));

        // a second request must also account for the already-reserved amount
        h.service.submit("u1", 200, "Bank", "PK36-001").await.unwrap();
        assert!(matches!(
            h.service.submit("u1", 200, "Bank", "PK36-001").await,
            Err(RequestError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_releases_reservation() {
        let h = harness();
        seed_user(&h, "u1", 1000).await;
        let request = h
            .service
            .submit("u1", 400, "Easypaisa", "0345-0000000")
            .await
            .unwrap();

        h.service.reject(&request.id, "account name mismatch").await.unwrap();

        let view = h.ledger.merged_user_view("u1").await.unwrap().unwrap();
        assert_eq!(view.wallet.balance, 1000);
        assert_eq!(view.wallet.pending_withdrawal, 0);
        assert!(view.wallet_history.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_resolution_stays_single_shot() {
        let h = harness();
        seed_user(&h, "u1", 1000).await;
        let request = h
            .service
            .submit("u1", 400, "Bank", "PK36-001")
            .await
            .unwrap();
        h.store.deny_writes(true);

        h.service.approve(&request.id).await.unwrap();
        assert!(matches!(
            h.service.approve(&request.id).await,
            Err(RequestError::AlreadyResolved(_))
        ));
        assert!(matches!(
            h.service.reject(&request.id, "too late").await,
            Err(RequestError::AlreadyResolved(_))
        ));

        let view = h.ledger.merged_user_view("u1").await.unwrap().unwrap();
        assert_eq!(view.wallet.balance, 600);
        assert_eq!(view.wallet.pending_withdrawal, 0);
        assert_eq!(view.wallet_history.len(), 1);
    }

    #[tokio::test]
    async fn test_double_resolution_is_single_shot() {
        let h = harness();
        seed_user(&h, "u1", 1000).await;
        let request = h
            .service
            .submit("u1", 400, "Bank", "PK36-001")
            .await
            .unwrap();

        h.service.approve(&request.id).await.unwrap();
        assert!(matches!(
            h.service.reject(&request.id, "too late").await,
            Err(RequestError::AlreadyResolved(_))
        ));

        let view = h.ledger.merged_user_view("u1").await.unwrap().unwrap();
        assert_eq!(view.wallet.balance, 600);
    }
}
