//! Deposit requests.
//!
//! A user submits a pending request with payment proof; an admin resolves
//! it exactly once. The request document is never mutated beyond its
//! status flip; the wallet-affecting side effect is a `completed`
//! transaction cut at approval time.

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::error::{RequestError, StoreError};
use crate::mirror::MirrorStore;
use crate::models::notification::NotificationKind;
use crate::models::request::{DepositRequest, RequestStatus};
use crate::models::transaction::TxKind;
use crate::services::ledger::{PendingKind, WalletAffects, WalletLedger};
use crate::services::notifications::Notifier;
use crate::store::{collections, DocumentStore};

pub struct DepositService {
    store: Arc<dyn DocumentStore>,
    mirror: Arc<MirrorStore>,
    ledger: Arc<WalletLedger>,
    notifier: Arc<Notifier>,
}

impl DepositService {
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

    /// Submit a deposit request. The amount shows up in the wallet's
    /// pending counter immediately; the balance moves only on approval.
    pub async fn submit(
        &self,
        user_id: &str,
        amount: i64,
        method: &str,
        transaction_id: &str,
        screenshot_url: &str,
    ) -> Result<DepositRequest, RequestError> {
        if amount <= 0 {
            return Err(RequestError::Validation(
                "deposit amount must be positive".to_string(),
            ));
        }
        if method.trim().is_empty() {
            return Err(RequestError::Validation(
                "a payment method is required".to_string(),
            ));
        }
        if transaction_id.trim().is_empty() {
            return Err(RequestError::Validation(
                "a payment reference is required".to_string(),
            ));
        }

        let request = DepositRequest::new(user_id, amount, method, transaction_id, screenshot_url);
        match self
            .store
            .set(
                collections::DEPOSITS,
                &request.id,
                serde_json::to_value(&request)?,
            )
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_permission_denied() => {
                warn!(user_id, error = %e, "deposit request write denied, wallet pending counter still tracks it");
            }
            Err(e) => return Err(e.into()),
        }

        self.ledger
            .bump_pending(user_id, PendingKind::Deposit, amount, None)
            .await?;

        self.notifier
            .emit(
                user_id,
                "Deposit request received",
                &format!(
                    "Your deposit of Rs. {} via {} is awaiting review.",
                    amount, method
                ),
                NotificationKind::Deposit,
                None,
            )
            .await;

        Ok(request)
    }

    async fn load(&self, request_id: &str) -> Result<DepositRequest, RequestError> {
        let doc = self
            .store
            .get(collections::DEPOSITS, request_id)
            .await?
            .ok_or_else(|| RequestError::NotFound(request_id.to_string()))?;
        Ok(serde_json::from_value(doc).map_err(StoreError::from)?)
    }

    /// Flip the request status, pending-only. When the canonical flip
    /// is denied the resolution is recorded in the local mirror instead,
    /// so a retry against the stale canonical copy cannot resolve the
    /// same request twice.
    async fn resolve_status(
        &self,
        request: &DepositRequest,
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
                collections::DEPOSITS,
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

    /// Approve: credit the balance and clear the pending amount, once.
    pub async fn approve(&self, request_id: &str) -> Result<DepositRequest, RequestError> {
        let mut request = self.load(request_id).await?;
        self.resolve_status(&request, RequestStatus::Approved).await?;

        self.ledger
            .apply_delta(
                &request.user_id,
                request.amount,
                TxKind::Deposit,
                &format!("Deposit via {} approved", request.method),
                WalletAffects::deposit_resolution(),
                None,
            )
            .await?;

        self.notifier
            .emit(
                &request.user_id,
                "Deposit approved",
                &format!("Rs. {} has been added to your wallet.", request.amount),
                NotificationKind::Deposit,
                None,
            )
            .await;

        request.status = RequestStatus::Approved;
        Ok(request)
    }

    /// Reject: clear the pending amount; the balance never moves.
    pub async fn reject(
        &self,
        request_id: &str,
        reason: &str,
    ) -> Result<DepositRequest, RequestError> {
        let mut request = self.load(request_id).await?;
        self.resolve_status(&request, RequestStatus::Rejected).await?;

        self.ledger
            .bump_pending(&request.user_id, PendingKind::Deposit, -request.amount, None)
            .await?;

        let message = if reason.trim().is_empty() {
            format!("Your deposit of Rs. {} was rejected.", request.amount)
        } else {
            format!(
                "Your deposit of Rs. {} was rejected: {}",
                request.amount, reason
            )
        };
        self.notifier
            .emit(
                &request.user_id,
                "Deposit rejected",
                &message,
                NotificationKind::Deposit,
                None,
            )
            .await;

        request.status = RequestStatus::Rejected;
        Ok(request)
    }

    /// Requests awaiting review, for the admin dashboard.
    pub async fn pending(&self) -> Result<Vec<DepositRequest>, RequestError> {
        let hits = self
            .store
            .query_eq(collections::DEPOSITS, "status", &json!("pending"))
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
        service: DepositService,
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
        let service = DepositService::new(dyn_store, mirror, ledger.clone(), notifier);
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
    async fn test_submit_then_approve_moves_pending_into_balance() {
        let h = harness();
        seed_user(&h, "u1", 100).await;

        let request = h
            .service
            .submit("u1", 500, "Easypaisa", "EP-9912", "https://cdn/x.png")
            .await
            .unwrap();
        let view = h.ledger.merged_user_view("u1").await.unwrap().unwrap();
        assert_eq!(view.wallet.pending_deposit, 500);
        assert_eq!(view.wallet.balance, 100);

        h.service.approve(&request.id).await.unwrap();
        let view = h.ledger.merged_user_view("u1").await.unwrap().unwrap();
        assert_eq!(view.wallet.balance, 600);
        assert_eq!(view.wallet.pending_deposit, 0);
        assert_eq!(view.wallet_history.len(), 1);
        assert_eq!(view.wallet_history[0].kind, TxKind::Deposit);
    }

    #[tokio::test]
    async fn test_double_approve_is_rejected_and_credits_once() {
        let h = harness();
        seed_user(&h, "u1", 0).await;
        let request = h
            .service
            .submit("u1", 300, "JazzCash", "JC-1", "https://cdn/y.png")
            .await
            .unwrap();

        h.service.approve(&request.id).await.unwrap();
        let err = h.service.approve(&request.id).await.unwrap_err();
        assert!(matches!(err, RequestError::AlreadyResolved(_)));

        let view = h.ledger.merged_user_view("u1").await.unwrap().unwrap();
        assert_eq!(view.wallet.balance, 300);
        assert_eq!(view.wallet_history.len(), 1);
    }

    #[tokio::test]
    async fn test_degraded_approve_credits_once_and_blocks_retry() {
        let h = harness();
        seed_user(&h, "u1", 0).await;
        let request = h
            .service
            .submit("u1", 500, "Easypaisa", "EP-1", "")
            .await
            .unwrap();
        h.store.deny_writes(true);

        h.service.approve(&request.id).await.unwrap();

        // the canonical status flip never landed, so the canonical copy
        // still says pending; the locally-recorded resolution must block
        // the retry anyway
        let doc = h
            .store
            .get(collections::DEPOSITS, &request.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["status"], "pending");
        let err = h.service.approve(&request.id).await.unwrap_err();
        assert!(matches!(err, RequestError::AlreadyResolved(_)));

        let view = h.ledger.merged_user_view("u1").await.unwrap().unwrap();
        assert_eq!(view.wallet.balance, 500);
        assert_eq!(view.wallet.pending_deposit, 0);
        assert_eq!(view.wallet_history.len(), 1);
        assert!(h.service.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reject_clears_pending_without_touching_balance() {
        let h = harness();
        seed_user(&h, "u1", 100).await;
        let request = h
            .service
            .submit("u1", 500, "Bank", "TRX-77", "https://cdn/z.png")
            .await
            .unwrap();

        h.service.reject(&request.id, "reference not found").await.unwrap();

        let view = h.ledger.merged_user_view("u1").await.unwrap().unwrap();
        assert_eq!(view.wallet.balance, 100);
        assert_eq!(view.wallet.pending_deposit, 0);
        assert!(view.wallet_history.is_empty());
    }

    #[tokio::test]
    async fn test_submit_validation_happens_before_any_write() {
        let h = harness();
        assert!(matches!(
            h.service.submit("u1", 0, "Easypaisa", "EP-1", "").await,
            Err(RequestError::Validation(_))
        ));
        assert!(matches!(
            h.service.submit("u1", 100, "", "EP-1", "").await,
            Err(RequestError::Validation(_))
        ));
        assert!(h.store.is_empty(collections::DEPOSITS));
    }

    #[tokio::test]
    async fn test_pending_lists_only_unresolved() {
        let h = harness();
        seed_user(&h, "u1", 0).await;
        let a = h
            .service
            .submit("u1", 100, "Easypaisa", "EP-1", "")
            .await
            .unwrap();
        h.service
            .submit("u1", 200, "Easypaisa", "EP-2", "")
            .await
            .unwrap();

        h.service.approve(&a.id).await.unwrap();
        let pending = h.service.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].amount, 200);
    }
}
