//! Ad-campaign lifecycle.
//!
//! `pending_approval` moves to `active` or `rejected` exactly once;
//! `active` moves to `completed` when stopped. Expiry is advisory via
//! `end_date`; no scheduler enforces it. Approval and rejection bundle
//! their campaign, listing and notification effects into one atomic
//! remote batch; when the batch fails the campaign and listing effects
//! are re-applied through the local mirror and the notification is
//! dropped.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::CampaignError;
use crate::merge::{merge_campaign, merge_wallet};
use crate::mirror::MirrorStore;
use crate::models::campaign::{AdCampaign, CampaignKind, CampaignPatch, CampaignStatus, Priority};
use crate::models::listing::ListingPatch;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::settings::AdPricing;
use crate::models::transaction::TxKind;
use crate::models::user::{User, Wallet};
use crate::services::ledger::{refund_for_rejection, WalletAffects, WalletLedger};
use crate::services::notifications::Notifier;
use crate::store::{collections, DocumentStore, WriteOp};

pub struct CampaignManager {
    store: Arc<dyn DocumentStore>,
    mirror: Arc<MirrorStore>,
    notifier: Arc<Notifier>,
    ledger: Arc<WalletLedger>,
}

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn end_date(duration_days: i64) -> String {
    (Utc::now() + Duration::days(duration_days))
        .format("%Y-%m-%d")
        .to_string()
}

impl CampaignManager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        mirror: Arc<MirrorStore>,
        notifier: Arc<Notifier>,
        ledger: Arc<WalletLedger>,
    ) -> Self {
        Self {
            store,
            mirror,
            notifier,
            ledger,
        }
    }

    /// Campaign as currently visible: the canonical copy when readable
    /// (falling back to the caller's), with any mirror override on top.
    /// Status transitions are checked against this view, which is what
    /// keeps a resolution single-shot even in degraded-backend mode.
    async fn visible_campaign(&self, campaign: &AdCampaign) -> AdCampaign {
        let base = match self.store.get(collections::CAMPAIGNS, &campaign.id).await {
            Ok(Some(doc)) => match serde_json::from_value::<AdCampaign>(doc) {
                Ok(canonical) => canonical,
                Err(e) => {
                    warn!(campaign_id = %campaign.id, error = %e, "canonical campaign unparseable");
                    campaign.clone()
                }
            },
            Ok(None) => campaign.clone(),
            Err(e) => {
                warn!(campaign_id = %campaign.id, error = %e, "canonical campaign read failed");
                campaign.clone()
            }
        };
        match self.mirror.campaign_override(&campaign.id) {
            Some(patch) => merge_campaign(&base, &patch),
            None => base,
        }
    }

    fn require_status(
        visible: &AdCampaign,
        expected: CampaignStatus,
        target: CampaignStatus,
    ) -> Result<(), CampaignError> {
        if visible.status != expected {
            return Err(CampaignError::InvalidTransition {
                from: visible.status,
                to: target,
            });
        }
        Ok(())
    }

    /// Submit a new campaign: price it from the ad_pricing settings,
    /// debit the vendor, insert it as `pending_approval`.
    pub async fn create(
        &self,
        vendor_id: &str,
        listing_id: Option<String>,
        kind: CampaignKind,
        duration_days: i64,
    ) -> Result<AdCampaign, CampaignError> {
        if duration_days <= 0 {
            return Err(CampaignError::Validation(
                "duration must be at least one day".to_string(),
            ));
        }

        let pricing = self.ad_pricing().await;
        let total_cost = pricing.daily_rate(kind) * duration_days;

        let wallet = self
            .ledger
            .merged_user_view(vendor_id)
            .await?
            .map(|u| u.wallet)
            .unwrap_or_default();
        if wallet.balance < total_cost {
            return Err(CampaignError::InsufficientFunds {
                needed: total_cost,
                available: wallet.balance,
            });
        }

        let campaign = AdCampaign::new(vendor_id, listing_id, kind, total_cost, duration_days);
        self.store
            .set(
                collections::CAMPAIGNS,
                &campaign.id,
                serde_json::to_value(&campaign)?,
            )
            .await?;

        self.ledger
            .apply_delta(
                vendor_id,
                -total_cost,
                TxKind::Promotion,
                &format!("{} campaign ({} days)", kind.label(), duration_days),
                WalletAffects::balance_and_spend(),
                Some(&wallet),
            )
            .await?;

        self.notifier
            .emit(
                vendor_id,
                "Campaign submitted",
                &format!(
                    "Your {} campaign is awaiting approval. Rs. {} was deducted.",
                    kind.label(),
                    total_cost
                ),
                NotificationKind::Campaign,
                None,
            )
            .await;

        Ok(campaign)
    }

    /// Approve a pending campaign: activate it, promote the linked
    /// listing, notify the vendor.
    pub async fn approve(&self, campaign: &AdCampaign) -> Result<AdCampaign, CampaignError> {
        let visible = self.visible_campaign(campaign).await;
        Self::require_status(&visible, CampaignStatus::PendingApproval, CampaignStatus::Active)?;

        let patch = CampaignPatch {
            status: Some(CampaignStatus::Active),
            start_date: Some(today()),
            end_date: Some(end_date(visible.duration_days)),
            priority: Some(Priority::Normal),
        };
        let updated = merge_campaign(&visible, &patch);

        let notification = Notification::new(
            visible.vendor_id.clone(),
            "Campaign approved",
            format!("Your {} campaign is now live.", visible.kind.label()),
            NotificationKind::Campaign,
            visible.listing_id.clone(),
        );

        let mut ops = vec![WriteOp::update(
            collections::CAMPAIGNS,
            visible.id.clone(),
            serde_json::to_value(&patch)?,
        )];
        if let Some(listing_id) = &visible.listing_id {
            ops.push(WriteOp::update(
                collections::LISTINGS,
                listing_id.clone(),
                json!({ "isPromoted": true }),
            ));
        }
        ops.push(Notifier::write_op(&notification)?);

        if let Err(e) = self.store.commit(ops).await {
            warn!(campaign_id = %visible.id, error = %e, "approve batch failed, applying mirror fallback");
            self.mirror.put_campaign_override(&visible.id, &patch);
            if let Some(listing_id) = &visible.listing_id {
                self.mirror
                    .put_listing_override(listing_id, &ListingPatch::promoted(true));
            }
            // the notification has no fallback path and is dropped
        }

        Ok(updated)
    }

    /// Reject a pending campaign: refund its full cost to the vendor,
    /// clear the listing promotion, notify the vendor with the reason.
    pub async fn reject(
        &self,
        campaign: &AdCampaign,
        reason: &str,
        cached_wallet: Option<&Wallet>,
    ) -> Result<AdCampaign, CampaignError> {
        if reason.trim().is_empty() {
            return Err(CampaignError::Validation(
                "a rejection reason is required".to_string(),
            ));
        }

        let visible = self.visible_campaign(campaign).await;
        Self::require_status(
            &visible,
            CampaignStatus::PendingApproval,
            CampaignStatus::Rejected,
        )?;

        let patch = CampaignPatch {
            status: Some(CampaignStatus::Rejected),
            ..Default::default()
        };
        let updated = merge_campaign(&visible, &patch);

        // refund source: canonical vendor record, else the caller's
        // cached wallet, else zeroes
        let canonical_vendor = match self.store.get(collections::USERS, &visible.vendor_id).await {
            Ok(Some(doc)) => serde_json::from_value::<User>(doc).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(vendor_id = %visible.vendor_id, error = %e, "vendor read failed, refunding from cached wallet");
                None
            }
        };
        let wallet_base = canonical_vendor
            .as_ref()
            .map(|u| u.wallet.clone())
            .or_else(|| cached_wallet.cloned())
            .unwrap_or_default();
        let (refunded, refund_tx) = refund_for_rejection(&wallet_base, visible.total_cost, reason);

        let notification = Notification::new(
            visible.vendor_id.clone(),
            "Campaign rejected",
            format!(
                "Your {} campaign was rejected: {}. Rs. {} has been refunded.",
                visible.kind.label(),
                reason,
                visible.total_cost
            ),
            NotificationKind::Campaign,
            None,
        );

        let mut ops = vec![WriteOp::update(
            collections::CAMPAIGNS,
            visible.id.clone(),
            serde_json::to_value(&patch)?,
        )];
        if let Some(listing_id) = &visible.listing_id {
            ops.push(WriteOp::update(
                collections::LISTINGS,
                listing_id.clone(),
                json!({ "isPromoted": false }),
            ));
        }
        let wallet_patch = match &canonical_vendor {
            Some(user) => {
                let mut history = user.wallet_history.clone();
                history.insert(0, refund_tx.clone());
                json!({ "wallet": refunded, "walletHistory": history })
            }
            None => json!({ "wallet": refunded }),
        };
        ops.push(WriteOp::update(
            collections::USERS,
            visible.vendor_id.clone(),
            wallet_patch,
        ));
        ops.push(Notifier::write_op(&notification)?);

        if let Err(e) = self.store.commit(ops).await {
            warn!(campaign_id = %visible.id, error = %e, "reject batch failed, applying mirror fallback");
            self.mirror.put_campaign_override(&visible.id, &patch);
            if let Some(listing_id) = &visible.listing_id {
                self.mirror
                    .put_listing_override(listing_id, &ListingPatch::promoted(false));
            }
            // recompute against whatever wallet is visible right now;
            // in degraded mode this may be stale, which is accepted
            let local_base = match self.mirror.wallet_override(&visible.vendor_id) {
                Some(override_patch) => merge_wallet(&wallet_base, &override_patch),
                None => wallet_base,
            };
            let (local_refunded, local_tx) =
                refund_for_rejection(&local_base, visible.total_cost, reason);
            self.mirror.put_wallet_override(
                &visible.vendor_id,
                &crate::models::user::WalletPatch::snapshot(&local_refunded),
            );
            self.mirror
                .prepend_transaction(&visible.vendor_id, &local_tx);
        }

        Ok(updated)
    }

    /// Stop a live campaign. The remaining budget is forfeited; no
    /// refund is issued.
    pub async fn stop(
        &self,
        campaign_id: &str,
        listing_id: Option<&str>,
    ) -> Result<(), CampaignError> {
        let status = match self.store.get(collections::CAMPAIGNS, campaign_id).await {
            Ok(Some(doc)) => {
                let canonical: AdCampaign = serde_json::from_value(doc)?;
                match self.mirror.campaign_override(campaign_id) {
                    Some(patch) => merge_campaign(&canonical, &patch).status,
                    None => canonical.status,
                }
            }
            Ok(None) => return Err(CampaignError::NotFound(campaign_id.to_string())),
            Err(e) => {
                warn!(campaign_id, error = %e, "canonical campaign read failed, checking mirror");
                match self.mirror.campaign_override(campaign_id).and_then(|p| p.status) {
                    Some(status) => status,
                    // nothing readable anywhere; proceed best-effort
                    None => CampaignStatus::Active,
                }
            }
        };
        if status != CampaignStatus::Active {
            return Err(CampaignError::InvalidTransition {
                from: status,
                to: CampaignStatus::Completed,
            });
        }

        let patch = CampaignPatch {
            status: Some(CampaignStatus::Completed),
            ..Default::default()
        };
        let mut ops = vec![WriteOp::update(
            collections::CAMPAIGNS,
            campaign_id,
            serde_json::to_value(&patch)?,
        )];
        if let Some(listing_id) = listing_id {
            ops.push(WriteOp::update(
                collections::LISTINGS,
                listing_id,
                json!({ "isPromoted": false }),
            ));
        }

        if let Err(e) = self.store.commit(ops).await {
            warn!(campaign_id, error = %e, "stop batch failed, applying mirror fallback");
            self.mirror.put_campaign_override(campaign_id, &patch);
            if let Some(listing_id) = listing_id {
                self.mirror
                    .put_listing_override(listing_id, &ListingPatch::promoted(false));
            }
        }
        Ok(())
    }

    /// Flip a campaign between normal and high priority. No cascading
    /// effects.
    pub async fn toggle_priority(&self, campaign: &AdCampaign) -> Result<Priority, CampaignError> {
        let visible = self.visible_campaign(campaign).await;
        let flipped = visible.priority.flipped();
        let patch = CampaignPatch {
            priority: Some(flipped),
            ..Default::default()
        };

        if let Err(e) = self
            .store
            .update(
                collections::CAMPAIGNS,
                &visible.id,
                serde_json::to_value(&patch)?,
            )
            .await
        {
            warn!(campaign_id = %visible.id, error = %e, "priority write failed, applying mirror fallback");
            self.mirror.put_campaign_override(&visible.id, &patch);
        }
        Ok(flipped)
    }

    /// Bump the impression counter. Counters are advisory; a failed
    /// write is dropped without fallback.
    pub async fn record_impression(&self, campaign: &AdCampaign) -> Result<(), CampaignError> {
        let impressions = campaign.impressions + 1;
        let ctr = if impressions > 0 {
            campaign.clicks as f64 / impressions as f64 * 100.0
        } else {
            0.0
        };
        self.write_counters(&campaign.id, impressions, campaign.clicks, ctr, campaign.cpc)
            .await;
        Ok(())
    }

    /// Bump the click counter and recompute CTR/CPC.
    pub async fn record_click(&self, campaign: &AdCampaign) -> Result<(), CampaignError> {
        let clicks = campaign.clicks + 1;
        let ctr = if campaign.impressions > 0 {
            clicks as f64 / campaign.impressions as f64 * 100.0
        } else {
            0.0
        };
        let cpc = campaign.total_cost as f64 / clicks as f64;
        self.write_counters(&campaign.id, campaign.impressions, clicks, ctr, cpc)
            .await;
        Ok(())
    }

    async fn write_counters(&self, campaign_id: &str, impressions: i64, clicks: i64, ctr: f64, cpc: f64) {
        let patch = json!({
            "impressions": impressions,
            "clicks": clicks,
            "ctr": ctr,
            "cpc": cpc,
        });
        if let Err(e) = self
            .store
            .update(collections::CAMPAIGNS, campaign_id, patch)
            .await
        {
            debug!(campaign_id, error = %e, "counter write dropped");
        }
    }

    async fn ad_pricing(&self) -> AdPricing {
        match self.store.get(collections::SETTINGS, "ad_pricing").await {
            Ok(Some(doc)) => serde_json::from_value(doc).unwrap_or_default(),
            Ok(None) => AdPricing::default(),
            Err(e) => {
                debug!(error = %e, "ad_pricing unreadable, using defaults");
                AdPricing::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::UpdateBus;
    use crate::store::MemoryStore;

    struct Harness {
        store: Arc<MemoryStore>,
        mirror: Arc<MirrorStore>,
        notifier: Arc<Notifier>,
        ledger: Arc<WalletLedger>,
        manager: CampaignManager,
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
        let manager = CampaignManager::new(dyn_store, mirror.clone(), notifier.clone(), ledger.clone());
        Harness {
            store,
            mirror,
            notifier,
            ledger,
            manager,
        }
    }

    async fn seed_vendor(h: &Harness, id: &str, balance: i64, total_spend: i64) {
        let mut user = User::new(id, format!("{}@bazaari.pk", id));
        user.wallet.balance = balance;
        user.wallet.total_spend = total_spend;
        h.store
            .set(collections::USERS, id, serde_json::to_value(&user).unwrap())
            .await
            .unwrap();
    }

    async fn seed_listing(h: &Harness, id: &str, vendor_id: &str) {
        h.store
            .set(
                collections::LISTINGS,
                id,
                json!({"id": id, "vendorId": vendor_id, "title": "Bike", "price": 45000, "isPromoted": false}),
            )
            .await
            .unwrap();
    }

    async fn seed_campaign(h: &Harness, campaign: &AdCampaign) {
        h.store
            .set(
                collections::CAMPAIGNS,
                &campaign.id,
                serde_json::to_value(campaign).unwrap(),
            )
            .await
            .unwrap();
    }

    fn pending_campaign(vendor: &str, listing: Option<&str>, cost: i64) -> AdCampaign {
        AdCampaign::new(
            vendor,
            listing.map(|s| s.to_string()),
            CampaignKind::FeaturedListing,
            cost,
            10,
        )
    }

    #[tokio::test]
    async fn test_approve_activates_and_promotes_listing() {
        let h = harness();
        seed_vendor(&h, "v1", 1000, 0).await;
        seed_listing(&h, "l1", "v1").await;
        let campaign = pending_campaign("v1", Some("l1"), 500);
        seed_campaign(&h, &campaign).await;

        let updated = h.manager.approve(&campaign).await.unwrap();
        assert_eq!(updated.status, CampaignStatus::Active);
        assert!(updated.start_date.is_some());
        assert!(updated.end_date.is_some());

        let doc = h.store.get(collections::CAMPAIGNS, &campaign.id).await.unwrap().unwrap();
        assert_eq!(doc["status"], "active");
        let listing = h.store.get(collections::LISTINGS, "l1").await.unwrap().unwrap();
        assert_eq!(listing["isPromoted"], true);
        assert_eq!(h.notifier.unread_count("v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_approve_without_listing_skips_listing_effect() {
        let h = harness();
        seed_vendor(&h, "v1", 1000, 0).await;
        let campaign = pending_campaign("v1", None, 500);
        seed_campaign(&h, &campaign).await;

        let updated = h.manager.approve(&campaign).await.unwrap();
        assert_eq!(updated.status, CampaignStatus::Active);
    }

    #[tokio::test]
    async fn test_reject_refunds_with_total_spend_floor() {
        let h = harness();
        seed_vendor(&h, "v1", 1000, 300).await;
        seed_listing(&h, "l1", "v1").await;
        let campaign = pending_campaign("v1", Some("l1"), 500);
        seed_campaign(&h, &campaign).await;

        let updated = h
            .manager
            .reject(&campaign, "blurry creative", None)
            .await
            .unwrap();
        assert_eq!(updated.status, CampaignStatus::Rejected);

        let user = h.store.get(collections::USERS, "v1").await.unwrap().unwrap();
        assert_eq!(user["wallet"]["balance"], 1500);
        assert_eq!(user["wallet"]["totalSpend"], 0);
        let history = user["walletHistory"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["type"], "adjustment");
        assert_eq!(history[0]["amount"], 500);

        let listing = h.store.get(collections::LISTINGS, "l1").await.unwrap().unwrap();
        assert_eq!(listing["isPromoted"], false);
    }

    #[tokio::test]
    async fn test_reject_requires_reason() {
        let h = harness();
        let campaign = pending_campaign("v1", None, 500);
        let err = h.manager.reject(&campaign, "  ", None).await.unwrap_err();
        assert!(matches!(err, CampaignError::Validation(_)));
    }

    #[tokio::test]
    async fn test_approve_then_reject_is_invalid_transition() {
        let h = harness();
        seed_vendor(&h, "v1", 1000, 0).await;
        let campaign = pending_campaign("v1", None, 500);
        seed_campaign(&h, &campaign).await;

        h.manager.approve(&campaign).await.unwrap();
        let err = h
            .manager
            .reject(&campaign, "too late", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CampaignError::InvalidTransition {
                from: CampaignStatus::Active,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_double_reject_does_not_double_refund() {
        let h = harness();
        seed_vendor(&h, "v1", 1000, 500).await;
        let campaign = pending_campaign("v1", None, 500);
        seed_campaign(&h, &campaign).await;

        h.manager.reject(&campaign, "first", None).await.unwrap();
        let err = h.manager.reject(&campaign, "second", None).await.unwrap_err();
        assert!(matches!(err, CampaignError::InvalidTransition { .. }));

        let user = h.store.get(collections::USERS, "v1").await.unwrap().unwrap();
        assert_eq!(user["wallet"]["balance"], 1500);
    }

    #[tokio::test]
    async fn test_approve_fallback_writes_mirror_and_drops_notification() {
        let h = harness();
        seed_vendor(&h, "v1", 1000, 0).await;
        seed_listing(&h, "l1", "v1").await;
        let campaign = pending_campaign("v1", Some("l1"), 500);
        seed_campaign(&h, &campaign).await;

        h.store.deny_writes(true);
        let updated = h.manager.approve(&campaign).await.unwrap();
        assert_eq!(updated.status, CampaignStatus::Active);

        let campaign_patch = h.mirror.campaign_override(&campaign.id).unwrap();
        assert_eq!(campaign_patch.status, Some(CampaignStatus::Active));
        let listing_patch = h.mirror.listing_override("l1").unwrap();
        assert_eq!(listing_patch.is_promoted, Some(true));

        h.store.deny_writes(false);
        assert_eq!(h.store.len(collections::NOTIFICATIONS), 0);
        // canonical record still pending; the divergence is accepted
        let doc = h.store.get(collections::CAMPAIGNS, &campaign.id).await.unwrap().unwrap();
        assert_eq!(doc["status"], "pending_approval");
    }

    #[tokio::test]
    async fn test_reject_fallback_refunds_through_mirror_once() {
        let h = harness();
        seed_vendor(&h, "v1", 1000, 300).await;
        let campaign = pending_campaign("v1", None, 500);
        seed_campaign(&h, &campaign).await;

        h.store.deny_writes(true);
        h.manager.reject(&campaign, "degraded mode", None).await.unwrap();

        let patch = h.mirror.wallet_override("v1").unwrap();
        assert_eq!(patch.balance, Some(1500));
        assert_eq!(patch.total_spend, Some(0));
        let history = h.mirror.local_history("v1");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TxKind::Adjustment);

        // the mirror override on status blocks a second resolution
        let err = h
            .manager
            .reject(&campaign, "again", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CampaignError::InvalidTransition { .. }));
        assert_eq!(h.mirror.local_history("v1").len(), 1);
    }

    #[tokio::test]
    async fn test_reject_uses_cached_wallet_when_vendor_unreadable() {
        let h = harness();
        // no vendor record seeded at all
        let campaign = pending_campaign("ghost", None, 500);
        seed_campaign(&h, &campaign).await;

        let cached = Wallet {
            balance: 250,
            total_spend: 700,
            pending_deposit: 0,
            pending_withdrawal: 0,
        };
        h.store.deny_writes(true);
        h.manager
            .reject(&campaign, "stale refund", Some(&cached))
            .await
            .unwrap();

        let patch = h.mirror.wallet_override("ghost").unwrap();
        assert_eq!(patch.balance, Some(750));
        assert_eq!(patch.total_spend, Some(200));
    }

    #[tokio::test]
    async fn test_stop_completes_without_refund() {
        let h = harness();
        seed_vendor(&h, "v1", 1000, 500).await;
        seed_listing(&h, "l1", "v1").await;
        let mut campaign = pending_campaign("v1", Some("l1"), 500);
        campaign.status = CampaignStatus::Active;
        seed_campaign(&h, &campaign).await;

        h.manager.stop(&campaign.id, Some("l1")).await.unwrap();

        let doc = h.store.get(collections::CAMPAIGNS, &campaign.id).await.unwrap().unwrap();
        assert_eq!(doc["status"], "completed");
        let listing = h.store.get(collections::LISTINGS, "l1").await.unwrap().unwrap();
        assert_eq!(listing["isPromoted"], false);
        let user = h.store.get(collections::USERS, "v1").await.unwrap().unwrap();
        assert_eq!(user["wallet"]["balance"], 1000);
        assert!(user.get("walletHistory").map(|h| h.as_array().unwrap().is_empty()).unwrap_or(true));
    }

    #[tokio::test]
    async fn test_stop_pending_campaign_is_invalid() {
        let h = harness();
        let campaign = pending_campaign("v1", None, 500);
        seed_campaign(&h, &campaign).await;
        let err = h.manager.stop(&campaign.id, None).await.unwrap_err();
        assert!(matches!(err, CampaignError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_toggle_priority_flips_both_ways() {
        let h = harness();
        let mut campaign = pending_campaign("v1", None, 500);
        campaign.status = CampaignStatus::Active;
        seed_campaign(&h, &campaign).await;

        assert_eq!(
            h.manager.toggle_priority(&campaign).await.unwrap(),
            Priority::High
        );
        assert_eq!(
            h.manager.toggle_priority(&campaign).await.unwrap(),
            Priority::Normal
        );
    }

    #[tokio::test]
    async fn test_create_prices_from_settings_and_debits_vendor() {
        let h = harness();
        seed_vendor(&h, "v1", 1000, 0).await;

        let campaign = h
            .manager
            .create("v1", Some("l1".to_string()), CampaignKind::FeaturedListing, 10)
            .await
            .unwrap();
        // default featured rate is Rs. 50/day
        assert_eq!(campaign.total_cost, 500);
        assert_eq!(campaign.status, CampaignStatus::PendingApproval);

        let view = h.ledger.merged_user_view("v1").await.unwrap().unwrap();
        assert_eq!(view.wallet.balance, 500);
        assert_eq!(view.wallet.total_spend, 500);
        assert_eq!(view.wallet_history.len(), 1);
        assert_eq!(view.wallet_history[0].kind, TxKind::Promotion);
    }

    #[tokio::test]
    async fn test_create_rejects_insufficient_funds() {
        let h = harness();
        seed_vendor(&h, "v1", 100, 0).await;
        let err = h
            .manager
            .create("v1", None, CampaignKind::BannerAd, 30)
            .await
            .unwrap_err();
        assert!(matches!(err, CampaignError::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn test_click_counters_recompute_ctr_and_cpc() {
        let h = harness();
        let mut campaign = pending_campaign("v1", None, 500);
        campaign.status = CampaignStatus::Active;
        campaign.impressions = 200;
        campaign.clicks = 9;
        seed_campaign(&h, &campaign).await;

        h.manager.record_click(&campaign).await.unwrap();

        let doc = h.store.get(collections::CAMPAIGNS, &campaign.id).await.unwrap().unwrap();
        assert_eq!(doc["clicks"], 10);
        assert_eq!(doc["ctr"], 5.0);
        assert_eq!(doc["cpc"], 50.0);
    }
}
