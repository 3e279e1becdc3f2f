//! Referral bonuses.
//!
//! When a new user signs up with someone's referral code and the feature
//! is enabled in settings, both sides are credited the configured bonus
//! through the ledger. Unknown or self-referring codes are a silent
//! no-op.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::models::notification::NotificationKind;
use crate::models::settings::ReferralSettings;
use crate::models::transaction::TxKind;
use crate::models::user::User;
use crate::services::ledger::{WalletAffects, WalletLedger};
use crate::services::notifications::Notifier;
use crate::store::{collections, DocumentStore};

pub struct ReferralService {
    store: Arc<dyn DocumentStore>,
    ledger: Arc<WalletLedger>,
    notifier: Arc<Notifier>,
}

impl ReferralService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        ledger: Arc<WalletLedger>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            store,
            ledger,
            notifier,
        }
    }

    async fn settings(&self) -> ReferralSettings {
        match self.store.get(collections::SETTINGS, "referrals").await {
            Ok(Some(doc)) => serde_json::from_value(doc).unwrap_or_default(),
            Ok(None) => ReferralSettings::default(),
            Err(e) => {
                debug!(error = %e, "referral settings unreadable, using defaults");
                ReferralSettings::default()
            }
        }
    }

    /// Credit both sides of a referral. Returns the bonus amount applied,
    /// or zero when nothing happened.
    pub async fn apply_referral_bonus(
        &self,
        new_user_id: &str,
        referral_code: &str,
    ) -> Result<i64, LedgerError> {
        let settings = self.settings().await;
        if !settings.enabled || settings.bonus_amount <= 0 {
            return Ok(0);
        }

        let hits = self
            .store
            .query_eq(collections::USERS, "referralCode", &json!(referral_code))
            .await?;
        let referrer = match hits
            .into_iter()
            .filter_map(|(_, doc)| serde_json::from_value::<User>(doc).ok())
            .next()
        {
            Some(user) => user,
            None => {
                debug!(referral_code, "no user owns this referral code");
                return Ok(0);
            }
        };
        if referrer.id == new_user_id {
            debug!(new_user_id, "self-referral ignored");
            return Ok(0);
        }

        let bonus = settings.bonus_amount;
        self.ledger
            .apply_delta(
                new_user_id,
                bonus,
                TxKind::ReferralBonus,
                "Welcome bonus for joining via referral",
                WalletAffects::balance_only(),
                None,
            )
            .await?;
        self.ledger
            .apply_delta(
                &referrer.id,
                bonus,
                TxKind::ReferralBonus,
                "Referral bonus for inviting a new user",
                WalletAffects::balance_only(),
                Some(&referrer.wallet),
            )
            .await?;

        self.notifier
            .emit(
                &referrer.id,
                "Referral bonus earned",
                &format!("Someone joined with your code. Rs. {} added to your wallet.", bonus),
                NotificationKind::Referral,
                None,
            )
            .await;

        info!(new_user_id, referrer_id = %referrer.id, bonus, "referral bonus applied");
        Ok(bonus)
    }
}
