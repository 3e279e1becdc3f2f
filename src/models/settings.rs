//! Admin-tunable settings documents (`settings` collection).

use serde::{Deserialize, Serialize};

/// Per-day Rs. rates for each campaign type (`settings/ad_pricing`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdPricing {
    pub featured_listing: i64,
    pub banner_ad: i64,
    pub social_boost: i64,
}

impl Default for AdPricing {
    fn default() -> Self {
        Self {
            featured_listing: 50,
            banner_ad: 100,
            social_boost: 30,
        }
    }
}

impl AdPricing {
    pub fn daily_rate(&self, kind: crate::models::campaign::CampaignKind) -> i64 {
        use crate::models::campaign::CampaignKind;
        match kind {
            CampaignKind::FeaturedListing => self.featured_listing,
            CampaignKind::BannerAd => self.banner_ad,
            CampaignKind::SocialBoost => self.social_boost,
        }
    }
}

/// `settings/referrals`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferralSettings {
    pub enabled: bool,
    /// Rs. credited to each side of a successful referral.
    pub bonus_amount: i64,
}

impl Default for ReferralSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bonus_amount: 100,
        }
    }
}

/// Payment channel shown to depositing users (`settings/payment_info`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub name: String,
    pub account_name: String,
    pub account_number: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentInfo {
    pub methods: Vec<PaymentMethod>,
}
