//! Ad campaign models

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignKind {
    FeaturedListing,
    BannerAd,
    SocialBoost,
}

impl CampaignKind {
    pub fn label(&self) -> &'static str {
        match self {
            CampaignKind::FeaturedListing => "Featured Listing",
            CampaignKind::BannerAd => "Banner Ad",
            CampaignKind::SocialBoost => "Social Boost",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    PendingApproval,
    Active,
    Paused,
    Rejected,
    Completed,
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CampaignStatus::PendingApproval => "pending_approval",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Rejected => "rejected",
            CampaignStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
}

impl Priority {
    pub fn flipped(&self) -> Self {
        match self {
            Priority::Normal => Priority::High,
            Priority::High => Priority::Normal,
        }
    }
}

/// Paid promotion attached to a listing (`campaigns` collection).
///
/// An active campaign implies the linked listing is promoted; rejection or
/// completion clears the flag. The link is best-effort, not atomic with
/// campaign state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCampaign {
    pub id: String,
    pub vendor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: CampaignKind,
    pub status: CampaignStatus,
    /// Total budget in Rs., debited at creation.
    pub total_cost: i64,
    pub duration_days: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub impressions: i64,
    #[serde(default)]
    pub clicks: i64,
    /// Click-through rate, percent.
    #[serde(default)]
    pub ctr: f64,
    /// Cost per click, Rs.
    #[serde(default)]
    pub cpc: f64,
}

impl AdCampaign {
    pub fn new(
        vendor_id: impl Into<String>,
        listing_id: Option<String>,
        kind: CampaignKind,
        total_cost: i64,
        duration_days: i64,
    ) -> Self {
        Self {
            id: format!("camp_{}", Uuid::new_v4().simple()),
            vendor_id: vendor_id.into(),
            listing_id,
            kind,
            status: CampaignStatus::PendingApproval,
            total_cost,
            duration_days,
            start_date: None,
            end_date: None,
            priority: Priority::Normal,
            impressions: 0,
            clicks: 0,
            ctr: 0.0,
            cpc: 0.0,
        }
    }
}

/// Partial campaign update used by the local override mirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CampaignPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CampaignStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl CampaignPatch {
    pub fn overlaid(&self, other: &CampaignPatch) -> Self {
        Self {
            status: other.status.or(self.status),
            start_date: other.start_date.clone().or_else(|| self.start_date.clone()),
            end_date: other.end_date.clone().or_else(|| self.end_date.clone()),
            priority: other.priority.or(self.priority),
        }
    }
}
