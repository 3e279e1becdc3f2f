//! Listing models, at the boundary the ledger and campaigns touch.
//!
//! Listings carry far more fields in the full application; only the
//! promotion flag is semantically owned here, the rest rides along as
//! opaque document data.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub vendor_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub is_promoted: bool,
}

/// Partial listing update used by the local override mirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_promoted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ListingPatch {
    pub fn promoted(flag: bool) -> Self {
        Self {
            is_promoted: Some(flag),
            ..Default::default()
        }
    }

    pub fn overlaid(&self, other: &ListingPatch) -> Self {
        Self {
            is_promoted: other.is_promoted.or(self.is_promoted),
            price: other.price.or(self.price),
            title: other.title.clone().or_else(|| self.title.clone()),
        }
    }
}
