//! Local mirror store.
//!
//! Per-device key-value shadow of canonical records, so wallet and
//! promotion state stay usable while the canonical backend rejects
//! writes. Keys hold JSON maps of entity id to override blob. Everything
//! here is synchronous; this layer must never wait on the network.
//!
//! Entries are created lazily on first fallback write and are never
//! garbage-collected; the optional snapshot file stands in for the
//! browser profile the overrides would otherwise live in.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::models::campaign::CampaignPatch;
use crate::models::listing::ListingPatch;
use crate::models::transaction::Transaction;
use crate::models::user::WalletPatch;
use crate::signal::{Signal, UpdateBus};

pub mod keys {
    pub const USER_WALLETS: &str = "demo_user_wallets";
    pub const USER_HISTORY: &str = "demo_user_history";
    pub const USER_FAVORITES: &str = "demo_user_favorites";
    pub const LISTING_OVERRIDES: &str = "demo_listings_overrides";
    pub const CAMPAIGN_OVERRIDES: &str = "admin_campaign_overrides";
    pub const REQUEST_OVERRIDES: &str = "admin_request_overrides";
}

pub struct MirrorStore {
    data: RwLock<HashMap<String, String>>,
    bus: UpdateBus,
}

impl MirrorStore {
    pub fn new(bus: UpdateBus) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            bus,
        }
    }

    pub fn bus(&self) -> &UpdateBus {
        &self.bus
    }

    /// Raw string value for a key, if present.
    pub fn raw(&self, key: &str) -> Option<String> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.get(key).cloned()
    }

    fn read_map<T: DeserializeOwned>(&self, key: &str) -> HashMap<String, T> {
        let raw = match self.raw(key) {
            Some(raw) => raw,
            None => return HashMap::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                warn!(key, error = %e, "discarding unparseable mirror entry");
                HashMap::new()
            }
        }
    }

    fn write_map<T: Serialize>(&self, key: &str, map: &HashMap<String, T>) {
        match serde_json::to_string(map) {
            Ok(raw) => {
                let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
                data.insert(key.to_string(), raw);
            }
            Err(e) => warn!(key, error = %e, "failed to serialize mirror entry"),
        }
    }

    // wallet overrides

    pub fn wallet_override(&self, user_id: &str) -> Option<WalletPatch> {
        self.read_map::<WalletPatch>(keys::USER_WALLETS)
            .remove(user_id)
    }

    /// Layer `patch` onto any existing override for the user and publish
    /// a wallet signal.
    pub fn put_wallet_override(&self, user_id: &str, patch: &WalletPatch) {
        let mut map = self.read_map::<WalletPatch>(keys::USER_WALLETS);
        let merged = match map.get(user_id) {
            Some(existing) => existing.overlaid(patch),
            None => patch.clone(),
        };
        map.insert(user_id.to_string(), merged);
        self.write_map(keys::USER_WALLETS, &map);
        self.bus.publish(Signal::WalletUpdated {
            user_id: user_id.to_string(),
        });
    }

    // locally-recorded transactions

    pub fn local_history(&self, user_id: &str) -> Vec<Transaction> {
        self.read_map::<Vec<Transaction>>(keys::USER_HISTORY)
            .remove(user_id)
            .unwrap_or_default()
    }

    /// Prepend a transaction to the user's locally-recorded history.
    pub fn prepend_transaction(&self, user_id: &str, tx: &Transaction) {
        let mut map = self.read_map::<Vec<Transaction>>(keys::USER_HISTORY);
        let history = map.entry(user_id.to_string()).or_default();
        history.insert(0, tx.clone());
        self.write_map(keys::USER_HISTORY, &map);
        self.bus.publish(Signal::WalletUpdated {
            user_id: user_id.to_string(),
        });
    }

    // listing overrides

    pub fn listing_override(&self, listing_id: &str) -> Option<ListingPatch> {
        self.read_map::<ListingPatch>(keys::LISTING_OVERRIDES)
            .remove(listing_id)
    }

    pub fn put_listing_override(&self, listing_id: &str, patch: &ListingPatch) {
        let mut map = self.read_map::<ListingPatch>(keys::LISTING_OVERRIDES);
        let merged = match map.get(listing_id) {
            Some(existing) => existing.overlaid(patch),
            None => patch.clone(),
        };
        map.insert(listing_id.to_string(), merged);
        self.write_map(keys::LISTING_OVERRIDES, &map);
        self.bus.publish(Signal::ListingUpdated {
            listing_id: listing_id.to_string(),
        });
    }

    // campaign overrides

    pub fn campaign_override(&self, campaign_id: &str) -> Option<CampaignPatch> {
        self.read_map::<CampaignPatch>(keys::CAMPAIGN_OVERRIDES)
            .remove(campaign_id)
    }

    pub fn put_campaign_override(&self, campaign_id: &str, patch: &CampaignPatch) {
        let mut map = self.read_map::<CampaignPatch>(keys::CAMPAIGN_OVERRIDES);
        let merged = match map.get(campaign_id) {
            Some(existing) => existing.overlaid(patch),
            None => patch.clone(),
        };
        map.insert(campaign_id.to_string(), merged);
        self.write_map(keys::CAMPAIGN_OVERRIDES, &map);
        self.bus.publish(Signal::CampaignUpdated {
            campaign_id: campaign_id.to_string(),
        });
    }

    // resolved payment requests

    /// Locally-recorded resolution of a deposit/withdrawal request, if
    /// the canonical status flip never landed.
    pub fn request_override(&self, request_id: &str) -> Option<String> {
        self.read_map::<String>(keys::REQUEST_OVERRIDES)
            .remove(request_id)
    }

    /// Record a request resolution so a retry cannot resolve it again.
    pub fn put_request_override(&self, request_id: &str, status: &str) {
        let mut map = self.read_map::<String>(keys::REQUEST_OVERRIDES);
        map.insert(request_id.to_string(), status.to_string());
        self.write_map(keys::REQUEST_OVERRIDES, &map);
        self.bus.publish(Signal::RequestUpdated {
            request_id: request_id.to_string(),
        });
    }

    // favorites (purely local feature, no canonical counterpart)

    pub fn favorites(&self, user_id: &str) -> Vec<String> {
        self.read_map::<Vec<String>>(keys::USER_FAVORITES)
            .remove(user_id)
            .unwrap_or_default()
    }

    /// Add or remove a listing from the user's favorites. Returns whether
    /// the listing is a favorite afterwards.
    pub fn toggle_favorite(&self, user_id: &str, listing_id: &str) -> bool {
        let mut map = self.read_map::<Vec<String>>(keys::USER_FAVORITES);
        let favorites = map.entry(user_id.to_string()).or_default();
        let now_favorite = match favorites.iter().position(|id| id == listing_id) {
            Some(pos) => {
                favorites.remove(pos);
                false
            }
            None => {
                favorites.push(listing_id.to_string());
                true
            }
        };
        self.write_map(keys::USER_FAVORITES, &map);
        self.bus.publish(Signal::FavoritesUpdated {
            user_id: user_id.to_string(),
        });
        now_favorite
    }

    // snapshot persistence

    /// Write the whole mirror to a JSON file.
    pub fn snapshot_to(&self, path: &Path) -> io::Result<()> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        let raw = serde_json::to_string_pretty(&*data)?;
        std::fs::write(path, raw)
    }

    /// Replace the mirror's contents from a snapshot file.
    pub fn load_from(&self, path: &Path) -> io::Result<()> {
        let raw = std::fs::read_to_string(path)?;
        let loaded: HashMap<String, String> = serde_json::from_str(&raw)?;
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        *data = loaded;
        Ok(())
    }
}
