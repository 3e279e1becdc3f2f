//! Cross-view refresh signaling.
//!
//! Every local-mirror mutation publishes a [`Signal`] so open views can
//! re-merge immediately. This is an explicit broadcast channel scoped to
//! the application graph; subscribers that lag simply miss signals and
//! re-merge on the next one.

use tokio::sync::broadcast;

/// What changed, by entity id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    WalletUpdated { user_id: String },
    CampaignUpdated { campaign_id: String },
    ListingUpdated { listing_id: String },
    FavoritesUpdated { user_id: String },
    RequestUpdated { request_id: String },
}

/// Broadcast bus for [`Signal`]s. Cheap to clone; all clones share the
/// same channel.
#[derive(Debug, Clone)]
pub struct UpdateBus {
    tx: broadcast::Sender<Signal>,
}

impl UpdateBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }

    /// Publish a signal. Having no subscribers is not an error.
    pub fn publish(&self, signal: Signal) {
        let _ = self.tx.send(signal);
    }
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new(64)
    }
}
