use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bazaari::db::{self, MySqlStore};
use bazaari::models::settings::{AdPricing, PaymentInfo, ReferralSettings};
use bazaari::store::{collections, DocumentStore};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("bazaari=debug".parse().unwrap())
                .add_directive("sqlx=warn".parse().unwrap()),
        )
        .with_target(true)
        .init();

    info!("Starting bazaari marketplace core...");

    info!("Initializing database...");
    let pool = match db::init_db().await {
        Ok(p) => {
            info!("Database initialized successfully");
            p
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return;
        }
    };

    let store: Arc<dyn DocumentStore> = Arc::new(MySqlStore::new(pool));

    seed_settings(store.as_ref()).await;

    // ops visibility: log pending money movement as it arrives
    let mut deposits = store.watch(collections::DEPOSITS);
    let mut withdrawals = store.watch(collections::WITHDRAWALS);
    let mut campaigns = store.watch(collections::CAMPAIGNS);

    info!("Watching deposits, withdrawals and campaigns; Ctrl-C to stop");
    loop {
        tokio::select! {
            event = deposits.recv() => match event {
                Ok(event) => info!(id = %event.id, "deposit request activity"),
                Err(e) => warn!("deposit feed lagged: {}", e),
            },
            event = withdrawals.recv() => match event {
                Ok(event) => info!(id = %event.id, "withdrawal request activity"),
                Err(e) => warn!("withdrawal feed lagged: {}", e),
            },
            event = campaigns.recv() => match event {
                Ok(event) => info!(id = %event.id, "campaign activity"),
                Err(e) => warn!("campaign feed lagged: {}", e),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }
}

/// Write default settings documents for any that are missing.
async fn seed_settings(store: &dyn DocumentStore) {
    seed_doc(store, "ad_pricing", &AdPricing::default()).await;
    seed_doc(store, "referrals", &ReferralSettings::default()).await;
    seed_doc(store, "payment_info", &PaymentInfo::default()).await;
}

async fn seed_doc<T: serde::Serialize>(store: &dyn DocumentStore, id: &str, value: &T) {
    match store.get(collections::SETTINGS, id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let doc = match serde_json::to_value(value) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(id, error = %e, "settings default not serializable");
                    return;
                }
            };
            if let Err(e) = store.set(collections::SETTINGS, id, doc).await {
                warn!(id, error = %e, "failed to seed settings document");
            } else {
                info!(id, "seeded default settings document");
            }
        }
        Err(e) => warn!(id, error = %e, "settings read failed during seeding"),
    }
}
