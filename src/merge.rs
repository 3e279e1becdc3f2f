//! Field-level merge of canonical documents with local-mirror overrides.
//!
//! One policy per field, stated explicitly:
//! - wallet balance/totalSpend/pendingDeposit/pendingWithdrawal: override
//!   wins, per field present in the patch;
//! - wallet history: canonical array first, then local-only transactions
//!   (dedup by id, canonical wins on conflict, local discovery order
//!   kept; sorting by date is the renderer's job, not done here);
//! - listing/campaign fields: override wins per patch field.
//!
//! Pure functions; no storage backend involved.

use std::collections::HashSet;

use crate::models::campaign::{AdCampaign, CampaignPatch};
use crate::models::listing::{Listing, ListingPatch};
use crate::models::transaction::Transaction;
use crate::models::user::{Wallet, WalletPatch};

pub fn merge_wallet(canonical: &Wallet, patch: &WalletPatch) -> Wallet {
    Wallet {
        balance: patch.balance.unwrap_or(canonical.balance),
        total_spend: patch.total_spend.unwrap_or(canonical.total_spend),
        pending_deposit: patch.pending_deposit.unwrap_or(canonical.pending_deposit),
        pending_withdrawal: patch
            .pending_withdrawal
            .unwrap_or(canonical.pending_withdrawal),
    }
}

pub fn merge_history(canonical: &[Transaction], local: &[Transaction]) -> Vec<Transaction> {
    let seen: HashSet<&str> = canonical.iter().map(|tx| tx.id.as_str()).collect();
    let mut merged: Vec<Transaction> = canonical.to_vec();
    merged.extend(
        local
            .iter()
            .filter(|tx| !seen.contains(tx.id.as_str()))
            .cloned(),
    );
    merged
}

pub fn merge_listing(canonical: &Listing, patch: &ListingPatch) -> Listing {
    Listing {
        id: canonical.id.clone(),
        vendor_id: canonical.vendor_id.clone(),
        title: patch.title.clone().unwrap_or_else(|| canonical.title.clone()),
        price: patch.price.unwrap_or(canonical.price),
        is_promoted: patch.is_promoted.unwrap_or(canonical.is_promoted),
    }
}

pub fn merge_campaign(canonical: &AdCampaign, patch: &CampaignPatch) -> AdCampaign {
    let mut merged = canonical.clone();
    if let Some(status) = patch.status {
        merged.status = status;
    }
    if let Some(start) = &patch.start_date {
        merged.start_date = Some(start.clone());
    }
    if let Some(end) = &patch.end_date {
        merged.end_date = Some(end.clone());
    }
    if let Some(priority) = patch.priority {
        merged.priority = priority;
    }
    merged
}
