//! User and wallet models

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::transaction::Transaction;

/// Embedded wallet. All amounts are whole-number Rs. and non-negative;
/// `pending_deposit`/`pending_withdrawal` track amounts awaiting an admin
/// decision and are reconciled exactly once per request resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Wallet {
    pub balance: i64,
    pub total_spend: i64,
    pub pending_deposit: i64,
    pub pending_withdrawal: i64,
}

/// Partial wallet update. A field left `None` is untouched; a present
/// field replaces the canonical value on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_spend: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_deposit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_withdrawal: Option<i64>,
}

impl WalletPatch {
    /// Full snapshot of a wallet, every field present.
    pub fn snapshot(wallet: &Wallet) -> Self {
        Self {
            balance: Some(wallet.balance),
            total_spend: Some(wallet.total_spend),
            pending_deposit: Some(wallet.pending_deposit),
            pending_withdrawal: Some(wallet.pending_withdrawal),
        }
    }

    /// Layer `other` on top of `self`, field by field.
    pub fn overlaid(&self, other: &WalletPatch) -> Self {
        Self {
            balance: other.balance.or(self.balance),
            total_spend: other.total_spend.or(self.total_spend),
            pending_deposit: other.pending_deposit.or(self.pending_deposit),
            pending_withdrawal: other.pending_withdrawal.or(self.pending_withdrawal),
        }
    }
}

/// Canonical user document (`users` collection).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub wallet: Wallet,
    /// Insertion-ordered, newest first by convention at read time.
    #[serde(default)]
    pub wallet_history: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: String::new(),
            wallet: Wallet::default(),
            wallet_history: Vec::new(),
            referral_code: Some(fresh_referral_code()),
            referred_by: None,
        }
    }
}

/// 8-character uppercase alphanumeric referral code.
pub fn fresh_referral_code() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_serde_field_names() {
        let wallet = Wallet {
            balance: 1000,
            total_spend: 250,
            pending_deposit: 50,
            pending_withdrawal: 0,
        };
        let value = serde_json::to_value(&wallet).unwrap();
        assert_eq!(value["balance"], 1000);
        assert_eq!(value["totalSpend"], 250);
        assert_eq!(value["pendingDeposit"], 50);
    }

    #[test]
    fn test_patch_skips_absent_fields() {
        let patch = WalletPatch {
            balance: Some(800),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value["balance"], 800);
        assert!(value.get("totalSpend").is_none());
    }

    #[test]
    fn test_partial_user_doc_parses() {
        let user: User =
            serde_json::from_str(r#"{"id":"u1","email":"a@b.pk"}"#).unwrap();
        assert_eq!(user.wallet, Wallet::default());
        assert!(user.wallet_history.is_empty());
    }

    #[test]
    fn test_referral_code_shape() {
        let code = fresh_referral_code();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
