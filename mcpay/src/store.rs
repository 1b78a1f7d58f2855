//! Wallet records and the store that serves them.
//!
//! Strategies read wallet metadata through [`WalletStore`]; they never hold
//! private keys of managed wallets. [`InMemoryWalletStore`] backs tests and
//! single-process deployments.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// How a wallet is custodied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    /// Keys held by an external provider on the user's behalf.
    Managed,
    /// Keys held by the user.
    External,
}

/// Wallet metadata for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    /// On-chain address.
    pub address: String,
    /// Provider identifier (e.g., `"managed"`).
    pub provider: String,
    /// The provider's own account id for this wallet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_account_id: Option<String>,
    /// Custody type.
    pub wallet_type: WalletType,
    /// Whether this is the user's primary wallet.
    pub is_primary: bool,
    /// Whether the wallet may be used at all.
    pub is_active: bool,
}

impl WalletRecord {
    /// Creates an active, primary managed wallet.
    #[must_use]
    pub fn managed(
        address: impl Into<String>,
        provider: impl Into<String>,
        provider_account_id: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            provider: provider.into(),
            provider_account_id: Some(provider_account_id.into()),
            wallet_type: WalletType::Managed,
            is_primary: true,
            is_active: true,
        }
    }

    /// Returns `true` if this wallet can be signed for by `provider`.
    #[must_use]
    pub fn is_usable_managed(&self, provider: &str) -> bool {
        self.is_active
            && self.is_primary
            && self.wallet_type == WalletType::Managed
            && self.provider == provider
            && self
                .provider_account_id
                .as_deref()
                .is_some_and(|id| !id.is_empty())
    }
}

/// Errors raised by a [`WalletStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("wallet store unavailable: {0}")]
    Unavailable(String),
    /// Stored data could not be decoded.
    #[error("corrupt wallet record: {0}")]
    Corrupt(String),
}

/// Read access to per-user wallet records.
#[async_trait::async_trait]
pub trait WalletStore: Send + Sync {
    /// Returns every wallet record of `user_id`.
    async fn wallets_for_user(&self, user_id: &str) -> Result<Vec<WalletRecord>, StoreError>;
}

#[async_trait::async_trait]
impl<T: WalletStore + ?Sized> WalletStore for Arc<T> {
    async fn wallets_for_user(&self, user_id: &str) -> Result<Vec<WalletRecord>, StoreError> {
        (**self).wallets_for_user(user_id).await
    }
}

/// Concurrent in-memory [`WalletStore`].
#[derive(Debug, Default)]
pub struct InMemoryWalletStore {
    wallets: DashMap<String, Vec<WalletRecord>>,
}

impl InMemoryWalletStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a wallet to `user_id`.
    pub fn insert(&self, user_id: impl Into<String>, record: WalletRecord) {
        self.wallets.entry(user_id.into()).or_default().push(record);
    }

    /// Removes every wallet of `user_id`, returning them.
    pub fn remove(&self, user_id: &str) -> Vec<WalletRecord> {
        self.wallets
            .remove(user_id)
            .map(|(_, records)| records)
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn wallets_for_user(&self, user_id: &str) -> Result<Vec<WalletRecord>, StoreError> {
        Ok(self
            .wallets
            .get(user_id)
            .map(|records| records.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryWalletStore::new();
        assert!(store.wallets_for_user("u1").await.unwrap().is_empty());

        store.insert("u1", WalletRecord::managed("0xabc", "managed", "acct-1"));
        let wallets = store.wallets_for_user("u1").await.unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].provider_account_id.as_deref(), Some("acct-1"));

        assert_eq!(store.remove("u1").len(), 1);
        assert!(store.wallets_for_user("u1").await.unwrap().is_empty());
    }

    #[test]
    fn test_usable_managed_wallet() {
        let mut record = WalletRecord::managed("0xabc", "managed", "acct-1");
        assert!(record.is_usable_managed("managed"));
        assert!(!record.is_usable_managed("other"));

        record.is_active = false;
        assert!(!record.is_usable_managed("managed"));

        let mut record = WalletRecord::managed("0xabc", "managed", "");
        assert!(!record.is_usable_managed("managed"));
        record.provider_account_id = Some("acct".into());
        record.wallet_type = WalletType::External;
        assert!(!record.is_usable_managed("managed"));
    }

    #[test]
    fn test_record_wire_shape() {
        let record: WalletRecord = serde_json::from_value(serde_json::json!({
            "address": "0xabc",
            "provider": "managed",
            "providerAccountId": "acct-1",
            "walletType": "managed",
            "isPrimary": true,
            "isActive": true
        }))
        .unwrap();
        assert_eq!(record, WalletRecord::managed("0xabc", "managed", "acct-1"));
    }
}
