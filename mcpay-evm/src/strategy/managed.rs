//! Signing through a managed-custody wallet provider.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Signature};
use mcpay::proto::UnixTimestamp;
use mcpay::store::{StoreError, WalletRecord, WalletStore};
use mcpay::{BoxFuture, SignedPayment, SigningContext, SigningStrategy, StrategyError};

use crate::exact::{
    Eip3009SigningParams, SignerLike, SigningError, encode_exact_payment, random_nonce,
    sign_erc3009_authorization,
};
use crate::provider::WalletProvider;

/// Registry and result name of [`ManagedWalletStrategy`].
pub const MANAGED_STRATEGY_NAME: &str = "managed-wallet";

/// Priority of [`ManagedWalletStrategy`].
pub const MANAGED_STRATEGY_PRIORITY: i32 = 100;

/// Signs with the user's primary managed wallet.
///
/// Wallet metadata comes from a [`WalletStore`]; the key never leaves the
/// [`WalletProvider`]. The provider must report the stored wallet address
/// for the account before it is asked to sign, and its signature must
/// recover to that address.
pub struct ManagedWalletStrategy {
    store: Arc<dyn WalletStore>,
    provider: Arc<dyn WalletProvider>,
}

impl std::fmt::Debug for ManagedWalletStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedWalletStrategy")
            .field("provider", &self.provider.provider_name())
            .finish_non_exhaustive()
    }
}

impl ManagedWalletStrategy {
    /// Creates a strategy over `store` and `provider`.
    #[must_use]
    pub fn new(store: Arc<dyn WalletStore>, provider: Arc<dyn WalletProvider>) -> Self {
        Self { store, provider }
    }

    async fn usable_wallet(&self, user_id: &str) -> Result<Option<WalletRecord>, StrategyError> {
        let provider = self.provider.provider_name();
        Ok(self
            .store
            .wallets_for_user(user_id)
            .await?
            .into_iter()
            .find(|wallet| wallet.is_usable_managed(provider)))
    }

    async fn sign(&self, context: &SigningContext) -> Result<SignedPayment, StrategyError> {
        let requirement = context.requirement()?;
        let user_id = &context.user().id;
        let wallet = self
            .usable_wallet(user_id)
            .await?
            .ok_or_else(|| StrategyError::NoWallet(user_id.clone()))?;
        let address = Address::from_str(&wallet.address).map_err(|_| {
            StoreError::Corrupt(format!("wallet address {:?} of user {user_id}", wallet.address))
        })?;
        let account_id = wallet.provider_account_id.as_deref().unwrap_or_default();

        let params = Eip3009SigningParams::from_requirement(
            requirement,
            UnixTimestamp::now(),
            random_nonce(),
        )?;

        if context.is_cancelled() {
            return Err(StrategyError::Cancelled);
        }
        let custodied = self.provider.account_address(account_id).await?;
        if custodied != address {
            return Err(StrategyError::Provider(format!(
                "account {account_id} holds {custodied}, wallet record of user {user_id} says {address}"
            )));
        }

        if context.is_cancelled() {
            return Err(StrategyError::Cancelled);
        }
        let signer = ProviderSigner {
            provider: self.provider.as_ref(),
            account_id,
            address,
        };
        let payload = sign_erc3009_authorization(&signer, &params).await?;
        tracing::debug!(
            user_id = %user_id,
            wallet = %address,
            "Managed wallet signed authorization"
        );

        Ok(SignedPayment {
            signed_payment_header: encode_exact_payment(requirement, payload)?,
            wallet_address: address.to_checksum(None),
        })
    }
}

impl SigningStrategy for ManagedWalletStrategy {
    fn name(&self) -> &str {
        MANAGED_STRATEGY_NAME
    }

    fn priority(&self) -> i32 {
        MANAGED_STRATEGY_PRIORITY
    }

    fn can_sign<'a>(
        &'a self,
        context: &'a SigningContext,
    ) -> BoxFuture<'a, Result<bool, StrategyError>> {
        Box::pin(async move { Ok(self.usable_wallet(&context.user().id).await?.is_some()) })
    }

    fn sign_payment<'a>(
        &'a self,
        context: &'a SigningContext,
    ) -> BoxFuture<'a, Result<SignedPayment, StrategyError>> {
        Box::pin(self.sign(context))
    }
}

/// Adapts one provider account to [`SignerLike`].
struct ProviderSigner<'a> {
    provider: &'a dyn WalletProvider,
    account_id: &'a str,
    address: Address,
}

impl SignerLike for ProviderSigner<'_> {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, SigningError> {
        self.provider
            .sign_hash(self.account_id, *hash)
            .await
            .map_err(|e| SigningError::Signer(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use mcpay::proto::{PaymentPayload, decode_payment_header};
    use mcpay::requirement::build_payment_requirement;
    use mcpay::store::InMemoryWalletStore;
    use mcpay::{AuthenticatedUser, ToolCall, ToolPayment};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::exact::ExactEvmPayload;
    use crate::provider::ProviderError;

    /// Provider reporting `key`'s address and signing with `signs_with`.
    struct LocalProvider {
        key: PrivateKeySigner,
        signs_with: PrivateKeySigner,
        calls: AtomicUsize,
    }

    impl LocalProvider {
        fn honest(key: PrivateKeySigner) -> Self {
            Self {
                signs_with: key.clone(),
                key,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl WalletProvider for LocalProvider {
        fn provider_name(&self) -> &str {
            "managed"
        }

        async fn account_address(&self, _account_id: &str) -> Result<Address, ProviderError> {
            Ok(self.key.address())
        }

        async fn sign_hash(
            &self,
            _account_id: &str,
            hash: B256,
        ) -> Result<Signature, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.signs_with
                .sign_hash_sync(&hash)
                .map_err(|e| ProviderError::InvalidSignature(e.to_string()))
        }
    }

    fn context(user_id: &str) -> SigningContext {
        let payment = ToolPayment::from_usdc_price(
            "1.50",
            "base",
            "https://mcp.example.com/tools/search",
            "Search",
        )
        .unwrap()
        .with_pay_to("0x209693Bc6afc0C5328bA36FaF03C514EF312287C");
        let requirement = build_payment_requirement(&payment.requirement_params("")).unwrap();
        SigningContext::new(
            ToolCall::paid(payment),
            AuthenticatedUser::new(user_id),
            vec![requirement],
        )
    }

    fn setup(
        provider: LocalProvider,
    ) -> (Arc<InMemoryWalletStore>, Arc<LocalProvider>, ManagedWalletStrategy) {
        let store = Arc::new(InMemoryWalletStore::new());
        let provider = Arc::new(provider);
        let strategy = ManagedWalletStrategy::new(
            Arc::clone(&store) as Arc<dyn WalletStore>,
            Arc::clone(&provider) as Arc<dyn WalletProvider>,
        );
        (store, provider, strategy)
    }

    fn wallet(key: &PrivateKeySigner) -> WalletRecord {
        WalletRecord::managed(key.address().to_checksum(None), "managed", "acct-1")
    }

    #[tokio::test]
    async fn test_no_wallet_cannot_sign() {
        let key = PrivateKeySigner::random();
        let (store, _, strategy) = setup(LocalProvider::honest(key.clone()));
        assert!(!strategy.can_sign(&context("user-1")).await.unwrap());

        let mut inactive = wallet(&key);
        inactive.is_active = false;
        store.insert("user-1", inactive);
        assert!(!strategy.can_sign(&context("user-1")).await.unwrap());

        let mut foreign = wallet(&key);
        foreign.provider = "other".into();
        store.insert("user-1", foreign);
        assert!(!strategy.can_sign(&context("user-1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_signs_with_managed_wallet() {
        let key = PrivateKeySigner::random();
        let (store, provider, strategy) = setup(LocalProvider::honest(key.clone()));
        store.insert("user-1", wallet(&key));

        let ctx = context("user-1");
        assert!(strategy.can_sign(&ctx).await.unwrap());
        let signed = strategy.sign_payment(&ctx).await.unwrap();

        assert_eq!(signed.wallet_address, key.address().to_checksum(None));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let decoded: PaymentPayload<ExactEvmPayload> =
            decode_payment_header(&signed.signed_payment_header).unwrap();
        assert_eq!(decoded.network, "base");
        assert_eq!(decoded.payload.authorization.from, key.address());
        assert_eq!(decoded.payload.authorization.value, "1500000");
    }

    #[tokio::test]
    async fn test_wallet_removed_after_check() {
        let key = PrivateKeySigner::random();
        let (store, provider, strategy) = setup(LocalProvider::honest(key.clone()));
        store.insert("user-1", wallet(&key));

        let ctx = context("user-1");
        assert!(strategy.can_sign(&ctx).await.unwrap());
        store.remove("user-1");

        let err = strategy.sign_payment(&ctx).await.unwrap_err();
        assert!(matches!(err, StrategyError::NoWallet(ref id) if id == "user-1"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_foreign_signature_is_rejected() {
        let key = PrivateKeySigner::random();
        let (store, _, strategy) = setup(LocalProvider {
            key: key.clone(),
            signs_with: PrivateKeySigner::random(),
            calls: AtomicUsize::new(0),
        });
        store.insert("user-1", wallet(&key));

        let err = strategy.sign_payment(&context("user-1")).await.unwrap_err();
        assert!(matches!(err, StrategyError::Signing(_)));
    }

    #[tokio::test]
    async fn test_account_address_mismatch_is_rejected() {
        let key = PrivateKeySigner::random();
        let (store, provider, strategy) = setup(LocalProvider {
            key: PrivateKeySigner::random(),
            signs_with: key.clone(),
            calls: AtomicUsize::new(0),
        });
        store.insert("user-1", wallet(&key));

        let err = strategy.sign_payment(&context("user-1")).await.unwrap_err();
        assert!(matches!(err, StrategyError::Provider(ref msg) if msg.contains("acct-1")));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_provider_call() {
        let key = PrivateKeySigner::random();
        let (store, provider, strategy) = setup(LocalProvider::honest(key.clone()));
        store.insert("user-1", wallet(&key));

        let token = CancellationToken::new();
        let ctx = context("user-1").with_cancellation(token.clone());
        token.cancel();

        let err = strategy.sign_payment(&ctx).await.unwrap_err();
        assert!(matches!(err, StrategyError::Cancelled));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
