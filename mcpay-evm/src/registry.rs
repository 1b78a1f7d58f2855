//! The default strategy set.

use std::sync::Arc;

use mcpay::registry::{Availability, FactoryError};
use mcpay::store::WalletStore;
use mcpay::{SigningStrategy, StrategyRegistry};

use crate::provider::{HttpWalletProvider, ProviderError};
use crate::strategy::{
    MANAGED_STRATEGY_NAME, ManagedWalletStrategy, TESTING_STRATEGY_NAME, TestingStrategy,
};

/// Registers the built-in strategies, reading provider settings from the
/// process environment.
///
/// See [`standard_registry_from_lookup`].
#[must_use]
pub fn standard_registry(store: Arc<dyn WalletStore>) -> StrategyRegistry {
    standard_registry_from_lookup(store, |key| std::env::var(key).ok())
}

/// Registers the built-in strategies.
///
/// [`TestingStrategy`] is exposed only in the test runtime. The managed
/// wallet strategy is exposed everywhere else. Its provider is configured
/// through `lookup` once, here, and the resulting strategy (with its HTTP
/// client) is shared by every build of the registry. Missing credentials
/// only disable that one strategy.
#[must_use]
pub fn standard_registry_from_lookup<F>(
    store: Arc<dyn WalletStore>,
    lookup: F,
) -> StrategyRegistry
where
    F: Fn(&str) -> Option<String>,
{
    let managed: Result<Arc<dyn SigningStrategy>, Arc<ProviderError>> =
        HttpWalletProvider::from_lookup(lookup)
            .map(|provider| {
                Arc::new(ManagedWalletStrategy::new(store, Arc::new(provider)))
                    as Arc<dyn SigningStrategy>
            })
            .map_err(Arc::new);

    StrategyRegistry::new()
        .register(TESTING_STRATEGY_NAME, Availability::TestOnly, || {
            Ok(Arc::new(TestingStrategy::new()) as Arc<dyn SigningStrategy>)
        })
        .register(MANAGED_STRATEGY_NAME, Availability::NonTest, move || {
            managed.clone().map_err(|e| Box::new(e) as FactoryError)
        })
}
