//! Signing strategies for EVM networks.
//!
//! - [`testing`] - Fixed development key, test runtime only
//! - [`managed`] - User wallets held by a managed-custody provider

pub mod managed;
pub mod testing;

pub use managed::{MANAGED_STRATEGY_NAME, MANAGED_STRATEGY_PRIORITY, ManagedWalletStrategy};
pub use testing::{TESTING_STRATEGY_NAME, TESTING_STRATEGY_PRIORITY, TestingStrategy};
