#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM signing strategies for the mcpay auto-signing dispatcher.
//!
//! Payments on EVM networks use the x402 "exact" scheme: an ERC-3009
//! `transferWithAuthorization` signed over EIP-712 and sent in the
//! `X-PAYMENT` header.
//!
//! # Modules
//!
//! - [`exact`] - Authorization types, signing and header encoding
//! - [`provider`] - Managed-custody wallet provider client
//! - [`registry`] - The default strategy set
//! - [`strategy`] - [`TestingStrategy`] and [`ManagedWalletStrategy`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use mcpay::{AutoSigner, PolicyConfig, RuntimeMode};
//! use mcpay_evm::standard_registry;
//!
//! let registry = standard_registry(wallet_store);
//! let signer = AutoSigner::new(Arc::new(registry), RuntimeMode::from_env());
//! let result = signer
//!     .attempt_auto_sign(&tool_call, Some(&user), &PolicyConfig::from_env()?)
//!     .await;
//! ```

pub mod exact;
pub mod provider;
pub mod registry;
pub mod strategy;

pub use provider::{HttpWalletProvider, ProviderError, WalletProvider};
pub use registry::{standard_registry, standard_registry_from_lookup};
pub use strategy::{ManagedWalletStrategy, TestingStrategy};
