#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Auto-signing x402 payment dispatcher for paid MCP tool calls.
//!
//! When an authenticated user calls a priced MCP tool, the request-handling
//! layer asks this crate to produce a signed x402 payment authorization on the
//! user's behalf. If that works, the signed header is attached to the outgoing
//! request; if it does not, the caller falls back to a manual, client-driven
//! payment challenge. Auto-signing is a convenience and never fatal.
//!
//! # Overview
//!
//! The [`AutoSigner`](auto_sign::AutoSigner) builds a
//! [`PaymentRequirement`](proto::PaymentRequirement) from the tool's price,
//! asks a [`StrategyRegistry`](registry::StrategyRegistry) for the signing
//! strategies available in the current [`RuntimeMode`](config::RuntimeMode),
//! and tries them one by one in descending priority order with bounded
//! retries and a single overall deadline.
//!
//! Concrete strategies live in chain-specific crates (`mcpay-evm`).
//!
//! # Modules
//!
//! - [`amount`] - Decimal price to base-unit conversion
//! - [`auto_sign`] - The orchestrator
//! - [`config`] - Policy configuration and environment loading
//! - [`networks`] - Supported networks and their default assets
//! - [`proto`] - x402 v1 wire types and header encoding
//! - [`registry`] - Runtime-mode aware strategy registry
//! - [`requirement`] - Payment requirement builder
//! - [`store`] - Read-only wallet store interface
//! - [`strategy`] - Signing strategy capability and request-scoped types
//!
//! # Feature Flags
//!
//! - `subscriber` - Enables [`config::init_tracing`] backed by `tracing-subscriber`

pub mod amount;
pub mod auto_sign;
pub mod config;
pub mod networks;
pub mod proto;
pub mod registry;
pub mod requirement;
pub mod store;
pub mod strategy;

pub use auto_sign::{AutoSigner, Backoff};
pub use config::{FallbackBehavior, LogLevel, LoggingConfig, PolicyConfig, RuntimeMode};
pub use proto::PaymentRequirement;
pub use registry::StrategyRegistry;
pub use strategy::{
    AuthenticatedUser, BoxFuture, SignedPayment, SigningContext, SigningResult, SigningStrategy,
    StrategyError, ToolCall, ToolPayment,
};
