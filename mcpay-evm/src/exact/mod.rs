//! EVM "exact" payment scheme.
//!
//! Payments are ERC-3009 `transferWithAuthorization` messages signed over
//! EIP-712 and carried in an x402 v1 envelope.

pub mod sign;
pub mod types;

pub use sign::*;
pub use types::*;
