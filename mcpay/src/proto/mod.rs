//! x402 v1 wire types used by auto-signing.
//!
//! Auto-signing produces exactly one artifact for the outside world: the value
//! of the `X-PAYMENT` request header. That value is a base64-encoded JSON
//! [`PaymentPayload`] whose inner `payload` is scheme and chain specific.
//!
//! # Key Types
//!
//! - [`PaymentRequirement`] - What must be paid, in the "exact" scheme
//! - [`PaymentPayload`] - Signed authorization envelope
//! - [`ExactScheme`] - The `"exact"` scheme tag
//! - [`X402Version1`] - Version marker that serializes as `1`
//! - [`UnixTimestamp`] - Stringified seconds since the epoch

mod encoding;
mod timestamp;

pub use encoding::*;
pub use timestamp::*;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Default MIME type advertised for paid tool results.
pub const DEFAULT_MIME_TYPE: &str = "application/json";

/// Default validity window of a payment authorization, in seconds.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// Version marker for x402 protocol version 1.
///
/// Serializes as the integer `1` and rejects any other value on
/// deserialization.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct X402Version1;

impl X402Version1 {
    /// The numeric value of this protocol version.
    pub const VALUE: u8 = 1;
}

impl Serialize for X402Version1 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for X402Version1 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        if v == Self::VALUE {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected x402 version {}, got {v}",
                Self::VALUE
            )))
        }
    }
}

/// A unit struct representing the string literal `"exact"`.
///
/// This is the only payment scheme auto-signing supports: the payer
/// authorizes a transfer of exactly `maxAmountRequired` base units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ExactScheme;

impl ExactScheme {
    /// The string literal value: `"exact"`.
    pub const VALUE: &'static str = "exact";
}

impl std::fmt::Display for ExactScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(Self::VALUE)
    }
}

impl AsRef<str> for ExactScheme {
    fn as_ref(&self) -> &str {
        Self::VALUE
    }
}

impl Serialize for ExactScheme {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for ExactScheme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == Self::VALUE {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected '{}', got '{s}'",
                Self::VALUE,
            )))
        }
    }
}

/// EIP-712 domain parameters of the payment asset.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RequirementExtra {
    /// Token name as used in the EIP-712 domain.
    pub name: String,
    /// Token version as used in the EIP-712 domain.
    pub version: String,
}

/// Payment terms for one priced tool call under the "exact" scheme.
///
/// Constructed fresh for every signing attempt by
/// [`build_payment_requirement`](crate::requirement::build_payment_requirement)
/// and never mutated afterwards. `max_amount_required` is always a
/// non-negative integer string in the asset's base units.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    /// The payment scheme.
    pub scheme: ExactScheme,
    /// The network name (e.g., "base-sepolia").
    pub network: String,
    /// The maximum amount required, in base units.
    pub max_amount_required: String,
    /// The resource URL being paid for.
    pub resource: String,
    /// Human-readable description of the resource.
    pub description: String,
    /// MIME type of the resource.
    pub mime_type: String,
    /// The recipient address.
    pub pay_to: String,
    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,
    /// The token asset address.
    pub asset: String,
    /// Asset EIP-712 domain data, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<RequirementExtra>,
}

/// A signed payment authorization envelope (x402 v1).
///
/// `TPayload` is the scheme-specific signed content, e.g. an EIP-3009
/// authorization plus its signature for EVM networks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TPayload = serde_json::Value> {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// The payment scheme.
    pub scheme: ExactScheme,
    /// The network name (e.g., "base-sepolia").
    pub network: String,
    /// The scheme-specific signed payload.
    pub payload: TPayload,
}

impl<TPayload> PaymentPayload<TPayload> {
    /// Wraps a signed payload for the requirement's network.
    pub fn for_requirement(requirement: &PaymentRequirement, payload: TPayload) -> Self {
        Self {
            x402_version: X402Version1,
            scheme: ExactScheme,
            network: requirement.network.clone(),
            payload,
        }
    }
}
