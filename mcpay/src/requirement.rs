//! Payment requirement builder.
//!
//! Turns the raw payment terms of a priced tool call into a validated,
//! protocol-compliant [`PaymentRequirement`]. Building is pure: no I/O, no
//! clock, no randomness, so identical inputs always produce equal outputs.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::amount::is_base_unit_amount;
use crate::networks::network_by_name;
use crate::proto::{
    DEFAULT_MAX_TIMEOUT_SECONDS, DEFAULT_MIME_TYPE, ExactScheme, PaymentRequirement,
    RequirementExtra,
};

static EVM_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid address regex"));

/// Reasons a payment requirement cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequirementError {
    /// The network is not one of the supported networks.
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),
    /// The amount is not a non-negative integer string.
    #[error("invalid maxAmountRequired {0:?}: expected base units as an integer string")]
    InvalidAmount(String),
    /// The resource is not a valid absolute URL.
    #[error("invalid resource URL {0:?}")]
    InvalidResource(String),
    /// An address failed the format check.
    #[error("invalid {field} address {value:?}")]
    InvalidAddress {
        /// Which field was rejected (`payTo` or `asset`).
        field: &'static str,
        /// The rejected value.
        value: String,
    },
    /// No pay-to address was supplied and no default is configured.
    #[error("no payTo address for resource {0}")]
    MissingPayTo(String),
}

/// Raw inputs for one payment requirement.
#[derive(Debug, Clone, Copy)]
pub struct RequirementParams<'a> {
    /// Amount in the asset's base units.
    pub max_amount_required: &'a str,
    /// Network name.
    pub network: &'a str,
    /// Asset address; empty selects the network's USDC deployment.
    pub asset: &'a str,
    /// Resource URL being paid for.
    pub resource: &'a str,
    /// Human-readable description.
    pub description: &'a str,
    /// Recipient address.
    pub pay_to: &'a str,
}

/// Builds [`PaymentRequirement`]s with configurable defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementBuilder {
    max_timeout_seconds: u64,
    mime_type: String,
}

impl Default for RequirementBuilder {
    fn default() -> Self {
        Self {
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            mime_type: DEFAULT_MIME_TYPE.to_owned(),
        }
    }
}

impl RequirementBuilder {
    /// Creates a builder with the default timeout and MIME type.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the authorization validity window.
    #[must_use]
    pub const fn with_max_timeout_seconds(mut self, secs: u64) -> Self {
        self.max_timeout_seconds = secs;
        self
    }

    /// Overrides the advertised MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Validates `params` and builds the requirement.
    ///
    /// # Errors
    ///
    /// Returns [`RequirementError`] if the network is unsupported, the
    /// amount is not an integer string, the resource is not a URL, or an
    /// address fails the format check.
    pub fn build(
        &self,
        params: &RequirementParams<'_>,
    ) -> Result<PaymentRequirement, RequirementError> {
        let network = network_by_name(params.network)
            .ok_or_else(|| RequirementError::UnsupportedNetwork(params.network.to_owned()))?;

        if !is_base_unit_amount(params.max_amount_required) {
            return Err(RequirementError::InvalidAmount(
                params.max_amount_required.to_owned(),
            ));
        }

        if Url::parse(params.resource).is_err() {
            return Err(RequirementError::InvalidResource(params.resource.to_owned()));
        }

        if params.pay_to.is_empty() {
            return Err(RequirementError::MissingPayTo(params.resource.to_owned()));
        }
        check_address("payTo", params.pay_to)?;

        let asset = if params.asset.is_empty() {
            network.usdc.address
        } else {
            check_address("asset", params.asset)?;
            params.asset
        };

        let extra = network.is_usdc(asset).then(|| RequirementExtra {
            name: network.usdc.name.to_owned(),
            version: network.usdc.version.to_owned(),
        });

        Ok(PaymentRequirement {
            scheme: ExactScheme,
            network: network.name.to_owned(),
            max_amount_required: params.max_amount_required.to_owned(),
            resource: params.resource.to_owned(),
            description: params.description.to_owned(),
            mime_type: self.mime_type.clone(),
            pay_to: params.pay_to.to_owned(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: asset.to_owned(),
            extra,
        })
    }
}

/// Builds a requirement with the default timeout and MIME type.
///
/// # Errors
///
/// See [`RequirementBuilder::build`].
pub fn build_payment_requirement(
    params: &RequirementParams<'_>,
) -> Result<PaymentRequirement, RequirementError> {
    RequirementBuilder::default().build(params)
}

/// Returns `true` if `value` looks like an EVM address.
#[must_use]
pub fn is_evm_address(value: &str) -> bool {
    EVM_ADDRESS.is_match(value)
}

fn check_address(field: &'static str, value: &str) -> Result<(), RequirementError> {
    if is_evm_address(value) {
        Ok(())
    } else {
        Err(RequirementError::InvalidAddress {
            field,
            value: value.to_owned(),
        })
    }
}
