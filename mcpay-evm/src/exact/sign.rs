//! ERC-3009 authorization signing.
//!
//! [`sign_erc3009_authorization`] builds the `transferWithAuthorization`
//! message for a payment requirement, has a [`SignerLike`] sign its EIP-712
//! hash and checks that the signature recovers to the signer's address
//! before handing it out. [`encode_exact_payment`] wraps the result into an
//! `X-PAYMENT` header value.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Signature, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{Eip712Domain, SolStruct, eip712_domain};
use mcpay::StrategyError;
use mcpay::networks::network_by_name;
use mcpay::proto::{
    HeaderError, PaymentPayload, PaymentRequirement, RequirementExtra, UnixTimestamp,
    encode_payment_header,
};
use rand::RngExt;
use rand::rng;

use super::types::{ExactEvmAuthorization, ExactEvmPayload};

/// How far in the past `validAfter` is placed, in seconds.
///
/// Absorbs clock skew between the signer and the chain.
pub const VALID_AFTER_SKEW_SECONDS: u64 = 10 * 60;

/// Errors produced while building or signing an authorization.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The requirement names a network without a known chain id.
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),
    /// A requirement field cannot be used for EIP-3009.
    #[error("invalid {field} in payment requirement: {value}")]
    InvalidField {
        /// Requirement field name.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
    /// The signer itself failed.
    #[error("signer error: {0}")]
    Signer(String),
    /// The returned signature does not belong to the expected address.
    #[error("signature recovers to {recovered:?}, expected {expected}")]
    SignerMismatch {
        /// Address the authorization is issued from.
        expected: Address,
        /// Address recovered from the signature, if any.
        recovered: Option<Address>,
    },
    /// The payment header could not be encoded.
    #[error(transparent)]
    Header(#[from] HeaderError),
}

impl From<SigningError> for StrategyError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::UnsupportedNetwork(_) | SigningError::InvalidField { .. } => {
                Self::Unsupported(err.to_string())
            }
            SigningError::Signer(_) | SigningError::SignerMismatch { .. } | SigningError::Header(_) => {
                Self::Signing(err.to_string())
            }
        }
    }
}

/// Anything that can sign a 32-byte digest for a fixed address.
///
/// Implemented for local keys and for remote custody providers alike.
pub trait SignerLike: Send + Sync {
    /// Address the signatures belong to.
    fn address(&self) -> Address;

    /// Signs `hash` without further hashing.
    fn sign_hash(&self, hash: &B256) -> impl Future<Output = Result<Signature, SigningError>> + Send;
}

impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, SigningError> {
        alloy_signer::Signer::sign_hash(self, hash)
            .await
            .map_err(|e| SigningError::Signer(e.to_string()))
    }
}

impl<T: SignerLike> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, SigningError> {
        (**self).sign_hash(hash).await
    }
}

/// Inputs of one ERC-3009 authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip3009SigningParams {
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Token contract, used as the EIP-712 verifying contract.
    pub asset: Address,
    /// Recipient.
    pub pay_to: Address,
    /// Amount in base units.
    pub amount: U256,
    /// Validity window length.
    pub max_timeout_seconds: u64,
    /// EIP-712 domain name and version of the token.
    pub extra: Option<RequirementExtra>,
    /// Reference time for the validity window.
    pub now: UnixTimestamp,
    /// Authorization nonce.
    pub nonce: B256,
}

impl Eip3009SigningParams {
    /// Derives signing inputs from a validated requirement.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] if the network is unknown or an address or
    /// amount cannot be parsed.
    pub fn from_requirement(
        requirement: &PaymentRequirement,
        now: UnixTimestamp,
        nonce: B256,
    ) -> Result<Self, SigningError> {
        let network = network_by_name(&requirement.network)
            .ok_or_else(|| SigningError::UnsupportedNetwork(requirement.network.clone()))?;
        Ok(Self {
            chain_id: network.chain_id,
            asset: parse_address("asset", &requirement.asset)?,
            pay_to: parse_address("payTo", &requirement.pay_to)?,
            amount: U256::from_str_radix(&requirement.max_amount_required, 10).map_err(|_| {
                SigningError::InvalidField {
                    field: "maxAmountRequired",
                    value: requirement.max_amount_required.clone(),
                }
            })?,
            max_timeout_seconds: requirement.max_timeout_seconds,
            extra: requirement.extra.clone(),
            now,
            nonce,
        })
    }

    /// The token's EIP-712 domain.
    #[must_use]
    pub fn domain(&self) -> Eip712Domain {
        let (name, version) = self.extra.as_ref().map_or_else(
            || (String::new(), String::new()),
            |extra| (extra.name.clone(), extra.version.clone()),
        );
        eip712_domain! {
            name: name,
            version: version,
            chain_id: self.chain_id,
            verifying_contract: self.asset,
        }
    }

    /// The authorization issued from `from` under these parameters.
    #[must_use]
    pub fn authorization(&self, from: Address) -> ExactEvmAuthorization {
        ExactEvmAuthorization {
            from,
            to: self.pay_to,
            value: self.amount.to_string(),
            valid_after: self.now.saturating_sub(VALID_AFTER_SKEW_SECONDS),
            valid_before: self.now + self.max_timeout_seconds,
            nonce: self.nonce,
        }
    }

    /// EIP-712 digest of the authorization issued from `from`.
    #[must_use]
    pub fn signing_hash(&self, from: Address) -> B256 {
        let authorization = self.authorization(from);
        let typed = super::types::TransferWithAuthorization {
            from: authorization.from,
            to: authorization.to,
            value: self.amount,
            validAfter: U256::from(authorization.valid_after.as_secs()),
            validBefore: U256::from(authorization.valid_before.as_secs()),
            nonce: authorization.nonce,
        };
        typed.eip712_signing_hash(&self.domain())
    }
}

/// Returns a fresh random nonce.
#[must_use]
pub fn random_nonce() -> B256 {
    let nonce: [u8; 32] = rng().random();
    B256::from(nonce)
}

/// Signs an ERC-3009 `TransferWithAuthorization` for `params`.
///
/// # Errors
///
/// Returns [`SigningError::Signer`] if signing fails and
/// [`SigningError::SignerMismatch`] if the signature does not recover to
/// the signer's address.
pub async fn sign_erc3009_authorization<S: SignerLike>(
    signer: &S,
    params: &Eip3009SigningParams,
) -> Result<ExactEvmPayload, SigningError> {
    let from = signer.address();
    let hash = params.signing_hash(from);
    let signature = signer.sign_hash(&hash).await?;

    let recovered = signature.recover_address_from_prehash(&hash).ok();
    if recovered != Some(from) {
        return Err(SigningError::SignerMismatch {
            expected: from,
            recovered,
        });
    }

    Ok(ExactEvmPayload {
        signature: signature.as_bytes().into(),
        authorization: params.authorization(from),
    })
}

/// Wraps a signed payload into an `X-PAYMENT` header value for `requirement`.
///
/// # Errors
///
/// Returns [`SigningError::Header`] if serialization fails.
pub fn encode_exact_payment(
    requirement: &PaymentRequirement,
    payload: ExactEvmPayload,
) -> Result<String, SigningError> {
    let envelope = PaymentPayload::for_requirement(requirement, payload);
    Ok(encode_payment_header(&envelope)?)
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, SigningError> {
    Address::from_str(value).map_err(|_| SigningError::InvalidField {
        field,
        value: value.to_owned(),
    })
}
