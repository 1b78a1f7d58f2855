//! Signing strategy capability and request-scoped types.
//!
//! A [`SigningStrategy`] is one way of producing a signed payment for a user,
//! typically backed by one wallet provider. The orchestrator only ever sees
//! strategies through this trait and never branches on the concrete type.
//!
//! # Contract
//!
//! - [`SigningStrategy::can_sign`] returning `Ok(false)` means "skip me":
//!   the strategy is not retried and the next one is tried.
//! - [`SigningStrategy::sign_payment`] returning `Err` is a recoverable
//!   failure and may be retried.
//! - `can_sign` returning `Err`, or either future panicking, counts as a
//!   failed attempt exactly like a failed `sign_payment`.
//! - `can_sign` is advisory. `sign_payment` must validate its own
//!   preconditions again (the wallet may be gone by then).

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::amount::{AmountError, to_base_units};
use crate::networks::network_by_name;
use crate::proto::PaymentRequirement;
use crate::requirement::RequirementParams;
use crate::store::StoreError;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Raw payment terms embedded in a priced tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPayment {
    /// Amount in the asset's base units.
    pub max_amount_required: String,
    /// Network name (e.g., "base-sepolia").
    pub network: String,
    /// Asset address.
    pub asset: String,
    /// Recipient address, when the tool has one of its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_to: Option<String>,
    /// Resource URL of the tool.
    pub resource: String,
    /// Human-readable description.
    pub description: String,
}

impl ToolPayment {
    /// Builds payment terms from a decimal USDC price such as `"0.10"`.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError`] if the network is unknown or the price cannot
    /// be expressed in USDC base units.
    pub fn from_usdc_price(
        price: &str,
        network: &str,
        resource: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, AmountError> {
        let info = network_by_name(network)
            .ok_or_else(|| AmountError::UnsupportedNetwork(network.to_owned()))?;
        Ok(Self {
            max_amount_required: to_base_units(price, info.usdc.decimals)?,
            network: info.name.to_owned(),
            asset: info.usdc.address.to_owned(),
            pay_to: None,
            resource: resource.into(),
            description: description.into(),
        })
    }

    /// Sets the recipient address.
    #[must_use]
    pub fn with_pay_to(mut self, pay_to: impl Into<String>) -> Self {
        self.pay_to = Some(pay_to.into());
        self
    }

    /// Borrows these terms as requirement builder input.
    ///
    /// `default_pay_to` is used when the tool carries no recipient of its own.
    #[must_use]
    pub fn requirement_params<'a>(&'a self, default_pay_to: &'a str) -> RequirementParams<'a> {
        RequirementParams {
            max_amount_required: &self.max_amount_required,
            network: &self.network,
            asset: &self.asset,
            resource: &self.resource,
            description: &self.description,
            pay_to: self.pay_to.as_deref().unwrap_or(default_pay_to),
        }
    }
}

/// A tool call as seen by auto-signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Whether the tool is priced at all.
    pub is_paid: bool,
    /// The tool's payment terms.
    pub payment: ToolPayment,
}

impl ToolCall {
    /// Creates a paid tool call.
    #[must_use]
    pub const fn paid(payment: ToolPayment) -> Self {
        Self {
            is_paid: true,
            payment,
        }
    }
}

/// Identity projection of the authenticated caller. Never holds secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    /// Stable user id.
    pub id: String,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Account name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl AuthenticatedUser {
    /// Creates a user with only an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Everything a strategy needs for one signing attempt.
///
/// Built fresh by the orchestrator for each call and owned by it; strategies
/// only borrow it.
#[derive(Debug, Clone)]
pub struct SigningContext {
    tool_call: ToolCall,
    user: AuthenticatedUser,
    requirements: Vec<PaymentRequirement>,
    cancellation: CancellationToken,
}

impl SigningContext {
    /// Creates a context with a fresh cancellation token.
    #[must_use]
    pub fn new(
        tool_call: ToolCall,
        user: AuthenticatedUser,
        requirements: Vec<PaymentRequirement>,
    ) -> Self {
        Self {
            tool_call,
            user,
            requirements,
            cancellation: CancellationToken::new(),
        }
    }

    /// Replaces the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The tool call being paid for.
    #[must_use]
    pub const fn tool_call(&self) -> &ToolCall {
        &self.tool_call
    }

    /// The authenticated user paying.
    #[must_use]
    pub const fn user(&self) -> &AuthenticatedUser {
        &self.user
    }

    /// All requirements built for this attempt.
    #[must_use]
    pub fn requirements(&self) -> &[PaymentRequirement] {
        &self.requirements
    }

    /// The requirement strategies sign for.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::Unsupported`] if the context carries none.
    pub fn requirement(&self) -> Result<&PaymentRequirement, StrategyError> {
        self.requirements
            .first()
            .ok_or_else(|| StrategyError::Unsupported("no payment requirement".to_owned()))
    }

    /// Token cancelled when the orchestrator stops waiting for this attempt.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` once the orchestrator has abandoned this attempt.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// A signed payment produced by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayment {
    /// Value for the `X-PAYMENT` header.
    pub signed_payment_header: String,
    /// Address of the wallet that signed.
    pub wallet_address: String,
}

/// Errors a strategy may report for one attempt.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    /// The user has no wallet this strategy can sign with.
    #[error("no eligible wallet for user {0}")]
    NoWallet(String),
    /// The requirement cannot be handled by this strategy.
    #[error("unsupported payment requirement: {0}")]
    Unsupported(String),
    /// Reading wallet records failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The external signing provider failed.
    #[error("signing provider error: {0}")]
    Provider(String),
    /// Building or signing the authorization failed.
    #[error("signing failed: {0}")]
    Signing(String),
    /// The attempt was abandoned by the orchestrator.
    #[error("signing cancelled")]
    Cancelled,
    /// The strategy panicked.
    #[error("strategy panicked: {0}")]
    Panicked(String),
}

/// A pluggable signing backend.
pub trait SigningStrategy: Send + Sync {
    /// Unique, human-readable name.
    fn name(&self) -> &str;

    /// Ordering priority; higher runs first.
    fn priority(&self) -> i32;

    /// Cheap, read-only eligibility check.
    fn can_sign<'a>(&'a self, context: &'a SigningContext)
    -> BoxFuture<'a, Result<bool, StrategyError>>;

    /// Produces a signed payment for the context's requirement.
    fn sign_payment<'a>(
        &'a self,
        context: &'a SigningContext,
    ) -> BoxFuture<'a, Result<SignedPayment, StrategyError>>;
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

impl fmt::Debug for dyn SigningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningStrategy")
            .field("name", &self.name())
            .field("priority", &self.priority())
            .finish()
    }
}

/// Outcome of one orchestration call.
///
/// Exactly one of these is returned per call. Success and failure are
/// separate variants, so a result can never carry both a signature and an
/// error. On the wire it uses the flat
/// `{ success, signedPaymentHeader?, error?, strategy?, walletAddress? }`
/// shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SigningResultWire", try_from = "SigningResultWire")]
pub enum SigningResult {
    /// A strategy produced a signed payment.
    Success {
        /// Value for the `X-PAYMENT` header.
        signed_payment_header: String,
        /// Address of the wallet that signed.
        wallet_address: String,
        /// Name of the strategy that succeeded.
        strategy: String,
    },
    /// Auto-signing did not produce a payment.
    Failure {
        /// Why auto-signing failed.
        error: String,
    },
}

impl SigningResult {
    /// Creates a failure result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    /// Creates a success result from a strategy's output.
    #[must_use]
    pub fn success(payment: SignedPayment, strategy: impl Into<String>) -> Self {
        Self::Success {
            signed_payment_header: payment.signed_payment_header,
            wallet_address: payment.wallet_address,
            strategy: strategy.into(),
        }
    }

    /// Returns `true` for [`SigningResult::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The error message of a failure.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure { error } => Some(error),
            Self::Success { .. } => None,
        }
    }

    /// The name of the successful strategy.
    #[must_use]
    pub fn strategy(&self) -> Option<&str> {
        match self {
            Self::Success { strategy, .. } => Some(strategy),
            Self::Failure { .. } => None,
        }
    }

    /// The signed header of a success.
    #[must_use]
    pub fn signed_payment_header(&self) -> Option<&str> {
        match self {
            Self::Success {
                signed_payment_header,
                ..
            } => Some(signed_payment_header),
            Self::Failure { .. } => None,
        }
    }

    /// The signing wallet of a success.
    #[must_use]
    pub fn wallet_address(&self) -> Option<&str> {
        match self {
            Self::Success { wallet_address, .. } => Some(wallet_address),
            Self::Failure { .. } => None,
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SigningResultWire {
    success: bool,
    signed_payment_header: Option<String>,
    error: Option<String>,
    strategy: Option<String>,
    wallet_address: Option<String>,
}

impl From<SigningResult> for SigningResultWire {
    fn from(result: SigningResult) -> Self {
        match result {
            SigningResult::Success {
                signed_payment_header,
                wallet_address,
                strategy,
            } => Self {
                success: true,
                signed_payment_header: Some(signed_payment_header),
                error: None,
                strategy: Some(strategy),
                wallet_address: Some(wallet_address),
            },
            SigningResult::Failure { error } => Self {
                success: false,
                signed_payment_header: None,
                error: Some(error),
                strategy: None,
                wallet_address: None,
            },
        }
    }
}

impl TryFrom<SigningResultWire> for SigningResult {
    type Error = String;

    fn try_from(wire: SigningResultWire) -> Result<Self, Self::Error> {
        match wire {
            SigningResultWire {
                success: true,
                signed_payment_header: Some(signed_payment_header),
                error: None,
                strategy: Some(strategy),
                wallet_address: Some(wallet_address),
            } => Ok(Self::Success {
                signed_payment_header,
                wallet_address,
                strategy,
            }),
            SigningResultWire { success: true, .. } => Err(
                "successful result needs signedPaymentHeader, strategy and walletAddress and no error"
                    .to_owned(),
            ),
            SigningResultWire {
                success: false,
                error,
                signed_payment_header: None,
                ..
            } => Ok(Self::Failure {
                error: error.unwrap_or_default(),
            }),
            SigningResultWire { success: false, .. } => {
                Err("failed result must not carry a signedPaymentHeader".to_owned())
            }
        }
    }
}
