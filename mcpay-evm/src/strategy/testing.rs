//! Deterministic signing for tests and sandboxes.

use alloy_primitives::{B256, keccak256};
use alloy_signer_local::PrivateKeySigner;
use mcpay::proto::{PaymentRequirement, UnixTimestamp};
use mcpay::{BoxFuture, SignedPayment, SigningContext, SigningStrategy, StrategyError};

use crate::exact::{Eip3009SigningParams, encode_exact_payment, sign_erc3009_authorization};

/// Registry and result name of [`TestingStrategy`].
pub const TESTING_STRATEGY_NAME: &str = "testing";

/// Priority of [`TestingStrategy`]; above every production strategy.
pub const TESTING_STRATEGY_PRIORITY: i32 = 1000;

/// Well-known development key (the first default Hardhat/Anvil account).
///
/// Public knowledge. Never fund it on a real network.
pub const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Signs every payment with a fixed local key, without any network access.
///
/// The nonce is derived from the context, so the same user paying the same
/// resource twice produces the same authorization. With
/// [`with_fixed_time`](Self::with_fixed_time) the output is fully
/// reproducible.
#[derive(Debug, Clone)]
pub struct TestingStrategy {
    signer: PrivateKeySigner,
    fixed_time: Option<UnixTimestamp>,
}

impl Default for TestingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl TestingStrategy {
    /// Creates a strategy signing with [`TEST_PRIVATE_KEY`].
    #[must_use]
    pub fn new() -> Self {
        let signer = TEST_PRIVATE_KEY
            .parse()
            .expect("development key is a valid secp256k1 scalar");
        Self::with_signer(signer)
    }

    /// Creates a strategy signing with `signer`.
    #[must_use]
    pub const fn with_signer(signer: PrivateKeySigner) -> Self {
        Self {
            signer,
            fixed_time: None,
        }
    }

    /// Pins the validity window to `now` instead of the system clock.
    #[must_use]
    pub const fn with_fixed_time(mut self, now: UnixTimestamp) -> Self {
        self.fixed_time = Some(now);
        self
    }

    /// Address all payments are signed from.
    #[must_use]
    pub fn address(&self) -> alloy_primitives::Address {
        self.signer.address()
    }

    fn nonce(context: &SigningContext, requirement: &PaymentRequirement) -> B256 {
        let preimage = [
            context.user().id.as_str(),
            requirement.resource.as_str(),
            requirement.network.as_str(),
            requirement.pay_to.as_str(),
            requirement.max_amount_required.as_str(),
        ]
        .join("\0");
        keccak256(preimage.as_bytes())
    }

    async fn sign(&self, context: &SigningContext) -> Result<SignedPayment, StrategyError> {
        let requirement = context.requirement()?;
        let now = self.fixed_time.unwrap_or_else(UnixTimestamp::now);
        let params = Eip3009SigningParams::from_requirement(
            requirement,
            now,
            Self::nonce(context, requirement),
        )?;
        let payload = sign_erc3009_authorization(&self.signer, &params).await?;
        Ok(SignedPayment {
            signed_payment_header: encode_exact_payment(requirement, payload)?,
            wallet_address: self.signer.address().to_checksum(None),
        })
    }
}

impl SigningStrategy for TestingStrategy {
    fn name(&self) -> &str {
        TESTING_STRATEGY_NAME
    }

    fn priority(&self) -> i32 {
        TESTING_STRATEGY_PRIORITY
    }

    fn can_sign<'a>(
        &'a self,
        context: &'a SigningContext,
    ) -> BoxFuture<'a, Result<bool, StrategyError>> {
        Box::pin(async move {
            let requirement = context.requirement()?;
            Ok(mcpay::networks::is_supported(&requirement.network))
        })
    }

    fn sign_payment<'a>(
        &'a self,
        context: &'a SigningContext,
    ) -> BoxFuture<'a, Result<SignedPayment, StrategyError>> {
        Box::pin(self.sign(context))
    }
}
