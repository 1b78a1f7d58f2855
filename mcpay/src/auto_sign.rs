//! The auto-sign orchestrator.
//!
//! [`AutoSigner::attempt_auto_sign`] turns one paid tool call into exactly
//! one [`SigningResult`]. Strategies are tried strictly one after another in
//! descending priority order, each up to `maxRetries` times, and the whole
//! sequence runs under a single deadline. A success short-circuits
//! everything else, so at most one signature is ever produced per call.
//!
//! Nothing escapes as an error: per-strategy failures (including panics) are
//! logged and counted, and the timeout and requirement-validation paths are
//! reported through the configured [`FallbackBehavior`].

use std::cmp::Reverse;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{FallbackBehavior, LogLevel, LoggingConfig, PolicyConfig, RuntimeMode};
use crate::registry::StrategyRegistry;
use crate::requirement::{RequirementBuilder, RequirementError};
use crate::strategy::{
    AuthenticatedUser, BoxFuture, SignedPayment, SigningContext, SigningResult, SigningStrategy,
    StrategyError, ToolCall, panic_message,
};

const DISABLED: &str = "Auto-signing disabled";
const NO_USER: &str = "User not provided";
const NOT_PAID: &str = "Tool call does not require payment";
const NO_STRATEGIES: &str = "No signing strategies available";
const LOG_ONLY_FAILURE: &str = "Auto-signing failed (log_only mode)";
const MANUAL_PAYMENT_REQUIRED: &str = "Auto-signing failed, manual payment required";

/// Failures handled through the fallback policy.
#[derive(Debug, thiserror::Error)]
pub enum AutoSignError {
    /// The tool's payment terms are invalid.
    #[error("invalid payment requirement: {0}")]
    Requirement(#[from] RequirementError),
    /// The attempt sequence did not finish in time.
    #[error("auto-signing timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Delay between attempts of the same strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Wait `step * attempt`.
    Linear(Duration),
    /// Wait `initial * 2^(attempt - 1)`, capped at `max`.
    Exponential {
        /// Delay after the first attempt.
        initial: Duration,
        /// Upper bound.
        max: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Linear(Duration::from_secs(1))
    }
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Linear(step) => step.saturating_mul(attempt),
            Self::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Produces signed x402 payments for authenticated users.
///
/// Cheap to share behind an [`Arc`]; it holds no per-call state.
#[derive(Debug, Clone)]
pub struct AutoSigner {
    registry: Arc<StrategyRegistry>,
    mode: RuntimeMode,
    backoff: Backoff,
    default_pay_to: Option<String>,
    requirements: RequirementBuilder,
}

impl AutoSigner {
    /// Creates an orchestrator over `registry` for the given runtime mode.
    #[must_use]
    pub fn new(registry: Arc<StrategyRegistry>, mode: RuntimeMode) -> Self {
        Self {
            registry,
            mode,
            backoff: Backoff::default(),
            default_pay_to: None,
            requirements: RequirementBuilder::default(),
        }
    }

    /// Sets the delay between retries of one strategy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the recipient used when a tool carries no `payTo` of its own.
    #[must_use]
    pub fn with_default_pay_to(mut self, pay_to: impl Into<String>) -> Self {
        self.default_pay_to = Some(pay_to.into());
        self
    }

    /// Replaces the requirement builder.
    #[must_use]
    pub fn with_requirement_builder(mut self, builder: RequirementBuilder) -> Self {
        self.requirements = builder;
        self
    }

    /// The runtime mode strategies are selected for.
    #[must_use]
    pub const fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Tries to sign a payment for `tool_call` on behalf of `user`.
    ///
    /// Always returns exactly one result; it never panics or errors.
    pub async fn attempt_auto_sign(
        &self,
        tool_call: &ToolCall,
        user: Option<&AuthenticatedUser>,
        config: &PolicyConfig,
    ) -> SigningResult {
        let logging = &config.logging;

        if !config.enabled {
            if logging.level.allows(LogLevel::Debug) {
                tracing::debug!("Auto-signing disabled by policy");
            }
            return SigningResult::failure(DISABLED);
        }

        let Some(user) = user else {
            if logging.level.allows(LogLevel::Debug) {
                tracing::debug!(resource = %tool_call.payment.resource, "Auto-signing skipped, no authenticated user");
            }
            return SigningResult::failure(NO_USER);
        };

        if !tool_call.is_paid {
            return SigningResult::failure(NOT_PAID);
        }

        log_attempt(logging, user, tool_call);

        let started = Instant::now();
        let cancellation = CancellationToken::new();
        let deadline = config.timeout();
        let attempt = self.run(tool_call, user, config, cancellation.clone());

        match tokio::time::timeout(deadline, attempt).await {
            Ok(Ok(result)) => {
                if let SigningResult::Success {
                    strategy,
                    wallet_address,
                    ..
                } = &result
                {
                    if logging.log_successful_signing && logging.level.allows(LogLevel::Info) {
                        tracing::info!(
                            user_id = %user.id,
                            strategy = %strategy,
                            wallet = %wallet_address,
                            elapsed = ?started.elapsed(),
                            "Auto-signed payment"
                        );
                    }
                }
                result
            }
            Ok(Err(err)) => fallback(&err, config),
            Err(_) => {
                cancellation.cancel();
                fallback(&AutoSignError::Timeout(deadline), config)
            }
        }
    }

    async fn run(
        &self,
        tool_call: &ToolCall,
        user: &AuthenticatedUser,
        config: &PolicyConfig,
        cancellation: CancellationToken,
    ) -> Result<SigningResult, AutoSignError> {
        let params = tool_call
            .payment
            .requirement_params(self.default_pay_to.as_deref().unwrap_or_default());
        let requirement = self.requirements.build(&params)?;
        let context = SigningContext::new(tool_call.clone(), user.clone(), vec![requirement])
            .with_cancellation(cancellation);

        let mut strategies = self.registry.strategies(self.mode);
        strategies.sort_by_key(|s| Reverse(s.priority()));
        if strategies.is_empty() {
            if config.logging.level.allows(LogLevel::Warn) {
                tracing::warn!(mode = ?self.mode, "No signing strategies available");
            }
            return Ok(SigningResult::failure(NO_STRATEGIES));
        }

        let max_retries = config.effective_max_retries();
        for strategy in &strategies {
            if let Some(payment) = self
                .try_strategy(strategy.as_ref(), &context, max_retries, &config.logging)
                .await
            {
                return Ok(SigningResult::success(payment, strategy.name()));
            }
        }

        let message = format!(
            "All {} signing strategies failed after {max_retries} attempts",
            strategies.len()
        );
        if config.logging.log_failed_attempts && config.logging.level.allows(LogLevel::Warn) {
            tracing::warn!(user_id = %user.id, "{message}");
        }
        Ok(SigningResult::failure(message))
    }

    /// Runs the retry loop for one strategy. `None` means move on.
    async fn try_strategy(
        &self,
        strategy: &dyn SigningStrategy,
        context: &SigningContext,
        max_retries: u32,
        logging: &LoggingConfig,
    ) -> Option<SignedPayment> {
        for attempt in 1..=max_retries {
            let outcome = match guarded(|| strategy.can_sign(context)).await {
                Ok(true) => guarded(|| strategy.sign_payment(context)).await,
                Ok(false) => {
                    if logging.level.allows(LogLevel::Debug) {
                        tracing::debug!(strategy = strategy.name(), "Strategy cannot sign, skipping");
                    }
                    return None;
                }
                Err(err) => Err(err),
            };

            match outcome {
                Ok(payment) => return Some(payment),
                Err(err) => {
                    if logging.log_failed_attempts && logging.level.allows(LogLevel::Warn) {
                        tracing::warn!(
                            strategy = strategy.name(),
                            attempt,
                            max_retries,
                            error = %err,
                            "Signing attempt failed"
                        );
                    }
                }
            }

            if attempt < max_retries {
                let delay = self.backoff.delay(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
        None
    }
}

/// Calls a strategy method and awaits its future, turning a panic in either
/// into a failed attempt.
async fn guarded<'a, T, F>(call: F) -> Result<T, StrategyError>
where
    F: FnOnce() -> BoxFuture<'a, Result<T, StrategyError>>,
{
    AssertUnwindSafe(async move { call().await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(StrategyError::Panicked(panic_message(panic.as_ref()))))
}

fn fallback(err: &AutoSignError, config: &PolicyConfig) -> SigningResult {
    match config.fallback_behavior {
        FallbackBehavior::Fail => {
            if config.logging.level.allows(LogLevel::Error) {
                tracing::error!(error = %err, "Auto-signing failed");
            }
            SigningResult::failure(err.to_string())
        }
        FallbackBehavior::LogOnly => {
            tracing::warn!(error = %err, "Auto-signing failed, continuing without payment");
            SigningResult::failure(LOG_ONLY_FAILURE)
        }
        FallbackBehavior::Continue => {
            if config.logging.level.allows(LogLevel::Info) {
                tracing::info!(error = %err, "Auto-signing failed, manual payment required");
            }
            SigningResult::failure(MANUAL_PAYMENT_REQUIRED)
        }
    }
}

fn log_attempt(logging: &LoggingConfig, user: &AuthenticatedUser, tool_call: &ToolCall) {
    if !logging.level.allows(LogLevel::Info) {
        return;
    }
    let payment = &tool_call.payment;
    if logging.log_authentication_details {
        tracing::info!(
            user_id = %user.id,
            email = user.email.as_deref(),
            display_name = user.display_name.as_deref().or(user.name.as_deref()),
            resource = %payment.resource,
            network = %payment.network,
            amount = %payment.max_amount_required,
            "Attempting auto-sign"
        );
    } else {
        tracing::info!(
            user_id = %user.id,
            resource = %payment.resource,
            network = %payment.network,
            amount = %payment.max_amount_required,
            "Attempting auto-sign"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::registry::Availability;
    use crate::strategy::ToolPayment;

    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

    #[derive(Clone, Copy)]
    enum Eligibility {
        Yes,
        No,
        Error,
        PanicEagerly,
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Succeed,
        Fail,
        Panic,
        PanicEagerly,
        Delay(Duration),
    }

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    struct Mock {
        name: &'static str,
        priority: i32,
        eligibility: Eligibility,
        outcome: Outcome,
        can_sign_calls: AtomicUsize,
        sign_calls: AtomicUsize,
        log: CallLog,
        last_token: Mutex<Option<CancellationToken>>,
    }

    impl Mock {
        fn new(name: &'static str, priority: i32, eligibility: Eligibility, outcome: Outcome) -> Arc<Self> {
            Self::logged(name, priority, eligibility, outcome, CallLog::default())
        }

        fn logged(
            name: &'static str,
            priority: i32,
            eligibility: Eligibility,
            outcome: Outcome,
            log: CallLog,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                priority,
                eligibility,
                outcome,
                can_sign_calls: AtomicUsize::new(0),
                sign_calls: AtomicUsize::new(0),
                log,
                last_token: Mutex::new(None),
            })
        }

        fn can_sign_calls(&self) -> usize {
            self.can_sign_calls.load(Ordering::SeqCst)
        }

        fn sign_calls(&self) -> usize {
            self.sign_calls.load(Ordering::SeqCst)
        }
    }

    impl SigningStrategy for Mock {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn can_sign<'a>(
            &'a self,
            _context: &'a SigningContext,
        ) -> BoxFuture<'a, Result<bool, StrategyError>> {
            self.can_sign_calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(self.name);
            let eligibility = self.eligibility;
            if let Eligibility::PanicEagerly = eligibility {
                panic!("eligibility check exploded");
            }
            Box::pin(async move {
                match eligibility {
                    Eligibility::Yes => Ok(true),
                    Eligibility::No => Ok(false),
                    Eligibility::Error => Err(StrategyError::Provider("lookup failed".into())),
                    Eligibility::PanicEagerly => unreachable!(),
                }
            })
        }

        fn sign_payment<'a>(
            &'a self,
            context: &'a SigningContext,
        ) -> BoxFuture<'a, Result<SignedPayment, StrategyError>> {
            self.sign_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_token.lock().unwrap() = Some(context.cancellation().clone());
            let outcome = self.outcome;
            if let Outcome::PanicEagerly = outcome {
                panic!("signing exploded");
            }
            Box::pin(async move {
                match outcome {
                    Outcome::Succeed => Ok(SignedPayment {
                        signed_payment_header: format!("header-from-{}", self.name),
                        wallet_address: "0xwallet".into(),
                    }),
                    Outcome::Fail => Err(StrategyError::Signing("declined".into())),
                    Outcome::Panic => panic!("strategy exploded"),
                    Outcome::PanicEagerly => unreachable!(),
                    Outcome::Delay(delay) => {
                        tokio::time::sleep(delay).await;
                        Ok(SignedPayment {
                            signed_payment_header: "late".into(),
                            wallet_address: "0xwallet".into(),
                        })
                    }
                }
            })
        }
    }

    fn tool_call() -> ToolCall {
        ToolCall::paid(ToolPayment {
            max_amount_required: "100000".into(),
            network: "base-sepolia".into(),
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            pay_to: Some(PAY_TO.into()),
            resource: "https://mcp.example.com/servers/weather/tools/forecast".into(),
            description: "Forecast lookup".into(),
        })
    }

    fn user() -> AuthenticatedUser {
        AuthenticatedUser::new("user-1").with_email("ada@example.com")
    }

    fn signer(strategies: &[&Arc<Mock>]) -> AutoSigner {
        let registry = strategies.iter().fold(StrategyRegistry::new(), |registry, mock| {
            registry.register_instance(Availability::TestOnly, Arc::clone(*mock) as Arc<dyn SigningStrategy>)
        });
        AutoSigner::new(Arc::new(registry), RuntimeMode::Test).with_backoff(Backoff::None)
    }

    #[tokio::test]
    async fn test_disabled_consults_no_strategy() {
        let mock = Mock::new("a", 10, Eligibility::Yes, Outcome::Succeed);
        let config = PolicyConfig {
            enabled: false,
            ..PolicyConfig::default()
        };
        let result = signer(&[&mock])
            .attempt_auto_sign(&tool_call(), Some(&user()), &config)
            .await;
        assert_eq!(result, SigningResult::failure("Auto-signing disabled"));
        assert_eq!(mock.can_sign_calls(), 0);
        assert_eq!(mock.sign_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_user() {
        let mock = Mock::new("a", 10, Eligibility::Yes, Outcome::Succeed);
        let mut call = tool_call();
        call.payment.network = "not-a-network".into();
        let config = PolicyConfig {
            fallback_behavior: FallbackBehavior::Fail,
            ..PolicyConfig::default()
        };
        // An unbuildable requirement would surface as a different message.
        let result = signer(&[&mock]).attempt_auto_sign(&call, None, &config).await;
        assert_eq!(result.error(), Some("User not provided"));
        assert_eq!(mock.can_sign_calls(), 0);
    }

    #[tokio::test]
    async fn test_unpaid_tool_call() {
        let mock = Mock::new("a", 10, Eligibility::Yes, Outcome::Succeed);
        let mut call = tool_call();
        call.is_paid = false;
        let result = signer(&[&mock])
            .attempt_auto_sign(&call, Some(&user()), &PolicyConfig::default())
            .await;
        assert_eq!(result.error(), Some("Tool call does not require payment"));
        assert_eq!(mock.can_sign_calls(), 0);
    }

    #[tokio::test]
    async fn test_ineligible_strategy_is_skipped() {
        let a = Mock::new("A", 100, Eligibility::No, Outcome::Succeed);
        let b = Mock::new("B", 50, Eligibility::Yes, Outcome::Succeed);
        let result = signer(&[&a, &b])
            .attempt_auto_sign(&tool_call(), Some(&user()), &PolicyConfig::default())
            .await;

        assert!(result.is_success());
        assert_eq!(result.strategy(), Some("B"));
        assert_eq!(result.signed_payment_header(), Some("header-from-B"));
        assert!(result.error().is_none());
        assert_eq!(a.can_sign_calls(), 1);
        assert_eq!(a.sign_calls(), 0);
        assert_eq!(b.sign_calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_bound() {
        let mock = Mock::new("flaky", 10, Eligibility::Yes, Outcome::Fail);
        let result = signer(&[&mock])
            .attempt_auto_sign(&tool_call(), Some(&user()), &PolicyConfig::default())
            .await;

        assert_eq!(mock.sign_calls(), 3);
        assert_eq!(
            result.error(),
            Some("All 1 signing strategies failed after 3 attempts")
        );
    }

    #[tokio::test]
    async fn test_zero_retries_still_attempts_once() {
        let mock = Mock::new("flaky", 10, Eligibility::Yes, Outcome::Fail);
        let config = PolicyConfig {
            max_retries: 0,
            ..PolicyConfig::default()
        };
        let result = signer(&[&mock])
            .attempt_auto_sign(&tool_call(), Some(&user()), &config)
            .await;
        assert_eq!(mock.sign_calls(), 1);
        assert!(result.error().unwrap().contains("after 1 attempts"));
    }

    #[tokio::test]
    async fn test_no_strategies() {
        let result = signer(&[])
            .attempt_auto_sign(&tool_call(), Some(&user()), &PolicyConfig::default())
            .await;
        assert_eq!(result, SigningResult::failure("No signing strategies available"));
    }

    #[tokio::test]
    async fn test_strategies_run_in_priority_order() {
        let log = CallLog::default();
        let low = Mock::logged("low", 10, Eligibility::No, Outcome::Fail, Arc::clone(&log));
        let high = Mock::logged("high", 50, Eligibility::No, Outcome::Fail, Arc::clone(&log));
        let mid = Mock::logged("mid", 30, Eligibility::No, Outcome::Fail, Arc::clone(&log));
        let result = signer(&[&low, &high, &mid])
            .attempt_auto_sign(&tool_call(), Some(&user()), &PolicyConfig::default())
            .await;

        assert_eq!(*log.lock().unwrap(), ["high", "mid", "low"]);
        assert_eq!(
            result.error(),
            Some("All 3 signing strategies failed after 3 attempts")
        );
    }

    #[tokio::test]
    async fn test_equal_priorities_keep_registration_order() {
        let log = CallLog::default();
        let first = Mock::logged("first", 5, Eligibility::No, Outcome::Fail, Arc::clone(&log));
        let second = Mock::logged("second", 5, Eligibility::No, Outcome::Fail, Arc::clone(&log));
        signer(&[&first, &second])
            .attempt_auto_sign(&tool_call(), Some(&user()), &PolicyConfig::default())
            .await;
        assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    }

    #[tokio::test]
    async fn test_can_sign_error_counts_as_attempt() {
        let broken = Mock::new("broken", 20, Eligibility::Error, Outcome::Succeed);
        let backup = Mock::new("backup", 10, Eligibility::Yes, Outcome::Succeed);
        let result = signer(&[&broken, &backup])
            .attempt_auto_sign(&tool_call(), Some(&user()), &PolicyConfig::default())
            .await;

        assert_eq!(broken.can_sign_calls(), 3);
        assert_eq!(broken.sign_calls(), 0);
        assert_eq!(result.strategy(), Some("backup"));
    }

    #[tokio::test]
    async fn test_panic_counts_as_attempt() {
        let panicky = Mock::new("panicky", 20, Eligibility::Yes, Outcome::Panic);
        let backup = Mock::new("backup", 10, Eligibility::Yes, Outcome::Succeed);
        let result = signer(&[&panicky, &backup])
            .attempt_auto_sign(&tool_call(), Some(&user()), &PolicyConfig::default())
            .await;

        assert_eq!(panicky.sign_calls(), 3);
        assert_eq!(result.strategy(), Some("backup"));
    }

    #[tokio::test]
    async fn test_panic_before_future_counts_as_attempt() {
        let eager_check = Mock::new("eager-check", 30, Eligibility::PanicEagerly, Outcome::Succeed);
        let eager_sign = Mock::new("eager-sign", 20, Eligibility::Yes, Outcome::PanicEagerly);
        let backup = Mock::new("backup", 10, Eligibility::Yes, Outcome::Succeed);
        let result = signer(&[&eager_check, &eager_sign, &backup])
            .attempt_auto_sign(&tool_call(), Some(&user()), &PolicyConfig::default())
            .await;

        assert_eq!(eager_check.can_sign_calls(), 3);
        assert_eq!(eager_check.sign_calls(), 0);
        assert_eq!(eager_sign.sign_calls(), 3);
        assert_eq!(result.strategy(), Some("backup"));
    }

    #[tokio::test]
    async fn test_panic_before_future_never_escapes() {
        let eager = Mock::new("eager", 10, Eligibility::PanicEagerly, Outcome::Succeed);
        let result = signer(&[&eager])
            .attempt_auto_sign(&tool_call(), Some(&user()), &PolicyConfig::default())
            .await;

        assert_eq!(
            result.error(),
            Some("All 1 signing strategies failed after 3 attempts")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_at_deadline() {
        let slow = Mock::new("slow", 10, Eligibility::Yes, Outcome::Delay(Duration::from_millis(500)));
        let config = PolicyConfig {
            timeout_ms: 50,
            ..PolicyConfig::default()
        };
        let started = Instant::now();
        let result = signer(&[&slow])
            .attempt_auto_sign(&tool_call(), Some(&user()), &config)
            .await;

        assert_eq!(
            result.error(),
            Some("Auto-signing failed, manual payment required")
        );
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(500));

        let token = slow.last_token.lock().unwrap().clone().unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fallback_messages() {
        let slow = Mock::new("slow", 10, Eligibility::Yes, Outcome::Delay(Duration::from_secs(5)));
        let signer = signer(&[&slow]);
        let config = |fallback_behavior| PolicyConfig {
            timeout_ms: 100,
            fallback_behavior,
            ..PolicyConfig::default()
        };

        let result = signer
            .attempt_auto_sign(&tool_call(), Some(&user()), &config(FallbackBehavior::Fail))
            .await;
        assert_eq!(result.error(), Some("auto-signing timed out after 100ms"));

        let result = signer
            .attempt_auto_sign(&tool_call(), Some(&user()), &config(FallbackBehavior::LogOnly))
            .await;
        assert_eq!(result.error(), Some("Auto-signing failed (log_only mode)"));
    }

    #[tokio::test]
    async fn test_invalid_requirement_uses_fallback() {
        let mock = Mock::new("a", 10, Eligibility::Yes, Outcome::Succeed);
        let mut call = tool_call();
        call.payment.max_amount_required = "0.10".into();

        let result = signer(&[&mock])
            .attempt_auto_sign(&call, Some(&user()), &PolicyConfig::default())
            .await;
        assert_eq!(
            result.error(),
            Some("Auto-signing failed, manual payment required")
        );

        let config = PolicyConfig {
            fallback_behavior: FallbackBehavior::Fail,
            ..PolicyConfig::default()
        };
        let result = signer(&[&mock]).attempt_auto_sign(&call, Some(&user()), &config).await;
        assert!(result.error().unwrap().starts_with("invalid payment requirement"));
        assert_eq!(mock.can_sign_calls(), 0);
    }

    #[tokio::test]
    async fn test_default_pay_to() {
        let mock = Mock::new("a", 10, Eligibility::Yes, Outcome::Succeed);
        let mut call = tool_call();
        call.payment.pay_to = None;
        let config = PolicyConfig {
            fallback_behavior: FallbackBehavior::Fail,
            ..PolicyConfig::default()
        };

        let result = signer(&[&mock]).attempt_auto_sign(&call, Some(&user()), &config).await;
        assert!(result.error().unwrap().contains("no payTo address"));

        let result = signer(&[&mock])
            .with_default_pay_to(PAY_TO)
            .attempt_auto_sign(&call, Some(&user()), &config)
            .await;
        assert!(result.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_backoff_between_attempts() {
        let mock = Mock::new("flaky", 10, Eligibility::Yes, Outcome::Fail);
        let signer = signer(&[&mock]).with_backoff(Backoff::default());
        let started = Instant::now();
        signer
            .attempt_auto_sign(&tool_call(), Some(&user()), &PolicyConfig::default())
            .await;
        assert_eq!(mock.sign_calls(), 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[test]
    fn test_backoff_delays() {
        assert_eq!(Backoff::None.delay(3), Duration::ZERO);
        assert_eq!(Backoff::default().delay(2), Duration::from_secs(2));
        let exp = Backoff::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(350),
        };
        assert_eq!(exp.delay(1), Duration::from_millis(100));
        assert_eq!(exp.delay(2), Duration::from_millis(200));
        assert_eq!(exp.delay(3), Duration::from_millis(350));
    }
}
