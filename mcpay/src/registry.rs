//! Runtime-mode aware registry of signing strategies.
//!
//! The registry is assembled once at startup from named constructors. Each
//! call to [`StrategyRegistry::strategies`] builds the strategies available
//! in the given [`RuntimeMode`], in registration order. Constructors that
//! fail (for example because provider credentials are missing) are logged
//! and left out, so one misconfigured backend never takes the others down.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::RuntimeMode;
use crate::strategy::{SigningStrategy, panic_message};

/// Error type a strategy constructor may return.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// A strategy constructor.
pub type StrategyFactory =
    Box<dyn Fn() -> Result<Arc<dyn SigningStrategy>, FactoryError> + Send + Sync>;

/// Runtime modes in which a registry entry is exposed.
///
/// The test runtime never sees production entries and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    /// Only in [`RuntimeMode::Test`].
    TestOnly,
    /// Everywhere except [`RuntimeMode::Test`].
    NonTest,
}

impl Availability {
    /// Returns `true` if an entry with this availability is exposed in `mode`.
    #[must_use]
    pub const fn includes(self, mode: RuntimeMode) -> bool {
        match self {
            Self::TestOnly => matches!(mode, RuntimeMode::Test),
            Self::NonTest => !matches!(mode, RuntimeMode::Test),
        }
    }
}

/// A strategy constructor that failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to construct signing strategy {name}: {source}")]
pub struct RegistryError {
    /// Registry entry name.
    pub name: String,
    /// Underlying constructor error.
    #[source]
    pub source: FactoryError,
}

struct Entry {
    name: String,
    availability: Availability,
    factory: StrategyFactory,
}

/// Ordered collection of strategy constructors.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: Vec<Entry>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<(&str, Availability)> = self
            .entries
            .iter()
            .map(|e| (e.name.as_str(), e.availability))
            .collect();
        f.debug_tuple("StrategyRegistry").field(&names).finish()
    }
}

impl StrategyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a constructor.
    #[must_use]
    pub fn register<F>(
        mut self,
        name: impl Into<String>,
        availability: Availability,
        factory: F,
    ) -> Self
    where
        F: Fn() -> Result<Arc<dyn SigningStrategy>, FactoryError> + Send + Sync + 'static,
    {
        self.entries.push(Entry {
            name: name.into(),
            availability,
            factory: Box::new(factory),
        });
        self
    }

    /// Appends an already-built strategy, shared across calls.
    #[must_use]
    pub fn register_instance(
        self,
        availability: Availability,
        strategy: Arc<dyn SigningStrategy>,
    ) -> Self {
        let name = strategy.name().to_owned();
        self.register(name, availability, move || Ok(Arc::clone(&strategy)))
    }

    /// Number of registered entries, regardless of mode.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds every entry available in `mode`, reporting failures.
    ///
    /// A constructor that panics is reported like one that returned an error.
    #[must_use]
    pub fn build(
        &self,
        mode: RuntimeMode,
    ) -> Vec<Result<Arc<dyn SigningStrategy>, RegistryError>> {
        self.entries
            .iter()
            .filter(|entry| entry.availability.includes(mode))
            .map(|entry| {
                panic::catch_unwind(AssertUnwindSafe(|| (entry.factory)()))
                    .unwrap_or_else(|panic| {
                        Err(format!("constructor panicked: {}", panic_message(panic.as_ref())).into())
                    })
                    .map_err(|source| RegistryError {
                        name: entry.name.clone(),
                        source,
                    })
            })
            .collect()
    }

    /// Builds the strategies available in `mode`, skipping failed entries.
    ///
    /// The result keeps registration order; it is not sorted by priority.
    #[must_use]
    pub fn strategies(&self, mode: RuntimeMode) -> Vec<Arc<dyn SigningStrategy>> {
        self.build(mode)
            .into_iter()
            .filter_map(|built| match built {
                Ok(strategy) => Some(strategy),
                Err(err) => {
                    tracing::warn!(strategy = %err.name, error = %err.source, "Signing strategy unavailable");
                    None
                }
            })
            .collect()
    }
}
