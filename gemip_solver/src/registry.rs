use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use gemip_common::SolverConfig;
use thiserror::Error;

use crate::exhaustive::ExhaustiveSolver;
use crate::solver::Solver;

/// Errors raised by the [`SolverRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No constructor is registered under the name.
    #[error("Unknown solver backend '{name}' (available: {available})")]
    UnknownBackend {
        /// Requested name.
        name: String,
        /// Comma separated registered names.
        available: String,
    },

    /// A constructor is already registered under the name.
    #[error("Solver backend '{0}' is already registered")]
    Duplicate(String),

    /// The constructor rejected the configuration.
    #[error("Failed to construct solver backend '{name}': {reason}")]
    Construction {
        /// Backend name.
        name: String,
        /// Constructor diagnostic.
        reason: String,
    },
}

impl RegistryError {
    /// A constructor failure for `name`.
    pub fn construction(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Constructor capability stored in the registry.
pub type SolverFactory =
    dyn Fn(&SolverConfig) -> Result<Arc<dyn Solver>, RegistryError> + Send + Sync;

/// Maps backend names to constructors.
///
/// Cloning shares the underlying table.
#[derive(Clone, Default)]
pub struct SolverRegistry {
    factories: Arc<RwLock<HashMap<String, Arc<SolverFactory>>>>,
}

impl std::fmt::Debug for SolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

impl SolverRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in backends.
    #[must_use]
    pub fn builtin() -> Self {
        let registry = Self::new();
        let factories = registry.factories.write();
        let mut factories = factories.unwrap_or_else(PoisonError::into_inner);
        factories.insert(
            ExhaustiveSolver::NAME.to_string(),
            Arc::new(|config: &SolverConfig| {
                Ok(Arc::new(ExhaustiveSolver::from_config(config)?) as Arc<dyn Solver>)
            }),
        );
        drop(factories);
        registry
    }

    /// Registers a constructor under `name`.
    ///
    /// # Errors
    /// [`RegistryError::Duplicate`] if the name is taken.
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&SolverConfig) -> Result<Arc<dyn Solver>, RegistryError> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!("registered solver backend '{name}'");
        factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Builds the backend named by `config.backend`.
    ///
    /// # Errors
    /// [`RegistryError::UnknownBackend`] or the constructor's own error.
    pub fn create(&self, config: &SolverConfig) -> Result<Arc<dyn Solver>, RegistryError> {
        self.create_named(&config.backend, config)
    }

    /// Builds the backend `name` with `config`.
    ///
    /// # Errors
    /// [`RegistryError::UnknownBackend`] or the constructor's own error.
    pub fn create_named(
        &self,
        name: &str,
        config: &SolverConfig,
    ) -> Result<Arc<dyn Solver>, RegistryError> {
        // Release the lock before running the constructor.
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();
        let Some(factory) = factory else {
            return Err(RegistryError::UnknownBackend {
                name: name.to_string(),
                available: self.names().join(", "),
            });
        };
        tracing::debug!("creating solver backend '{name}'");
        factory(config)
    }
}
