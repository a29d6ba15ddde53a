//! Configuration for formulating, solving, and decoding a matching run.
//!
//! The surface is deliberately flat so that hosts can build a [`Config`] in
//! code with [`Config::builder`] or load it from JSON:
//!
//! ```ignore
//! use gemip_common::{Config, CutMethod};
//! let cfg = Config::builder()
//!     .backend("exhaustive")
//!     .time_limit_secs(5.0)
//!     .solutions(3)
//!     .cut(CutMethod::Matchings)
//!     .build();
//! ```
//!
//! Every section has a `Default`, and missing JSON fields fall back to it.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON text could not be parsed into a configuration.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// A field holds a value outside its admissible range.
    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Human readable explanation.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Global configuration for a matching session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend selection and solve options.
    pub solver: SolverConfig,
    /// Tolerances used when turning a solved assignment into a correspondence.
    pub decode: DecodeConfig,
    /// Knobs shared by every formulation.
    pub formulation: FormulationConfig,
    /// Ranked enumeration of several solutions per matcher.
    pub enumeration: EnumerationConfig,
    /// Worker pool sizing.
    pub pool: PoolConfig,
}

impl Config {
    /// Starts a fluent builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parses and validates a configuration from JSON text.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed JSON and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        tracing::debug!("loaded configuration: backend '{}'", config.solver.backend);
        Ok(config)
    }

    /// Reads a JSON configuration file and validates it.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise the
    /// errors of [`Config::from_json_str`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Serializes the configuration to pretty JSON.
    ///
    /// # Errors
    /// Propagates serializer failures.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every range constraint.
    ///
    /// # Errors
    /// Returns the first [`ConfigError::Invalid`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.solver.backend.trim().is_empty() {
            return Err(ConfigError::invalid("solver.backend", "must not be empty"));
        }
        if let Some(limit) = self.solver.time_limit_secs {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(ConfigError::invalid(
                    "solver.time_limit_secs",
                    format!("expected a positive number of seconds, got {limit}"),
                ));
            }
        }
        non_negative("solver.gap_tolerance", self.solver.gap_tolerance)?;
        non_negative("decode.rounding_epsilon", self.decode.rounding_epsilon)?;
        non_negative("decode.objective_tolerance", self.decode.objective_tolerance)?;
        non_negative(
            "formulation.zero_cost_precision",
            self.formulation.zero_cost_precision,
        )?;
        if self.decode.rounding_epsilon >= 0.5 {
            return Err(ConfigError::invalid(
                "decode.rounding_epsilon",
                "must be below 0.5 or binary rounding becomes ambiguous",
            ));
        }
        let up = self.formulation.upper_bound;
        if up.is_nan() || up <= 0.0 || up > 1.0 {
            return Err(ConfigError::invalid(
                "formulation.upper_bound",
                format!("expected a ratio in (0, 1], got {up}"),
            ));
        }
        if let Linearization::Auto { density_threshold } = self.formulation.linearization {
            if !(0.0..=1.0).contains(&density_threshold) {
                return Err(ConfigError::invalid(
                    "formulation.linearization.density_threshold",
                    format!("expected a ratio in [0, 1], got {density_threshold}"),
                ));
            }
        }
        if self.enumeration.solutions == 0 {
            return Err(ConfigError::invalid(
                "enumeration.solutions",
                "at least one solution must be requested",
            ));
        }
        Ok(())
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("expected a finite, non-negative number, got {value}"),
        ))
    }
}

/// Which backend to instantiate and how to drive it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Registry key of the backend.
    pub backend: String,
    /// Wall-clock budget handed to the backend; `None` means unlimited.
    pub time_limit_secs: Option<f64>,
    /// Relative optimality gap at which the backend may stop.
    pub gap_tolerance: f64,
    /// Threads the backend may use for a single solve.
    pub threads: usize,
    /// Backend specific parameters, passed through untouched.
    pub params: BTreeMap<String, String>,
}

impl SolverConfig {
    /// The time limit as a [`Duration`].
    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(Duration::from_secs_f64)
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: String::from("exhaustive"),
            time_limit_secs: None,
            gap_tolerance: 0.0,
            threads: 1,
            params: BTreeMap::new(),
        }
    }
}

/// Tolerances applied while decoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Distance to 0 or 1 under which a fractional value is rounded.
    pub rounding_epsilon: f64,
    /// Allowed difference between recomputed cost and reported objective.
    pub objective_tolerance: f64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            rounding_epsilon: 1e-6,
            objective_tolerance: 1e-6,
        }
    }
}

/// Generation strategy for auxiliary product variables.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Linearization {
    /// One auxiliary variable per candidate pair.
    Exhaustive,
    /// Only pairs whose objective coefficient is non-zero.
    Lazy,
    /// Lazy when the share of non-zero coefficients is at most `density_threshold`.
    Auto {
        /// Share of non-zero coefficients above which generation is exhaustive.
        density_threshold: f64,
    },
}

impl Default for Linearization {
    fn default() -> Self {
        Self::Auto {
            density_threshold: 0.5,
        }
    }
}

impl Linearization {
    /// Whether generation should skip zero-coefficient pairs given the
    /// observed share of non-zero coefficients.
    #[must_use]
    pub fn is_lazy(self, density: f64) -> bool {
        match self {
            Self::Exhaustive => false,
            Self::Lazy => true,
            Self::Auto { density_threshold } => density <= density_threshold,
        }
    }
}

/// Options shared by every formulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulationConfig {
    /// Share of cheapest candidates kept per row/column; 1.0 keeps all.
    pub upper_bound: f64,
    /// Require induced matchings in the subgraph family.
    pub induced: bool,
    /// Auxiliary variable generation strategy.
    pub linearization: Linearization,
    /// Costs at or below this value count as identical elements.
    pub zero_cost_precision: f64,
}

impl Default for FormulationConfig {
    fn default() -> Self {
        Self {
            upper_bound: 1.0,
            induced: false,
            linearization: Linearization::default(),
            zero_cost_precision: 1e-9,
        }
    }
}

/// How a found solution is excluded before searching for the next one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutMethod {
    /// Only this exact mapping becomes infeasible.
    #[default]
    Solution,
    /// Every chosen vertex pair becomes infeasible.
    Matchings,
    /// Every target vertex used by the solution becomes unmatchable.
    Elements,
}

/// Ranked enumeration settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumerationConfig {
    /// Maximum number of solutions produced by one matcher.
    pub solutions: usize,
    /// Cut applied between consecutive solves.
    pub cut: CutMethod,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            solutions: 1,
            cut: CutMethod::Solution,
        }
    }
}

/// Worker pool sizing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads, `0` lets rayon decide.
    pub threads: usize,
}

/// Fluent builder for [`Config`].
#[derive(Clone, Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Registry key of the solver backend.
    #[must_use]
    pub fn backend(mut self, name: impl Into<String>) -> Self {
        self.config.solver.backend = name.into();
        self
    }

    /// Wall-clock budget per solve.
    #[must_use]
    pub const fn time_limit_secs(mut self, secs: f64) -> Self {
        self.config.solver.time_limit_secs = Some(secs);
        self
    }

    /// Relative optimality gap.
    #[must_use]
    pub const fn gap_tolerance(mut self, gap: f64) -> Self {
        self.config.solver.gap_tolerance = gap;
        self
    }

    /// Threads per solve.
    #[must_use]
    pub const fn solver_threads(mut self, threads: usize) -> Self {
        self.config.solver.threads = threads;
        self
    }

    /// Adds a backend specific parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.solver.params.insert(key.into(), value.into());
        self
    }

    /// Rounding epsilon for near-binary values.
    #[must_use]
    pub const fn rounding_epsilon(mut self, eps: f64) -> Self {
        self.config.decode.rounding_epsilon = eps;
        self
    }

    /// Tolerance between recomputed cost and reported objective.
    #[must_use]
    pub const fn objective_tolerance(mut self, tol: f64) -> Self {
        self.config.decode.objective_tolerance = tol;
        self
    }

    /// Candidate restriction ratio.
    #[must_use]
    pub const fn upper_bound(mut self, up: f64) -> Self {
        self.config.formulation.upper_bound = up;
        self
    }

    /// Induced matching for the subgraph family.
    #[must_use]
    pub const fn induced(mut self, induced: bool) -> Self {
        self.config.formulation.induced = induced;
        self
    }

    /// Auxiliary variable generation strategy.
    #[must_use]
    pub const fn linearization(mut self, linearization: Linearization) -> Self {
        self.config.formulation.linearization = linearization;
        self
    }

    /// Precision under which a substitution counts as an identity.
    #[must_use]
    pub const fn zero_cost_precision(mut self, precision: f64) -> Self {
        self.config.formulation.zero_cost_precision = precision;
        self
    }

    /// Number of ranked solutions per matcher.
    #[must_use]
    pub const fn solutions(mut self, count: usize) -> Self {
        self.config.enumeration.solutions = count;
        self
    }

    /// Cut used between ranked solves.
    #[must_use]
    pub const fn cut(mut self, cut: CutMethod) -> Self {
        self.config.enumeration.cut = cut;
        self
    }

    /// Matcher pool size.
    #[must_use]
    pub const fn pool_threads(mut self, threads: usize) -> Self {
        self.config.pool.threads = threads;
        self
    }

    /// Finishes the builder without validation.
    #[must_use]
    pub fn build(self) -> Config {
        self.config
    }

    /// Finishes the builder and validates the result.
    ///
    /// # Errors
    /// See [`Config::validate`].
    pub fn try_build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
