use crate::calendar::DEFAULT_HORIZON_DAYS;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid engine config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid engine config: {0}")]
    Invalid(String),
}

/// Limits that abort a run instead of letting it hang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunBudget {
    /// One step per placed operation plus one per calendar day scanned.
    pub max_steps: Option<u64>,
    pub max_millis: Option<u64>,
}

impl RunBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn max_duration(&self) -> Option<StdDuration> {
        self.max_millis.map(StdDuration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How many days a calendar search may walk before giving up.
    pub horizon_days: u32,
    /// Turn constraint conflicts and calendar exhaustion into run failures.
    pub strict: bool,
    /// Place operations in one uninterrupted working interval instead of
    /// letting them pause over non-working time.
    pub contiguous_placement: bool,
    /// Anchor for jobs without a release date; the Unix epoch when unset.
    pub planning_start: Option<NaiveDateTime>,
    pub budget: RunBudget,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            strict: false,
            contiguous_placement: false,
            planning_start: None,
            budget: RunBudget::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon_days == 0 {
            return Err(ConfigError::Invalid(
                "horizon_days must be at least 1".into(),
            ));
        }
        if self.budget.max_steps == Some(0) {
            return Err(ConfigError::Invalid(
                "budget.max_steps must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run settings: the engine config plus run-scoped inputs.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: EngineConfig,
    pub cancellation: CancellationToken,
    /// Anchor for jobs without a release date; overrides
    /// [`EngineConfig::planning_start`] for this run.
    pub planning_start: Option<NaiveDateTime>,
}

impl RunOptions {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn strict(mut self) -> Self {
        self.config.strict = true;
        self
    }

    pub fn with_budget(mut self, budget: RunBudget) -> Self {
        self.config.budget = budget;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_planning_start(mut self, start: NaiveDateTime) -> Self {
        self.planning_start = Some(start);
        self
    }
}
