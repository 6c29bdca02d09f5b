//! Scenario execution parameters.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct RunConfig {
    /// Deadline for scenarios that do not declare their own (milliseconds).
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1, max = 600_000))]
    pub default_timeout_ms: u64,

    /// Replaces every scenario's own deadline when set (milliseconds).
    #[serde(default)]
    #[validate(range(min = 1, max = 600_000))]
    pub timeout_override_ms: Option<u64>,

    /// Where `<name>.yaml` scenario sources live.
    #[serde(default = "default_scenario_dir")]
    #[validate(custom(function = validation::validate_directory))]
    pub scenario_dir: PathBuf,

    /// Where compiled `<name>.wcs` artifacts go. Defaults to `scenario_dir`.
    #[serde(default)]
    #[validate(custom(function = validation::validate_directory))]
    pub cache_dir: Option<PathBuf>,

    /// Prefer a fresh compiled artifact over re-parsing the source.
    #[serde(default = "default_true")]
    pub use_compiled: bool,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_scenario_dir() -> PathBuf {
    PathBuf::from("scenarios")
}

fn default_true() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            timeout_override_ms: None,
            scenario_dir: default_scenario_dir(),
            cache_dir: None,
            use_compiled: default_true(),
        }
    }
}

impl RunConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout_override_ms.map(Duration::from_millis)
    }

    pub fn cache_dir(&self) -> &PathBuf {
        self.cache_dir.as_ref().unwrap_or(&self.scenario_dir)
    }
}
