//! # wirecheck Configuration
//!
//! Layered harness settings: where scenarios live, how long runs may take,
//! and how loudly to log.
//!
//! Hierarchy, lowest precedence first:
//! 1. Default values
//! 2. `config/wirecheck.yaml`
//! 3. `config/<WIRECHECK_ENV>.yaml` (defaults to `development`)
//! 4. `WIRECHECK_*` environment variables, `__` separating levels
//!    (e.g. `WIRECHECK_RUN__TIMEOUT_OVERRIDE_MS=500`)

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod run;
mod telemetry;
pub mod validation;

pub use error::ConfigError;
pub use run::RunConfig;
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/wirecheck.yaml";
const ENV_PREFIX: &str = "WIRECHECK_";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
pub struct HarnessConfig {
    #[serde(default)]
    #[validate(nested)]
    pub run: RunConfig,

    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl HarnessConfig {
    /// The layered provider stack, without extraction.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(HarnessConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("WIRECHECK_ENV").unwrap_or_else(|_| "development".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration from default files and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(Self::figment())
    }

    /// Load configuration from a specific file, still honouring environment
    /// overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        Self::extract(
            Figment::from(Serialized::defaults(HarnessConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}
