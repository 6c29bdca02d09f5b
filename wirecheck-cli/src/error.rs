use thiserror::Error;

use wirecheck_config::ConfigError;
use wirecheck_engine::EngineError;
use wirecheck_scenarios::LoaderError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("telemetry setup failed: {0}")]
    Telemetry(String),

    #[error("scenario '{scenario}' did not pass ({summary})")]
    RunFailed { scenario: String, summary: String },
}
