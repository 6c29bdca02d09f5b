use std::path::PathBuf;

use thiserror::Error;

use wirecheck_core::ConfigurationError;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("no scenarios given")]
    NoScenarios,

    #[error("'{0}' is not a valid scenario name")]
    InvalidName(String),

    #[error("scenario '{name}' not found in {}", dir.display())]
    NotFound { name: String, dir: PathBuf },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("event '{label}' needs a '{field}' entry")]
    MissingField { label: String, field: &'static str },

    #[error("scenario '{scenario}' is invalid: {source}")]
    Definition {
        scenario: String,
        #[source]
        source: ConfigurationError,
    },
}

impl LoaderError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| LoaderError::Io { path, source }
    }
}
