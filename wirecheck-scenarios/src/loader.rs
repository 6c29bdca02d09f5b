//! Scenario lookup and the compiled-artifact cache.
//!
//! Sources are `<name>.yaml` under the scenario directory. `compile` writes
//! `<name>.wcs` under the cache directory: a YAML envelope with the BLAKE3
//! digest of the source bytes, a compile timestamp and the normalized
//! definition. An artifact is trusted when it is at least as new as its
//! source and the digest still matches, or when the source is gone.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use wirecheck_config::{validation, RunConfig};
use wirecheck_core::scenario::Scenario;

use crate::definition::ScenarioDefinition;
use crate::error::LoaderError;

pub const SOURCE_EXTENSION: &str = "yaml";
pub const COMPILED_EXTENSION: &str = "wcs";
const FORMAT_VERSION: u32 = 1;

/// Envelope stored in a `.wcs` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledScenario {
    pub format_version: u32,
    /// Hex BLAKE3 digest of the source file.
    pub source_digest: String,
    pub compiled_at: DateTime<Utc>,
    pub definition: ScenarioDefinition,
}

impl CompiledScenario {
    fn new(source: &[u8], definition: ScenarioDefinition) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            source_digest: digest(source),
            compiled_at: Utc::now(),
            definition,
        }
    }
}

pub fn digest(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

#[derive(Debug, Clone)]
pub struct ScenarioLoader {
    scenario_dir: PathBuf,
    cache_dir: PathBuf,
    default_timeout: Duration,
    use_compiled: bool,
}

impl ScenarioLoader {
    pub fn new(scenario_dir: impl Into<PathBuf>) -> Self {
        let scenario_dir = scenario_dir.into();
        Self {
            cache_dir: scenario_dir.clone(),
            scenario_dir,
            default_timeout: RunConfig::default().default_timeout(),
            use_compiled: true,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            scenario_dir: config.scenario_dir.clone(),
            cache_dir: config.cache_dir().clone(),
            default_timeout: config.default_timeout(),
            use_compiled: config.use_compiled,
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Ignore compiled artifacts unless the source is missing.
    pub fn prefer_source(mut self) -> Self {
        self.use_compiled = false;
        self
    }

    pub fn source_path(&self, name: &str) -> PathBuf {
        self.scenario_dir.join(format!("{}.{}", name, SOURCE_EXTENSION))
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.{}", name, COMPILED_EXTENSION))
    }

    /// Names of every scenario with a source or an artifact, sorted.
    pub fn available(&self) -> Result<Vec<String>, LoaderError> {
        let mut names = Vec::new();
        for (dir, extension) in [
            (&self.scenario_dir, SOURCE_EXTENSION),
            (&self.cache_dir, COMPILED_EXTENSION),
        ] {
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(dir).map_err(LoaderError::io(dir))? {
                let path = entry.map_err(LoaderError::io(dir))?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    pub fn load(&self, name: &str) -> Result<Scenario, LoaderError> {
        self.load_definition(name)?.build(self.default_timeout)
    }

    pub fn load_definition(&self, name: &str) -> Result<ScenarioDefinition, LoaderError> {
        check_name(name)?;
        let source = self.source_path(name);
        let artifact = self.artifact_path(name);

        if !source.exists() {
            if artifact.exists() {
                debug!(scenario = name, "source missing, loading compiled artifact");
                return Ok(read_artifact(&artifact)?.definition);
            }
            return Err(LoaderError::NotFound {
                name: name.to_string(),
                dir: self.scenario_dir.clone(),
            });
        }

        let bytes = fs::read(&source).map_err(LoaderError::io(&source))?;
        if self.use_compiled && artifact.exists() {
            match self.fresh_artifact(&source, &artifact, &bytes) {
                Ok(Some(compiled)) => {
                    debug!(scenario = name, compiled_at = %compiled.compiled_at, "using compiled artifact");
                    return Ok(compiled.definition);
                }
                Ok(None) => debug!(scenario = name, "compiled artifact is stale"),
                Err(err) => warn!(scenario = name, error = %err, "ignoring unreadable compiled artifact"),
            }
        }
        parse_source(&source, &bytes)
    }

    /// Parses and checks `name`, then writes its artifact. Returns the
    /// artifact path.
    pub fn compile(&self, name: &str) -> Result<PathBuf, LoaderError> {
        check_name(name)?;
        let source = self.source_path(name);
        if !source.exists() {
            return Err(LoaderError::NotFound {
                name: name.to_string(),
                dir: self.scenario_dir.clone(),
            });
        }
        let bytes = fs::read(&source).map_err(LoaderError::io(&source))?;
        let definition = parse_source(&source, &bytes)?;
        definition.build(self.default_timeout)?;

        let artifact = self.artifact_path(name);
        let compiled = CompiledScenario::new(&bytes, definition);
        let text = serde_yaml::to_string(&compiled).map_err(|source| LoaderError::Parse {
            path: artifact.clone(),
            source,
        })?;
        fs::create_dir_all(&self.cache_dir).map_err(LoaderError::io(&self.cache_dir))?;
        fs::write(&artifact, text).map_err(LoaderError::io(&artifact))?;
        info!(scenario = name, path = %artifact.display(), digest = %compiled.source_digest, "compiled scenario");
        Ok(artifact)
    }

    pub fn compile_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<PathBuf>, LoaderError> {
        if names.is_empty() {
            return Err(LoaderError::NoScenarios);
        }
        names.iter().map(|name| self.compile(name.as_ref())).collect()
    }

    fn fresh_artifact(
        &self,
        source: &Path,
        artifact: &Path,
        source_bytes: &[u8],
    ) -> Result<Option<CompiledScenario>, LoaderError> {
        if modified(artifact)? < modified(source)? {
            return Ok(None);
        }
        let compiled = read_artifact(artifact)?;
        if compiled.format_version != FORMAT_VERSION || compiled.source_digest != digest(source_bytes) {
            return Ok(None);
        }
        Ok(Some(compiled))
    }
}

fn check_name(name: &str) -> Result<(), LoaderError> {
    validation::validate_scenario_name(name).map_err(|_| LoaderError::InvalidName(name.to_string()))
}

fn modified(path: &Path) -> Result<SystemTime, LoaderError> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(LoaderError::io(path))
}

fn parse_source(path: &Path, bytes: &[u8]) -> Result<ScenarioDefinition, LoaderError> {
    serde_yaml::from_slice(bytes).map_err(|source| LoaderError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn read_artifact(path: &Path) -> Result<CompiledScenario, LoaderError> {
    let bytes = fs::read(path).map_err(LoaderError::io(path))?;
    serde_yaml::from_slice(&bytes).map_err(|source| LoaderError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
