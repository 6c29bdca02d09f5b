//! # wirecheck Scenarios
//!
//! YAML scenario definitions, the loader that finds them and the compiled
//! `.wcs` cache.

pub mod definition;
pub mod error;
pub mod loader;

pub use definition::ScenarioDefinition;
pub use error::LoaderError;
pub use loader::{CompiledScenario, ScenarioLoader};
