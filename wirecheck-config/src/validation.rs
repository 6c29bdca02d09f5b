//! Custom validation functions for configuration.

use std::path::Path;

use regex::Regex;
use validator::ValidationError;

/// Validate a tracing level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let re = Regex::new("^(?i)(trace|debug|info|warn|error|off)$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(level) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// Validate that a directory setting is a usable relative or absolute path.
pub fn validate_directory(path: &Path) -> Result<(), ValidationError> {
    let text = path.to_string_lossy();
    let re = Regex::new(r"^[^\x00\n\r]+$").map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(&text) && !text.trim().is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_directory"))
    }
}

/// Validate a scenario name: no path separators, no leading dot.
pub fn validate_scenario_name(name: &str) -> Result<(), ValidationError> {
    let re = Regex::new("^[A-Za-z0-9_][A-Za-z0-9_.-]*$").map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_scenario_name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels() {
        assert!(validate_log_level("info").is_ok());
        assert!(validate_log_level("DEBUG").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }

    #[test]
    fn scenario_names() {
        assert!(validate_scenario_name("arp_request").is_ok());
        assert!(validate_scenario_name("udp-echo.v2").is_ok());
        assert!(validate_scenario_name("../etc/passwd").is_err());
        assert!(validate_scenario_name(".hidden").is_err());
        assert!(validate_scenario_name("").is_err());
    }

    #[test]
    fn directories() {
        assert!(validate_directory(Path::new("scenarios")).is_ok());
        assert!(validate_directory(Path::new("  ")).is_err());
    }
}
