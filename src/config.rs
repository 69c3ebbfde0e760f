//! Configuration shared by the module converters and the CLI

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::modules::template::MissingVariablePolicy;

/// Settings handed to every converter by the module registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    pub missing_variable_policy: MissingVariablePolicy,
    /// Octal file mode applied by copy when no `perm` is given
    pub default_file_mode: String,
    pub log_level: String,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            missing_variable_policy: MissingVariablePolicy::LeavePlaceholder,
            default_file_mode: "0664".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ModulesConfig {
    /// Load from a YAML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        Ok(config)
    }

    /// Default file mode as a numeric value, falling back to 0o664
    pub fn file_mode(&self) -> u32 {
        crate::modules::binder::parse_file_mode(&self.default_file_mode).unwrap_or(0o664)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ModulesConfig::default();
        assert_eq!(
            config.missing_variable_policy,
            MissingVariablePolicy::LeavePlaceholder
        );
        assert_eq!(config.file_mode(), 0o664);
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "missing_variable_policy: strict").unwrap();
        writeln!(file, "default_file_mode: \"0600\"").unwrap();

        let config = ModulesConfig::from_file(file.path()).unwrap();
        assert_eq!(config.missing_variable_policy, MissingVariablePolicy::Strict);
        assert_eq!(config.file_mode(), 0o600);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"log_level": "debug"}}"#).unwrap();

        let config = ModulesConfig::from_file(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
    }
}
