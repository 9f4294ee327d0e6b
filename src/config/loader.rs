//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::Config;
use crate::config::validation::{validate_config, ValidationError};
use crate::template::Node;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "validation errors:")?;
                for err in errors {
                    write!(f, "\n- {}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// A validated document together with the raw tree it was decoded from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub document: Node,
}

/// Decode and validate a YAML document.
pub fn parse_and_validate(bytes: &[u8]) -> Result<LoadedConfig, ConfigError> {
    let document = Node::parse(bytes).map_err(ConfigError::Parse)?;
    let config = typed_config(&document)?;
    Ok(LoadedConfig { config, document })
}

/// Build and validate the typed view of a (possibly rewritten) tree.
pub fn typed_config(document: &Node) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_value(document.to_yaml()).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let content = fs::read(path).map_err(ConfigError::Io)?;
    parse_and_validate(&content)
}
