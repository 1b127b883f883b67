//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: AppConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/grpc-runner.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("grpc-runner-test-{}.toml", std::process::id()));
        fs::write(&path, "[server]\naddress = \"localhost:0\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.address, "localhost:0");

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_invalid_toml() {
        let path = std::env::temp_dir().join(format!("grpc-runner-bad-{}.toml", std::process::id()));
        fs::write(&path, "[server\naddress = ").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let _ = fs::remove_file(&path);
    }
}
