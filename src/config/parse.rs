use super::types::Config;
use crate::config::expand_tilde;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed: {0}")]
    Validation(String),
}

/// Load a config file, falling back to defaults when `path` is None.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string)?;

    let config: Config = serde_yaml::from_str(&yaml_string)?;

    Ok(config)
}

fn expand_paths(config: &mut Config) {
    config.source = expand_tilde(&config.source);
    config.data_dir = expand_tilde(&config.data_dir);
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.ingest.check_interval.is_zero() {
        return Err(ConfigError::Validation(
            "ingest.check_interval must be greater than zero".to_string(),
        ));
    }

    if config.web.enabled && config.web.listen.parse::<std::net::SocketAddr>().is_err() {
        return Err(ConfigError::Validation(format!(
            "web.listen is not a valid socket address: '{}'",
            config.web.listen
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_when_no_config() {
        let config = load_config(None).unwrap();
        assert_eq!(config.ingest.check_interval, Duration::from_secs(30));
        assert_eq!(config.ingest.stats_interval, Duration::from_secs(300));
        assert!(config.web.enabled);
        assert_eq!(config.web.listen, "127.0.0.1:5001");
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "source: /var/log/jobs.jsonl\ningest:\n  check_interval: 5s"
        )
        .unwrap();
        file.flush().unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.source, std::path::PathBuf::from("/var/log/jobs.jsonl"));
        assert_eq!(config.ingest.check_interval, Duration::from_secs(5));
        // Unspecified sections fall back to defaults
        assert_eq!(config.ingest.stats_interval, Duration::from_secs(300));
        assert_eq!(config.notify.command, "notify-send");
    }

    #[test]
    fn test_invalid_listen_address_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "web:\n  listen: not-an-address").unwrap();
        file.flush().unwrap();

        let result = load_config(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ingest:\n  check_interval: 0s").unwrap();
        file.flush().unwrap();

        let result = load_config(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_derived_paths() {
        let config = Config {
            data_dir: std::path::PathBuf::from("/tmp/cw"),
            ..Config::default()
        };
        assert_eq!(config.db_path(), std::path::PathBuf::from("/tmp/cw/cronwatch.db"));
        assert_eq!(config.cursor_path(), std::path::PathBuf::from("/tmp/cw/cursor"));
    }
}
