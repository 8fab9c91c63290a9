use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;

use super::error::ConfigError;
use super::types::ClientConfig;

const ENV_API_KEY: &str = "MOONSHOT_API_KEY";
const ENV_BASE_URL: &str = "MOONSHOT_BASE_URL";
const ENV_MODEL: &str = "MOONSHOT_MODEL";

/// `~/.config/kimi-chat/config.toml`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::MissingHome)?;
    Ok(home.join(".config").join("kimi-chat").join("config.toml"))
}

impl ClientConfig {
    /// Parses a TOML document. Absent keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads a TOML file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Loads the config file (default location unless overridden), then
    /// applies environment overrides.
    pub fn load(path_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = match path_override {
            Some(path) => path,
            None => default_config_path()?,
        };
        let mut config = Self::from_file(&path)?;
        config.apply_env();
        Ok(config)
    }

    /// Overrides file values with `MOONSHOT_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    pub(crate) fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.is_empty()) {
            self.api_key = Some(SecretString::new(key));
        }
        if let Some(url) = lookup(ENV_BASE_URL).filter(|u| !u.is_empty()) {
            self.base_url = url;
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|m| !m.is_empty()) {
            self.model = model;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;
    use crate::config::types::{DEFAULT_BASE_URL, DEFAULT_MODEL};

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = ClientConfig::from_toml_str(
            r#"
            model = "moonshot-v1-32k"
            [retry]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.model, "moonshot-v1-32k");
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.retry.max_retries, 5);
        assert_eq!(cfg.retry.initial_delay_ms, 500);
        assert!(cfg.continuation.enabled);
        assert_eq!(cfg.continuation.max_rounds, 5);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ClientConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn file_values_are_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_key = \"sk-file\"\ntemperature = 0.3").unwrap();
        let cfg = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.api_key.unwrap().expose_secret(), "sk-file");
        assert_eq!(cfg.temperature, Some(0.3));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = ClientConfig::from_toml_str("model = [").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            (ENV_API_KEY, "sk-env"),
            (ENV_MODEL, "kimi-latest"),
            (ENV_BASE_URL, ""),
        ]
        .into_iter()
        .collect();
        let mut cfg = ClientConfig::from_toml_str("api_key = \"sk-file\"").unwrap();
        cfg.apply_overrides(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(cfg.api_key.as_ref().unwrap().expose_secret(), "sk-env");
        assert_eq!(cfg.model, "kimi-latest");
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = ClientConfig::default();
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingApiKey)));

        cfg.api_key = Some(SecretString::new("sk".into()));
        assert!(cfg.validate().is_ok());

        cfg.continuation.max_rounds = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "continuation.max_rounds", .. })
        ));

        cfg.continuation.max_rounds = 5;
        cfg.retry.initial_delay_ms = 10_000;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "retry.initial_delay_ms", .. })
        ));
    }
}
