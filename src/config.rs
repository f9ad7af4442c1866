use serde::Deserialize;
use anyhow::Result;
use std::path::Path;
use tokio::fs;

pub const CONFIG_ENV: &str = "TCP_CONNECT_CONFIG";
pub const LOG_LEVEL_ENV: &str = "TCP_CONNECT_LOG_LEVEL";

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Settings {
    /// Defaults, then the JSON file named by `TCP_CONNECT_CONFIG`, then the
    /// `TCP_CONNECT_LOG_LEVEL` override.
    pub async fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_ENV).ok();
        let level = std::env::var(LOG_LEVEL_ENV).ok();
        Self::from_sources(file.as_deref(), level).await
    }

    pub async fn from_sources(file: Option<&str>, log_level: Option<String>) -> Result<Self> {
        let mut settings = match file {
            Some(path) => Self::load_file(path).await?,
            None => Self::default(),
        };
        if let Some(level) = log_level {
            settings.log_level = level;
        }
        settings.validate_log_level()?;
        Ok(settings)
    }

    async fn load_file(file_path: &str) -> Result<Self> {
        if !Path::new(file_path).exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", file_path));
        }

        let content = fs::read_to_string(file_path).await?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels are: trace, debug, info, warn, error", self.log_level))
        }
    }

    pub fn validate_log_level(&self) -> Result<()> {
        self.get_tracing_level().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("tcp-connect-{}-{}.json", name, std::process::id()));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn defaults_without_sources() {
        let settings = Settings::from_sources(None, None).await.unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.get_tracing_level().unwrap(), tracing::Level::WARN);
        assert_eq!(settings.log_format, LogFormat::Text);
    }

    #[tokio::test]
    async fn file_then_env_override() {
        let path = temp_config("override", r#"{"log_level":"debug","log_format":"json"}"#);
        let file = path.to_str().unwrap();

        let from_file = Settings::from_sources(Some(file), None).await.unwrap();
        assert_eq!(from_file.get_tracing_level().unwrap(), tracing::Level::DEBUG);
        assert_eq!(from_file.log_format, LogFormat::Json);

        let overridden = Settings::from_sources(Some(file), Some("error".into())).await.unwrap();
        assert_eq!(overridden.get_tracing_level().unwrap(), tracing::Level::ERROR);
        assert_eq!(overridden.log_format, LogFormat::Json);

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn partial_file_keeps_defaults() {
        let path = temp_config("partial", r#"{"log_format":"json"}"#);
        let settings = Settings::from_sources(path.to_str(), None).await.unwrap();
        assert_eq!(settings.log_level, "warn");
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let err = Settings::from_sources(Some("/nonexistent/tcp-connect.json"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[tokio::test]
    async fn invalid_level_is_rejected() {
        assert!(Settings::from_sources(None, Some("loud".into())).await.is_err());
        assert!(Settings::from_sources(None, Some("Warning".into())).await.is_ok());
    }
}
