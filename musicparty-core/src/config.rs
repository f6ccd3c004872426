use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub resolve: ResolveConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Bounds on catalog resolution calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    pub timeout_seconds: u64,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self { timeout_seconds: 15 }
    }
}

/// Enabled catalog adapters. A section present means the adapter is
/// constructed at startup; absent means disabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub netease: Option<GatewayProviderConfig>,
    pub qqmusic: Option<GatewayProviderConfig>,
    pub bilibili: Option<BilibiliProviderConfig>,
}

/// A provider reached through a self-hosted API gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub cookie: String,
}

/// Bilibili talks to the public API directly; only the cookie is needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BilibiliProviderConfig {
    pub cookie: String,
}

impl Config {
    /// Load configuration from an optional file plus `MUSICPARTY_*`
    /// environment overrides (e.g. `MUSICPARTY_SERVER__HTTP_PORT=9000`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(Path::new(path)));
        } else if Path::new("musicparty.toml").exists() {
            builder = builder.add_source(File::from(Path::new("musicparty.toml")));
        }

        builder
            .add_source(Environment::with_prefix("MUSICPARTY").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Fail fast on configurations that cannot possibly work.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.resolve.timeout_seconds == 0 {
            errors.push("resolve.timeout_seconds must be non-zero".to_string());
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got {:?}",
                self.logging.format
            ));
        }

        let gateways = [
            ("providers.netease", &self.providers.netease),
            ("providers.qqmusic", &self.providers.qqmusic),
        ];
        for (key, section) in gateways {
            if let Some(cfg) = section {
                if url::Url::parse(&cfg.base_url).is_err() {
                    errors.push(format!("{key}.base_url is not a valid URL: {:?}", cfg.base_url));
                }
            }
        }

        if self.providers.netease.is_none()
            && self.providers.qqmusic.is_none()
            && self.providers.bilibili.is_none()
        {
            errors.push("no providers configured, nothing to play from".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_provider() -> Config {
        Config {
            providers: ProvidersConfig {
                qqmusic: Some(GatewayProviderConfig {
                    base_url: "http://localhost:3200".to_string(),
                    cookie: String::new(),
                }),
                ..ProvidersConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config_has_no_providers() {
        let config = Config::default();
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("no providers")));
    }

    #[test]
    fn test_valid_config_passes() {
        config_with_provider().validate().expect("valid config");
    }

    #[test]
    fn test_bad_base_url_is_rejected() {
        let mut config = config_with_provider();
        config
            .providers
            .qqmusic
            .as_mut()
            .expect("qqmusic section")
            .base_url = "not a url".to_string();
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("base_url")));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = config_with_provider();
        config.resolve.timeout_seconds = 0;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("timeout_seconds")));
    }
}
