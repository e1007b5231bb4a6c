use lostfound_cache::{CacheConfig, IdempotencyConfig, RedisConfig};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Idempotency-Key handling for mutating requests
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.request_timeout_ms == 0 {
            return Err("server.request_timeout_ms must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Redis validation
        if let Some(url) = self.redis.url.as_deref()
            && !url.is_empty()
            && !(url.starts_with("redis://") || url.starts_with("rediss://"))
        {
            return Err("redis.url must start with redis:// or rediss://".into());
        }
        if self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        self.cache.validate()?;
        // Idempotency validation
        if self.idempotency.create_ttl_secs == 0 || self.idempotency.default_ttl_secs == 0 {
            return Err("idempotency TTLs must be > 0".into());
        }
        if !(1..=256).contains(&self.idempotency.max_key_length) {
            return Err("idempotency.max_key_length must be in 1..=256".into());
        }
        if self.idempotency.create_ttl_secs > self.cache.max_ttl_secs {
            tracing::debug!(
                create_ttl_secs = self.idempotency.create_ttl_secs,
                max_ttl_secs = self.cache.max_ttl_secs,
                "idempotency records for creates will be capped by cache.max_ttl_secs"
            );
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File, FileFormat};
    use std::path::PathBuf;

    /// Default file looked up in the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "lostfound.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., LOSTFOUND__CACHE__FAILURE_THRESHOLD=3
        builder = builder.add_source(
            Environment::with_prefix("LOSTFOUND")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        finish(builder)
    }

    /// Parse configuration from a TOML string, without environment overrides.
    pub fn load_config_from_str(toml: &str) -> Result<AppConfig, String> {
        let builder = Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<AppConfig, String> {
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::loader::load_config_from_str;
    use super::*;
    use lostfound_cache::CacheBackendKind;

    #[test]
    fn defaults_validate() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.cache.backend, CacheBackendKind::Redis);
        assert!(cfg.redis.url.is_none());
    }

    #[test]
    fn toml_sections_are_read() {
        let cfg = load_config_from_str(
            r#"
            [server]
            port = 9090

            [logging]
            level = "debug"

            [redis]
            url = "redis://cache.internal:6379"

            [cache]
            environment = "staging"
            failure_threshold = 3
            cooldown_secs = 10

            [idempotency]
            default_ttl_secs = 600
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.redis.url.as_deref(), Some("redis://cache.internal:6379"));
        assert_eq!(cfg.cache.environment, "staging");
        assert_eq!(cfg.cache.failure_threshold, 3);
        assert_eq!(cfg.cache.max_ttl_secs, 3600);
        assert_eq!(cfg.idempotency.default_ttl_secs, 600);
        assert_eq!(cfg.idempotency.create_ttl_secs, 86_400);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(load_config_from_str("[logging]\nlevel = \"loud\"").is_err());
        assert!(load_config_from_str("[cache]\nfailure_threshold = 0").is_err());
        assert!(load_config_from_str("[cache]\nenvironment = \"a:b\"").is_err());
        assert!(load_config_from_str("[redis]\nurl = \"http://x\"").is_err());
        assert!(
            load_config_from_str("[cache]\ndefault_ttl_secs = 7200\nmax_ttl_secs = 3600").is_err()
        );
    }
}
