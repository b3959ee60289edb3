// Configuration module entry point
// Layered loading: defaults, optional TOML file, APP_* environment, PORT

mod types;

use std::net::SocketAddr;
use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};

pub use types::{
    Config, CorsConfig, DelayConfig, HttpConfig, LoggingConfig, PerformanceConfig, Profile,
    ServerConfig,
};

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let settings = with_defaults(config::Config::builder())?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Upper bound for a single request: I/O allowance plus the longest delay
    pub fn request_timeout(&self) -> Duration {
        let io = std::cmp::max(self.performance.read_timeout, self.performance.write_timeout);
        Duration::from_secs(io + self.delay.max_seconds())
    }
}

#[cfg(test)]
impl Config {
    /// Defaults overlaid with an inline TOML document
    pub fn from_toml(toml: &str) -> Self {
        with_defaults(config::Config::builder())
            .and_then(|b| {
                b.add_source(config::File::from_str(toml, config::FileFormat::Toml))
                    .build()
            })
            .and_then(|c| c.try_deserialize::<Self>())
            .expect("test configuration must be valid")
    }
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .set_default("logging.level", "info")?
        .set_default("logging.access_log", true)?
        .set_default("logging.access_log_format", "combined")?
        .set_default("performance.keep_alive_timeout", 75)?
        .set_default("performance.read_timeout", 10)?
        .set_default("performance.write_timeout", 10)?
        .set_default("performance.shutdown_timeout", 15)?
        .set_default("http.server_name", "delay-api/0.1")?
        .set_default("http.max_body_size", 1_048_576)? // 1MB
        .set_default("cors.allow_origin", "*")?
        .set_default("cors.allow_methods", "GET, POST, OPTIONS")?
        .set_default("cors.allow_headers", "Content-Type")?
        .set_default("cors.max_age", 86_400)?
        .set_default("delay.profile", "production")
}
