use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokensmith_auth::TokenConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Token lifecycle configuration
    #[serde(default)]
    pub tokens: TokenConfig,
    /// Users seeded into the in-memory directory at startup
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        for user in &self.users {
            if user.username.is_empty() || user.password.is_empty() {
                return Err("users entries need a non-empty username and password".into());
            }
        }
        self.tokens
            .validate()
            .map_err(|e| format!("tokens config error: {e}"))?;
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
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
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

/// A user account created at startup. The password is hashed before storage.
#[derive(Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl std::fmt::Debug for SeedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedUser")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "tokensmith.toml";

    /// Bare environment variables recognized on top of `TOKENSMITH__*`.
    const BARE_OVERRIDES: [(&str, &str); 8] = [
        ("SECRET_KEY", "tokens.secret_key"),
        ("TOKEN_EXPIRY", "tokens.expiry"),
        ("TOKEN_LEEWAY", "tokens.leeway"),
        ("ENABLE_AUTHORIZE", "tokens.enable_authorize"),
        ("ENABLE_REFRESH", "tokens.enable_refresh"),
        ("AUTHORIZE_ENDPOINT", "tokens.authorize_endpoint"),
        ("REFRESH_ENDPOINT", "tokens.refresh_endpoint"),
        ("URL_PREFIX", "tokens.url_prefix"),
    ];

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., TOKENSMITH__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("TOKENSMITH")
                .try_parsing(true)
                .separator("__"),
        );
        builder = apply_bare_overrides(builder)?;
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    fn apply_bare_overrides(
        mut builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, String> {
        for (var, key) in BARE_OVERRIDES {
            let value = std::env::var(var).ok();
            if value.is_some() {
                tracing::debug!(var, key, "Applying environment override");
            }
            builder = builder
                .set_override_option(key, value)
                .map_err(|e| format!("config override error for {var}: {e}"))?;
        }
        Ok(builder)
    }
}
