//! Configuration for the carpool backend.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite path, optionally prefixed with `sqlite:`. `:memory:` is accepted.
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Access token settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify tokens.
    pub jwt_secret: String,
    /// Token lifetime in seconds (default: 3600).
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

/// Registration rules.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// Suffixes an institutional identifier must end with.
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,
    /// Accounts registered with one of these emails start out as approved admins.
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            allowed_domains: default_allowed_domains(),
            admin_emails: vec![],
        }
    }
}

impl RegistrationConfig {
    pub fn is_allowed_institution_id(&self, institution_id: &str) -> bool {
        self.allowed_domains
            .iter()
            .any(|domain| institution_id.ends_with(domain.as_str()))
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated allowed origins, or `*`.
    #[serde(default = "default_cors_origins")]
    pub origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_database_url() -> String {
    "sqlite:./data/carpool.db".to_string()
}
fn default_token_ttl() -> u64 {
    3600
}
fn default_allowed_domains() -> Vec<String> {
    vec!["@sp.senac.br".to_string(), "@senacsp.edu.br".to_string()]
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_cors_origins() -> String {
    "*".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (CARPOOL__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("auth.token_ttl_secs", default_token_ttl() as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("CARPOOL")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("registration.allowed_domains")
                    .with_list_parse_key("registration.admin_emails")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
