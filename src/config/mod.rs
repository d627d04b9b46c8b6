use std::collections::HashMap;
use std::env;
use std::fmt;

use thiserror::Error;
use url::Url;

use crate::auth::lifetime_from_hours;

/// Errors raised while loading configuration at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    /// Only set for the Postgres backend.
    pub url: Option<Secret>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub ensure_schema: bool,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub jwt_secret: Secret,
    pub jwt_expiry_hours: u64,
    pub jwt_leeway_secs: u64,
    pub enforce_ownership: bool,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

/// String value that never shows up in Debug output or logs
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Security settings only; database variables are not consulted
    pub fn security_from_env() -> Result<SecurityConfig, ConfigError> {
        Self::from_lookup(|key| match key {
            "PRODUCT_STORE" => Some("memory".to_string()),
            _ => env::var(key).ok(),
        })
        .map(|config| config.security)
    }

    /// Build config from an explicit key/value map instead of the process environment
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .map(Secret::new)
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        // Set defaults based on environment, then override with specific env vars
        let mut config = Self::preset(environment, jwt_secret);
        config.apply_overrides(&lookup)?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PRODUCT_API_PORT").or_else(|| lookup("PORT")) {
            self.server.port = parse_value("PRODUCT_API_PORT", &v)?;
        }

        // Database
        if let Some(v) = lookup("PRODUCT_STORE") {
            self.database.backend = match v.to_ascii_lowercase().as_str() {
                "postgres" | "postgresql" => StorageBackend::Postgres,
                "memory" => StorageBackend::Memory,
                _ => return Err(ConfigError::Invalid { key: "PRODUCT_STORE", value: v }),
            };
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_value("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = parse_value("DATABASE_CONNECTION_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("DATABASE_ENSURE_SCHEMA") {
            self.database.ensure_schema = parse_value("DATABASE_ENSURE_SCHEMA", &v)?;
        }
        if self.database.backend == StorageBackend::Postgres {
            self.database.url = Some(database_url(lookup)?);
        }

        // API
        if let Some(v) = lookup("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = parse_value("API_ENABLE_REQUEST_LOGGING", &v)?;
        }
        if let Some(v) = lookup("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = parse_value("API_MAX_REQUEST_SIZE_BYTES", &v)?;
        }

        // Security
        if let Some(v) = lookup("SECURITY_JWT_EXPIRY_HOURS") {
            let hours: u64 = parse_value("SECURITY_JWT_EXPIRY_HOURS", &v)?;
            lifetime_from_hours(hours).map_err(|_| ConfigError::Invalid {
                key: "SECURITY_JWT_EXPIRY_HOURS",
                value: v.clone(),
            })?;
            self.security.jwt_expiry_hours = hours;
        }
        if let Some(v) = lookup("SECURITY_JWT_LEEWAY_SECS") {
            self.security.jwt_leeway_secs = parse_value("SECURITY_JWT_LEEWAY_SECS", &v)?;
        }
        if let Some(v) = lookup("SECURITY_ENFORCE_OWNERSHIP") {
            self.security.enforce_ownership = parse_value("SECURITY_ENFORCE_OWNERSHIP", &v)?;
        }
        if let Some(v) = lookup("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = parse_value("SECURITY_ENABLE_CORS", &v)?;
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(())
    }

    fn preset(environment: Environment, jwt_secret: Secret) -> Self {
        match environment {
            Environment::Development => Self {
                environment,
                server: ServerConfig::default(),
                database: DatabaseConfig {
                    backend: StorageBackend::Postgres,
                    url: None,
                    max_connections: 10,
                    connection_timeout: 30,
                    ensure_schema: true,
                },
                api: ApiConfig {
                    enable_request_logging: true,
                    max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                },
                security: SecurityConfig {
                    jwt_secret,
                    jwt_expiry_hours: 24 * 7, // 1 week
                    jwt_leeway_secs: 0,
                    enforce_ownership: false,
                    enable_cors: true,
                    cors_origins: vec!["*".to_string()],
                },
            },
            Environment::Staging => Self {
                environment,
                server: ServerConfig::default(),
                database: DatabaseConfig {
                    backend: StorageBackend::Postgres,
                    url: None,
                    max_connections: 20,
                    connection_timeout: 10,
                    ensure_schema: false,
                },
                api: ApiConfig {
                    enable_request_logging: true,
                    max_request_size_bytes: 5 * 1024 * 1024, // 5MB
                },
                security: SecurityConfig {
                    jwt_secret,
                    jwt_expiry_hours: 24,
                    jwt_leeway_secs: 0,
                    enforce_ownership: false,
                    enable_cors: true,
                    cors_origins: vec!["https://staging.example.com".to_string()],
                },
            },
            Environment::Production => Self {
                environment,
                server: ServerConfig::default(),
                database: DatabaseConfig {
                    backend: StorageBackend::Postgres,
                    url: None,
                    max_connections: 50,
                    connection_timeout: 5,
                    ensure_schema: false,
                },
                api: ApiConfig {
                    enable_request_logging: false,
                    max_request_size_bytes: 2 * 1024 * 1024, // 2MB
                },
                security: SecurityConfig {
                    jwt_secret,
                    jwt_expiry_hours: 4,
                    jwt_leeway_secs: 0,
                    enforce_ownership: false,
                    enable_cors: true,
                    cors_origins: vec!["https://app.example.com".to_string()],
                },
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl DatabaseConfig {
    /// Connection URL with the password stripped, safe for logs
    pub fn redacted_url(&self) -> Option<String> {
        let url = self.url.as_ref()?;
        let mut parsed = Url::parse(url.expose()).ok()?;
        if parsed.password().is_some() {
            let _ = parsed.set_password(Some("***"));
        }
        Some(parsed.to_string())
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

/// DATABASE_URL wins; otherwise assemble one from DB_HOST/DB_USER/DB_PASSWORD/DB_NAME
fn database_url<F>(lookup: &F) -> Result<Secret, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("DATABASE_URL").filter(|s| !s.is_empty()) {
        Url::parse(&raw).map_err(|_| ConfigError::InvalidDatabaseUrl)?;
        return Ok(Secret::new(raw));
    }

    let host = lookup("DB_HOST").ok_or(ConfigError::Missing("DATABASE_URL"))?;
    let user = lookup("DB_USER").ok_or(ConfigError::Missing("DB_USER"))?;
    let name = lookup("DB_NAME").ok_or(ConfigError::Missing("DB_NAME"))?;
    let port: u16 = match lookup("DB_PORT") {
        Some(v) => parse_value("DB_PORT", &v)?,
        None => 5432,
    };

    let mut url = Url::parse(&format!("postgres://{}:{}", host, port))
        .map_err(|_| ConfigError::InvalidDatabaseUrl)?;
    url.set_username(&user).map_err(|_| ConfigError::InvalidDatabaseUrl)?;
    if let Some(password) = lookup("DB_PASSWORD") {
        url.set_password(Some(&password))
            .map_err(|_| ConfigError::InvalidDatabaseUrl)?;
    }
    url.set_path(&format!("/{}", name));

    Ok(Secret::new(String::from(url)))
}
