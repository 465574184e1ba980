//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `BARISTA_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `BARISTA_` override YAML values
//! 3. **Legacy variables** - `DATABASE_URL`, `JWT_SECRET`, `ROOT_USERNAME`, `ROOT_PASSWORD` and
//!    `ENABLE_REGISTER` are accepted unprefixed for existing deployments
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `BARISTA_AUTH__SESSION__COOKIE_SECURE=true` sets `auth.session.cookie_secure`.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use barista::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}", config.bind_address());
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! BARISTA_PORT=8080
//! DATABASE_URL="sqlite:///var/lib/barista/barista.db?mode=rwc"
//! JWT_SECRET="change-me"
//! ENABLE_REGISTER=1
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::time::Duration;

use crate::errors::Error;

/// Shortest session token lifetime accepted by validation
const MIN_JWT_EXPIRY: Duration = Duration::from_secs(5 * 60);
/// Longest session token lifetime accepted by validation
const MAX_JWT_EXPIRY: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "BARISTA_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults, so an empty file (or no file at all) plus a `secret_key` is a
/// runnable configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    pub database: DatabaseConfig,
    /// Name of the admin account created when the users table is empty
    pub admin_name: String,
    /// Password for the bootstrap admin account
    pub admin_password: Option<String>,
    /// Secret key for session token signing (required)
    pub secret_key: Option<String>,
    pub auth: AuthConfig,
    /// Export traces over OTLP in addition to stdout logging
    pub enable_otel_export: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// sqlx connection string, e.g. `sqlite://barista.db?mode=rwc`
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://barista.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

/// A boolean that also accepts `1`/`0`, `t`/`f` and `yes`/`no`, as set by older deployments.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u64),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(n) => Err(de::Error::custom(format!("expected a boolean, found {n}"))),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "t" | "true" | "yes" | "on" => Ok(true),
            "0" | "f" | "false" | "no" | "off" => Ok(false),
            other => Err(de::Error::custom(format!("expected a boolean, found {other:?}"))),
        },
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Allow new users to self-register
    #[serde(deserialize_with = "flag")]
    pub allow_registration: bool,
    /// Password validation and hashing parameters
    pub password: PasswordConfig,
    /// Session cookie configuration
    pub session: SessionConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub max_length: usize,
    /// Argon2 memory cost in KiB
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 1,
            max_length: 128,
            // Argon2id RFC 9106 second recommended option
            argon2_memory_kib: 19456,
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Cookie lifetime (`Max-Age`)
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
    /// One of `strict`, `lax` or `none`
    pub cookie_same_site: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 24 * 60 * 60),
            cookie_name: "bs".to_string(),
            cookie_secure: false,
            cookie_same_site: "lax".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// Lifetime of issued session tokens (`exp - iat`)
    #[serde(with = "humantime_serde")]
    pub jwt_expiry: Duration,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_expiry: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8087,
            database: DatabaseConfig::default(),
            admin_name: "admin".to_string(),
            admin_password: Some("admin".to_string()),
            secret_key: None,
            auth: AuthConfig::default(),
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;

        if config.admin_password.as_deref() == Some("admin") {
            tracing::warn!("Bootstrap admin password is the default; set ROOT_PASSWORD or admin_password");
        }

        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.secret_key.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Internal {
                operation: "Config validation: secret_key is not configured. \
                     Set JWT_SECRET, BARISTA_SECRET_KEY or add secret_key to the config file."
                    .to_string(),
            });
        }

        let password = &self.auth.password;
        if password.min_length > password.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid password configuration: min_length ({}) cannot be greater than max_length ({})",
                    password.min_length, password.max_length
                ),
            });
        }

        if password.min_length < 1 {
            return Err(Error::Internal {
                operation: "Config validation: Invalid password configuration: min_length must be at least 1".to_string(),
            });
        }

        if self.auth.security.jwt_expiry < MIN_JWT_EXPIRY {
            return Err(Error::Internal {
                operation: "Config validation: JWT expiry duration is too short (minimum 5 minutes)".to_string(),
            });
        }

        if self.auth.security.jwt_expiry > MAX_JWT_EXPIRY {
            return Err(Error::Internal {
                operation: "Config validation: JWT expiry duration is too long (maximum 90 days)".to_string(),
            });
        }

        if !matches!(
            self.auth.session.cookie_same_site.to_ascii_lowercase().as_str(),
            "strict" | "lax" | "none"
        ) {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: cookie_same_site must be one of strict, lax or none (got {})",
                    self.auth.session.cookie_same_site
                ),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // BARISTA_CONFIG names the file itself and is read by `Args`
            .merge(Env::prefixed("BARISTA_").ignore(&["CONFIG"]).split("__"))
            // Unprefixed variables from earlier releases
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()))
            .merge(Env::raw().only(&["JWT_SECRET"]).map(|_| "secret_key".into()))
            .merge(Env::raw().only(&["ROOT_USERNAME"]).map(|_| "admin_name".into()))
            .merge(Env::raw().only(&["ROOT_PASSWORD"]).map(|_| "admin_password".into()))
            .merge(
                Env::raw()
                    .only(&["ENABLE_REGISTER"])
                    .map(|_| "auth.allow_registration".into()),
            )
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
