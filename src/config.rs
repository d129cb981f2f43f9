use std::path::PathBuf;

use anyhow::Result;
use axum_extra::extract::cookie::Key;
use clap::{Args, ValueEnum};
use sha2::{Digest, Sha512};

use goalpost_core::Database;

pub const DEFAULT_SESSION_SECRET: &str = "mysecret";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
}

/// Server settings, read from flags or the environment.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Port for the HTTP server
    #[arg(short, long, env = "PORT", default_value = "3000", global = true)]
    pub port: u16,

    /// SQLite database file [default: platform data directory]
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database: Option<PathBuf>,

    /// Secret used to sign the session cookie
    #[arg(
        long,
        env = "SESSION_SECRET",
        default_value = DEFAULT_SESSION_SECRET,
        hide_env_values = true,
        global = true
    )]
    pub session_secret: String,

    /// Deployment environment; production marks cookies Secure
    #[arg(long, env = "APP_ENV", value_enum, default_value = "development", global = true)]
    pub environment: Environment,
}

impl Config {
    pub fn open_database(&self) -> Result<Database> {
        match &self.database {
            Some(path) => Database::open(path),
            None => Database::open_default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn cookie_key(&self) -> Key {
        if self.session_secret == DEFAULT_SESSION_SECRET {
            tracing::warn!("SESSION_SECRET is not set; using the built-in default");
        }
        cookie_key(&self.session_secret)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Derive the 64-byte cookie signing key from a secret of any length.
pub fn cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}
