use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3001,
            },
            database: DatabaseConfig {
                path: "./data/classtrack.db".to_string(),
            },
            auth: AuthConfig {
                // Insecure fallback; override via config file or CLASSTRACK_JWT_SECRET
                jwt_secret: "classroom-tracker-secret-key-2024".to_string(),
                token_expiry_hours: 24,
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        // Try to load from environment variable
        if let Ok(path) = std::env::var("CLASSTRACK_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        // Try to load from default locations
        let default_paths = vec![
            PathBuf::from("classtrack-server.toml"),
            PathBuf::from("config/classtrack-server.toml"),
            PathBuf::from("/etc/classtrack/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        // Return default config if no file found
        tracing::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Environment variables win over whatever the config file said.
    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("CLASSTRACK_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(path) = std::env::var("CLASSTRACK_DB_PATH") {
            self.database.path = path;
        }
        if let Ok(secret) = std::env::var("CLASSTRACK_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
    }
}
