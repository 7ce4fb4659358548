//! Configuration for the record services

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// MongoDB connection string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Database name; defaults to the one in the connection string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Default config path
    pub fn default_path() -> Result<PathBuf> {
        // Check environment variable first
        if let Ok(env_path) = std::env::var("SERVICE_RECORDS_CONFIG") {
            return Ok(PathBuf::from(env_path));
        }

        let local = PathBuf::from("config.toml");
        if local.exists() {
            return Ok(local);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("service-records");

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from default path
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let with_comments = format!(
            "# service-records configuration\n\n\
             {}\n\n\
             # [database]\n\
             # uri = \"mongodb://localhost:27017/service\"\n\
             # PORT, MONGODB_URI (tasks) and MONGO_URI (inventory) override this file.\n",
            content
        );

        std::fs::write(path, with_comments).context("Failed to write config file")?;

        Ok(())
    }

    /// Apply `PORT` and the service's connection-string variable from the process environment
    pub fn apply_env(&mut self, uri_var: &str) -> Result<()> {
        self.apply_env_with(uri_var, |key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_with<F>(&mut self, uri_var: &str, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|p| !p.is_empty()) {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {port}"))?;
        }

        if let Some(uri) = lookup(uri_var).filter(|u| !u.is_empty()) {
            self.database.uri = Some(uri);
        }

        Ok(())
    }

    /// The connection string, required to start a service
    pub fn database_uri(&self, uri_var: &str) -> Result<&str> {
        self.database.uri.as_deref().with_context(|| {
            format!("No MongoDB connection string configured; set {uri_var} or [database].uri")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.server.port, 5000);
        assert!(cfg.database.uri.is_none());
        assert!(cfg.database_uri("MONGODB_URI").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_env_with(
            "MONGO_URI",
            env(&[
                ("PORT", "8080"),
                ("MONGO_URI", "mongodb://db:27017/stock"),
                ("MONGODB_URI", "mongodb://other:27017"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.database_uri("MONGO_URI").unwrap(), "mongodb://db:27017/stock");
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut cfg = Config::default();
        let result = cfg.apply_env_with("MONGODB_URI", env(&[("PORT", "http")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg: Config = toml::from_str("[database]\nuri = \"mongodb://localhost\"\n").unwrap();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.database.uri.as_deref(), Some("mongodb://localhost"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.server.port = 7000;
        cfg.database.name = Some("service".into());
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.server.port, 7000);
        assert_eq!(loaded.database.name.as_deref(), Some("service"));
        assert!(loaded.database.uri.is_none());
    }
}
