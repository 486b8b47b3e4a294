//! Configuration for the bot process.

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use forge_store::backends::http::DEFAULT_BASE_URL;

/// Complete process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageSettings,
    pub gemini: GeminiSettings,
    #[serde(default)]
    pub http: HttpSettings,
}

/// Remote record store settings. The root key pair addresses the root index;
/// per-guild credentials live inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_store_base_url")]
    pub base_url: String,
    pub root_record_key: String,
    pub root_master_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiSettings {
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            port: default_http_port(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let root_record_key =
            std::env::var("FORGE_ROOT_RECORD_KEY").context("FORGE_ROOT_RECORD_KEY not set")?;
        let root_master_key =
            std::env::var("FORGE_MASTER_KEY").context("FORGE_MASTER_KEY not set")?;
        let api_key = std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY not set")?;

        let base_url =
            std::env::var("FORGE_STORE_BASE_URL").unwrap_or_else(|_| default_store_base_url());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| default_gemini_model());
        let port = std::env::var("FORGE_HTTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(default_http_port);

        Ok(Config {
            storage: StorageSettings {
                base_url,
                root_record_key,
                root_master_key,
            },
            gemini: GeminiSettings { api_key, model },
            http: HttpSettings { port },
        })
    }
}

fn default_store_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_http_port() -> u16 {
    8080
}
