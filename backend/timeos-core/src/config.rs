// src/config.rs
use serde::Deserialize;

use crate::luma_client::{
    LumaConfig, DEFAULT_LUMA_API_KEY, DEFAULT_LUMA_API_URL, DEFAULT_REQUEST_TIMEOUT_SECS,
};

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3000
}

fn default_luma_api_url() -> String {
    DEFAULT_LUMA_API_URL.to_string()
}

fn default_luma_api_key() -> String {
    DEFAULT_LUMA_API_KEY.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Server
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    // Luma document store
    #[serde(default = "default_luma_api_url")]
    pub luma_api_url: String,
    #[serde(default = "default_luma_api_key")]
    pub luma_api_key: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    // TLS, only used when both are set
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        envy::from_env::<Config>()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn luma_config(&self) -> LumaConfig {
        LumaConfig {
            base_url: self.luma_api_url.clone(),
            api_key: self.luma_api_key.clone(),
            request_timeout_secs: self.request_timeout_secs,
        }
    }

    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (self.cert_path.as_deref(), self.key_path.as_deref()) {
            (Some(cert), Some(key)) if !cert.is_empty() && !key.is_empty() => Some((cert, key)),
            _ => None,
        }
    }
}
