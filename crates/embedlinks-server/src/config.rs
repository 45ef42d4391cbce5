use std::env;
use std::path::PathBuf;

use anyhow::Context;
use embedlinks_core::url::EMBED_BASE_URL;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // TMDB settings
    pub tmdb_api_key: String,

    // Static UI
    pub static_dir: PathBuf,

    // Browser settings
    pub chrome_path: Option<PathBuf>,
    pub embed_base_url: String,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or unparsable values
    /// fall back to their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let tmdb_api_key = lookup("TMDB_API_KEY")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("TMDB_API_KEY must be set")?;

        Ok(Self {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: lookup("SERVER_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),

            tmdb_api_key,

            static_dir: lookup("STATIC_DIR")
                .unwrap_or_else(|| "public".to_string())
                .into(),

            chrome_path: lookup("CHROME_PATH").map(PathBuf::from),
            embed_base_url: lookup("EMBED_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| EMBED_BASE_URL.to_string()),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
