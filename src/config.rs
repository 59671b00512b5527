use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// File backing the local key-value store.
    pub state_file: PathBuf,
    pub meme_api_url: String,
    pub memegen_api_url: String,
    pub image_host_url: String,
    pub imgbb_api_key: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();

        let bind_address_str = env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
        let bind_address = SocketAddr::from_str(&bind_address_str)
            .map_err(|e| ConfigError::InvalidVar("BIND_ADDRESS".into(), e.to_string()))?;

        let state_file = env::var("STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("meme_state.json"));

        let meme_api_url = env::var("MEME_API_URL")
            .unwrap_or_else(|_| "https://api.imgflip.com/get_memes".to_string());
        let memegen_api_url = env::var("MEMEGEN_API_URL")
            .unwrap_or_else(|_| "https://api.memegen.link".to_string());
        let image_host_url = env::var("IMAGE_HOST_URL")
            .unwrap_or_else(|_| "https://api.imgbb.com/1/upload".to_string());

        // Uploads report a failure reason when no key is set
        let imgbb_api_key = env::var("IMGBB_API_KEY").ok().filter(|key| !key.trim().is_empty());

        Ok(Config {
            bind_address,
            state_file,
            meme_api_url,
            memegen_api_url: memegen_api_url.trim_end_matches('/').to_string(),
            image_host_url,
            imgbb_api_key,
        })
    }
}
