use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use crate::error::{AppError, Result};

pub const API_KEY_VAR: &str = "FIRECRAWL_API_KEY";
const DEFAULT_SCRAPE_DIR: &str = "scraped_content";
const DEFAULT_FIRECRAWL_URL: &str = "https://api.firecrawl.dev";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

impl FromStr for Transport {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            other => Err(AppError::ConfigError(format!(
                "Unknown MCP_TRANSPORT '{}', expected 'stdio' or 'http'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub scrape_dir: PathBuf,
    pub firecrawl_url: String,
    pub transport: Transport,
    pub server_addr: SocketAddr,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let scrape_dir = lookup("SCRAPE_DIR").unwrap_or_else(|| DEFAULT_SCRAPE_DIR.to_string());
        let firecrawl_url = lookup("FIRECRAWL_API_URL")
            .unwrap_or_else(|| DEFAULT_FIRECRAWL_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let transport = match lookup("MCP_TRANSPORT") {
            Some(value) => value.parse()?,
            None => Transport::Stdio,
        };

        // Server configuration with defaults, only used by the http transport
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
        let port = port
            .parse::<u16>()
            .map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host)
            .map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        Ok(Config {
            scrape_dir: PathBuf::from(scrape_dir),
            firecrawl_url,
            transport,
            server_addr: SocketAddr::new(ip, port),
        })
    }
}

/// Picks the explicit key when given, otherwise falls back to the environment.
pub fn resolve_api_key(
    explicit: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    explicit
        .map(str::to_string)
        .filter(|key| !key.trim().is_empty())
        .or_else(|| lookup(API_KEY_VAR).filter(|key| !key.trim().is_empty()))
        .ok_or(AppError::MissingCredential)
}
