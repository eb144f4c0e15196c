pub mod api;
pub mod config;
pub mod error;
pub mod firecrawl;
pub mod lookup;
pub mod scraper;
pub mod store;

use std::env;
use std::sync::Arc;
use config::Config;
use store::MetadataStore;
use tokio::sync::Mutex;

pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// State shared by every tool call. The store sits behind a mutex so that
/// concurrent calls against the same metadata file run one at a time.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Mutex<MetadataStore>>,
    pub env: EnvLookup,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_env(config, Arc::new(|key: &str| env::var(key).ok()))
    }

    /// Uses `env` instead of the process environment for credential lookup.
    pub fn with_env(config: Config, env: EnvLookup) -> Self {
        let store = MetadataStore::new(config.scrape_dir.clone());
        Self {
            config: Arc::new(config),
            store: Arc::new(Mutex::new(store)),
            env,
        }
    }
}
