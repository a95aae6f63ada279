use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub explorer: ExplorerApiConfig,
    pub analysis: AnalysisConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
}

/// Block explorer (Etherscan-compatible) API settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExplorerApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub page_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
    pub eth_price_usd: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_hops: u8,
    /// Pause between successive hop-2 fetches. The block explorer rate-limits per key.
    pub hop_delay_ms: u64,
    pub recent_tx_limit: usize,
    pub hop_tx_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub tags_csv: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

impl Default for ExplorerApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.etherscan.io/api".into(),
            api_key: None,
            page_size: 1000,
            max_retries: 3,
            retry_delay_ms: 1000,
            timeout_secs: 10,
            eth_price_usd: 2426.89,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_hops: 2,
            hop_delay_ms: 200,
            recent_tx_limit: 100,
            hop_tx_limit: 50,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/ethrisk.db".into(),
            tags_csv: Some("data/addresses.csv".into()),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 3600,
        }
    }
}

impl AnalysisConfig {
    pub fn hop_delay(&self) -> Duration {
        Duration::from_millis(self.hop_delay_ms)
    }
}

impl CacheConfig {
    /// Cache lifetime as a `chrono` duration. Values too large to represent fall back to the default.
    pub fn ttl(&self) -> chrono::Duration {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| {
                let fallback = Self::default().ttl_seconds;
                tracing::warn!(
                    "cache.ttl_seconds = {} is out of range, using {fallback}s",
                    self.ttl_seconds
                );
                chrono::Duration::seconds(fallback as i64)
            })
    }
}

impl Config {
    /// Load config from a TOML file. Falls back to defaults if file doesn't exist.
    ///
    /// `ETHERSCAN_API_KEY` in the environment takes precedence over the file.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let mut config = Self::load_file(path.as_ref());
        if let Ok(key) = std::env::var("ETHERSCAN_API_KEY") {
            if !key.is_empty() {
                config.explorer.api_key = Some(key);
            }
        }
        if config.explorer.api_key.is_none() {
            tracing::warn!("ETHERSCAN_API_KEY not set, block explorer calls may be throttled or rejected");
        }
        config
    }

    fn load_file(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse {}: {e}, using defaults", path.display());
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}
