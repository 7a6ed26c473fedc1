//! Configuration types for the traffic gate.

use serde::{Deserialize, Serialize};

/// Main configuration for the traffic gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Redirect destinations and the qualifying marker
    pub routing: RoutingConfig,

    /// Bot classifier settings
    pub classifier: ClassifierConfig,

    /// Verdict cache settings
    pub cache: CacheConfig,

    /// Request validation limits
    pub limits: LimitsConfig,

    /// Client gate settings
    pub client: ClientConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            routing: RoutingConfig::default(),
            classifier: ClassifierConfig::default(),
            cache: CacheConfig::default(),
            limits: LimitsConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl GateConfig {
    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.routing.qualifying_marker.is_empty(),
            "routing.qualifying_marker must not be empty"
        );
        anyhow::ensure!(
            self.routing.offer_url.starts_with("http"),
            "routing.offer_url must be an absolute http(s) URL, got {:?}",
            self.routing.offer_url
        );
        self.client.validate()
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub listen: String,

    /// Take the client IP from the first `X-Forwarded-For` hop
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
            trust_forwarded_for: true,
        }
    }
}

/// Redirect destinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// External destination for qualified visitors
    pub offer_url: String,

    /// Substring of the requested URL that qualifies a visitor
    pub qualifying_marker: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            offer_url: "https://binance.com".to_string(),
            qualifying_marker: "fbcli".to_string(),
        }
    }
}

/// Bot classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Extra crawler tokens checked alongside the built-in list
    pub extra_bot_patterns: Vec<String>,

    /// Extra indicator tokens checked alongside the built-in list
    pub extra_indicators: Vec<String>,

    /// User-Agents shorter than this are treated as bots
    pub min_user_agent_length: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            extra_bot_patterns: vec![],
            extra_indicators: vec![],
            min_user_agent_length: 20,
        }
    }
}

/// Verdict cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached User-Agent verdicts
    pub verdict_cache_size: u64,

    /// Verdict cache TTL in seconds
    pub verdict_cache_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            verdict_cache_size: 10_000,
            verdict_cache_ttl_seconds: 3600,
        }
    }
}

/// Request validation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Longest accepted `url` query value, in bytes
    pub max_url_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_url_length: 8192,
        }
    }
}

/// Client gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upper bound on a single visitor check, in milliseconds
    pub check_timeout_ms: u64,

    /// Durable storage key holding the blacklist flag
    pub storage_key: String,
}

impl ClientConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.check_timeout_ms > 0,
            "client.check_timeout_ms must be greater than zero"
        );
        anyhow::ensure!(!self.storage_key.is_empty(), "client.storage_key must not be empty");
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            check_timeout_ms: 5000,
            storage_key: "visitor_status".to_string(),
        }
    }
}
