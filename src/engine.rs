//! Redirect decision engine.
//!
//! Combines the bot verdict, blacklist state (server-side and client-asserted)
//! and presence of the qualifying marker into one redirect target, burning
//! the IP of any direct, unqualified visitor along the way.

use crate::cache::VerdictCache;
use crate::config::GateConfig;
use crate::detectors::UserAgentClassifier;
use crate::store::{NewVisitorLog, StoreError, VisitorStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Neutral destination for bots and blacklisted visitors.
pub const BLOG_PATH: &str = "/blog";

/// Destination for unqualified first-time visitors.
pub const NOT_FOUND_PATH: &str = "/404";

/// One visitor check as seen by the engine.
#[derive(Debug, Clone, Default)]
pub struct VisitorRequest {
    /// Client IP (first forwarded hop or socket address)
    pub ip_address: String,
    /// User-Agent header, empty when missing
    pub user_agent: String,
    /// Full URL the visitor requested
    pub url: String,
    /// Client claims its local blacklist flag is set
    pub client_blacklisted: bool,
    /// Raw query pairs of the check request, recorded in the visit log
    pub query: BTreeMap<String, String>,
}

/// Verdict returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorVerdict {
    pub is_bot: bool,
    pub is_blacklisted: bool,
    pub has_parameter: bool,
    pub redirect_to: String,
}

impl VisitorVerdict {
    /// Whether the target leaves the site.
    pub fn is_external(&self) -> bool {
        self.redirect_to.starts_with("http")
    }
}

/// Redirect decision engine.
pub struct RedirectEngine {
    /// Blacklist and visit log
    store: Arc<dyn VisitorStore>,
    /// Cached classifier
    verdicts: VerdictCache,
    /// External destination for qualified visitors
    offer_url: String,
    /// Substring that qualifies a requested URL
    qualifying_marker: String,
}

impl RedirectEngine {
    /// Create a new engine over `store`.
    pub fn new(config: &GateConfig, store: Arc<dyn VisitorStore>) -> anyhow::Result<Self> {
        let classifier = UserAgentClassifier::new(&config.classifier)?;
        let (patterns, indicators) = classifier.token_counts();
        debug!(patterns, indicators, "Compiled User-Agent classifier");

        let verdicts = VerdictCache::new(
            Arc::new(classifier),
            config.cache.verdict_cache_size,
            Duration::from_secs(config.cache.verdict_cache_ttl_seconds),
        );

        Ok(Self {
            store,
            verdicts,
            offer_url: config.routing.offer_url.clone(),
            qualifying_marker: config.routing.qualifying_marker.clone(),
        })
    }

    /// Create with default configuration.
    pub fn with_defaults(store: Arc<dyn VisitorStore>) -> anyhow::Result<Self> {
        Self::new(&GateConfig::default(), store)
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn VisitorStore> {
        &self.store
    }

    /// The external offer destination.
    pub fn offer_url(&self) -> &str {
        &self.offer_url
    }

    /// Whether `url` carries the qualifying marker.
    pub fn has_parameter(&self, url: &str) -> bool {
        url.contains(&self.qualifying_marker)
    }

    /// Pick the destination for a visitor.
    ///
    /// Bot or blacklisted wins over the marker check.
    pub fn redirect_target(&self, is_bot: bool, is_blacklisted: bool, has_parameter: bool) -> &str {
        if is_bot || is_blacklisted {
            BLOG_PATH
        } else if !has_parameter {
            NOT_FOUND_PATH
        } else {
            &self.offer_url
        }
    }

    /// Classify a visitor, update the blacklist and visit log, and return
    /// the verdict.
    ///
    /// Blacklist and log writes are independent: if the log append fails, a
    /// blacklist entry created earlier in the same call stays in place.
    pub async fn check(&self, request: &VisitorRequest) -> Result<VisitorVerdict, StoreError> {
        let ip = request.ip_address.as_str();
        let user_agent = (!request.user_agent.is_empty()).then_some(request.user_agent.as_str());

        let has_parameter = self.has_parameter(&request.url);
        let mut is_blacklisted = self.store.is_blacklisted(ip).await?;

        // A client whose local flag is ahead of us (e.g. after a restart
        // wiped memory) gets its flag honoured and recorded.
        if request.client_blacklisted && !is_blacklisted {
            let upsert = self.store.blacklist(ip, user_agent).await?;
            warn!(
                client_ip = %ip,
                created = upsert.was_created(),
                "Client reported local blacklist flag, recording server-side"
            );
            is_blacklisted = true;
        }

        let classification = self.verdicts.classify(&request.user_agent).await;
        let is_bot = classification.is_bot;
        if let Some(reason) = &classification.reason {
            debug!(client_ip = %ip, reason = %reason, "User-Agent classified as bot");
        }

        let redirect_to = self
            .redirect_target(is_bot, is_blacklisted, has_parameter)
            .to_string();

        // Burn direct visits so the next attempt lands on the blog.
        if !is_bot && !has_parameter && !is_blacklisted {
            let upsert = self.store.blacklist(ip, user_agent).await?;
            warn!(
                client_ip = %ip,
                created = upsert.was_created(),
                "Blacklisting direct visitor"
            );
            is_blacklisted = true;
        }

        let logged = self
            .store
            .append_log(NewVisitorLog {
                ip_address: ip.to_string(),
                user_agent: user_agent.map(str::to_string),
                is_bot,
                parameters: serde_json::to_string(&request.query).ok(),
                redirected_to: redirect_to.clone(),
            })
            .await?;

        info!(
            log_id = logged.id,
            client_ip = %ip,
            is_bot,
            is_blacklisted,
            has_parameter,
            redirect_to = %redirect_to,
            "Visitor check complete"
        );

        Ok(VisitorVerdict {
            is_bot,
            is_blacklisted,
            has_parameter,
            redirect_to,
        })
    }
}
