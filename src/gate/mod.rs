//! Client gate.
//!
//! Runs before every route render on the client side of the boundary:
//! - Marks direct visits locally before asking the server
//! - Calls the decision engine, bounded by a timeout
//! - Reconciles the server verdict with the local flag
//! - Falls back to the local flag when the server cannot be reached
//! - Drops responses that belong to an abandoned navigation

pub mod api;
pub mod flag;

pub use api::{GateError, HttpVisitorApi, VisitorApi};
pub use flag::{FileFlagStorage, FlagStorage, LocalFlag, MemoryFlagStorage, FLAG_VALUE};

use crate::config::ClientConfig;
use crate::engine::{VisitorVerdict, BLOG_PATH, NOT_FOUND_PATH};
use reqwest::Url;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Routes a flagged visitor may still see.
pub fn is_always_allowed(path: &str) -> bool {
    path == BLOG_PATH || path == NOT_FOUND_PATH
}

/// Where the client is navigating to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Path component, e.g. `/blog`
    pub path: String,
    /// Query string including the leading `?`, empty when absent
    pub search: String,
    /// Full URL sent to the server
    pub href: String,
}

impl Location {
    /// Split an absolute URL into its parts.
    pub fn parse(href: &str) -> Result<Self, GateError> {
        let url = Url::parse(href).map_err(|e| GateError::InvalidLocation(e.to_string()))?;
        let search = url
            .query()
            .filter(|q| !q.is_empty())
            .map(|q| format!("?{}", q))
            .unwrap_or_default();

        Ok(Self {
            path: url.path().to_string(),
            search,
            href: url.to_string(),
        })
    }

    /// No query string and not one of the always-allowed routes.
    pub fn is_direct(&self) -> bool {
        self.search.is_empty() && !is_always_allowed(&self.path)
    }
}

/// Where a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictSource {
    /// Server verdict used as-is
    Server,
    /// Server said not blacklisted; the local flag won
    LocalOverride,
    /// Server unreachable; synthesized from the local flag
    LocalFallback,
}

/// A verdict after reconciliation with the local flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub verdict: VisitorVerdict,
    pub source: VerdictSource,
}

/// What the client should do with a navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "target", rename_all = "snake_case")]
pub enum Navigation {
    /// Leave the site without rendering
    External(String),
    /// Change to another internal route; rendering waits one scheduler tick
    Redirect(String),
    /// Render the requested route
    Render,
    /// A newer navigation started; this result must be ignored
    Stale,
}

/// Client-side gate in front of route rendering.
pub struct ClientGate<A> {
    api: A,
    storage: Arc<dyn FlagStorage>,
    storage_key: String,
    timeout: Duration,
    flag: Mutex<LocalFlag>,
    sequence: AtomicU64,
}

impl<A: VisitorApi> ClientGate<A> {
    /// Create a gate, reading any flag left by an earlier session.
    pub fn new(api: A, storage: Arc<dyn FlagStorage>, config: &ClientConfig) -> Self {
        let stored = match storage.load(&config.storage_key) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Could not read local blacklist flag");
                None
            }
        };

        Self {
            api,
            storage,
            storage_key: config.storage_key.clone(),
            timeout: Duration::from_millis(config.check_timeout_ms),
            flag: Mutex::new(LocalFlag::from_stored(stored.as_deref())),
            sequence: AtomicU64::new(0),
        }
    }

    /// Current local flag.
    pub fn flag(&self) -> LocalFlag {
        *self.flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raise the local flag to at least `level`.
    ///
    /// Storage holds a single value for every flagged level, so only the
    /// first rise out of `Unknown` is persisted.
    fn mark(&self, level: LocalFlag) {
        let mut flag = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        if level <= *flag {
            return;
        }
        let previous = std::mem::replace(&mut *flag, level);
        drop(flag);

        if previous.is_flagged() {
            return;
        }
        if let Err(e) = self.storage.store(&self.storage_key, FLAG_VALUE) {
            warn!(error = %e, "Could not persist local blacklist flag");
        }
    }

    /// Apply the local flag to a server verdict.
    pub fn reconcile(&self, mut verdict: VisitorVerdict) -> CheckOutcome {
        if self.flag().is_flagged() && !verdict.is_blacklisted {
            info!("Local blacklist flag overrides server verdict");
            verdict.is_blacklisted = true;
            verdict.redirect_to = BLOG_PATH.to_string();
            return CheckOutcome {
                verdict,
                source: VerdictSource::LocalOverride,
            };
        }

        CheckOutcome {
            verdict,
            source: VerdictSource::Server,
        }
    }

    /// Ask the server about `location`, falling back to the local flag.
    ///
    /// Fails only when the server cannot answer and nothing is flagged
    /// locally.
    pub async fn detect(&self, location: &Location) -> Result<CheckOutcome, GateError> {
        let flagged = self.flag().is_flagged();

        let response = match tokio::time::timeout(
            self.timeout,
            self.api.check_visitor(&location.href, flagged),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GateError::Timeout(self.timeout)),
        };

        match response {
            Ok(verdict) => Ok(self.reconcile(verdict)),
            Err(e) if flagged => {
                warn!(error = %e, "Visitor check failed, using local blacklist flag");
                Ok(CheckOutcome {
                    verdict: VisitorVerdict {
                        is_bot: false,
                        is_blacklisted: true,
                        has_parameter: false,
                        redirect_to: BLOG_PATH.to_string(),
                    },
                    source: VerdictSource::LocalFallback,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Gate a navigation to `location`.
    pub async fn navigate(&self, location: &Location) -> Navigation {
        let ticket = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        if location.is_direct() {
            info!(path = %location.path, "Direct visitor, flagging locally");
            self.mark(LocalFlag::Suspected);
        }

        let outcome = self.detect(location).await;

        if self.sequence.load(Ordering::SeqCst) != ticket {
            debug!(ticket, path = %location.path, "Discarding stale visitor check");
            return Navigation::Stale;
        }

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Visitor check failed, routing to not-found");
                return Navigation::Redirect(NOT_FOUND_PATH.to_string());
            }
        };

        let verdict = outcome.verdict;
        if verdict.is_bot {
            debug!("Bot visitor, server routes to blog");
        }
        if verdict.is_blacklisted {
            let level = if outcome.source == VerdictSource::Server {
                LocalFlag::Confirmed
            } else {
                LocalFlag::Suspected
            };
            self.mark(level);
        }

        if verdict.redirect_to == location.path {
            return Navigation::Render;
        }

        if verdict.is_external() {
            return Navigation::External(verdict.redirect_to);
        }

        tokio::task::yield_now().await;
        if self.sequence.load(Ordering::SeqCst) != ticket {
            debug!(ticket, path = %location.path, "Navigation superseded during redirect tick");
            return Navigation::Stale;
        }
        Navigation::Redirect(verdict.redirect_to)
    }

    /// Route enforcement on every location change.
    ///
    /// Returns the forced destination when a flagged visitor tries to leave
    /// the allowed routes.
    pub fn guard(&self, path: &str) -> Option<&'static str> {
        if self.flag().is_flagged() && !is_always_allowed(path) {
            info!(path, "Flagged visitor outside allowed routes, forcing blog");
            return Some(BLOG_PATH);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    type Respond = dyn Fn(&str, bool) -> Result<VisitorVerdict, GateError> + Send + Sync;

    struct FakeApi {
        calls: Mutex<Vec<(String, bool)>>,
        respond: Box<Respond>,
        slow_marker: Option<&'static str>,
        delay: Duration,
    }

    impl FakeApi {
        fn new<F>(respond: F) -> Self
        where
            F: Fn(&str, bool) -> Result<VisitorVerdict, GateError> + Send + Sync + 'static,
        {
            Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
                slow_marker: None,
                delay: Duration::ZERO,
            }
        }

        fn slow_for(mut self, marker: &'static str, delay: Duration) -> Self {
            self.slow_marker = Some(marker);
            self.delay = delay;
            self
        }

        fn calls(&self) -> Vec<(String, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VisitorApi for FakeApi {
        async fn check_visitor(&self, url: &str, client_blacklisted: bool) -> Result<VisitorVerdict, GateError> {
            self.calls.lock().unwrap().push((url.to_string(), client_blacklisted));
            if self.slow_marker.is_some_and(|m| url.contains(m)) {
                tokio::time::sleep(self.delay).await;
            }
            (self.respond)(url, client_blacklisted)
        }
    }

    fn verdict(is_bot: bool, is_blacklisted: bool, redirect_to: &str) -> VisitorVerdict {
        VisitorVerdict {
            is_bot,
            is_blacklisted,
            has_parameter: false,
            redirect_to: redirect_to.to_string(),
        }
    }

    fn gate(api: FakeApi, storage: Arc<MemoryFlagStorage>) -> ClientGate<FakeApi> {
        ClientGate::new(api, storage, &ClientConfig::default())
    }

    fn loc(href: &str) -> Location {
        Location::parse(href).unwrap()
    }

    #[test]
    fn test_location_parse() {
        let l = loc("https://site.test/landing?fbcli=1");
        assert_eq!(l.path, "/landing");
        assert_eq!(l.search, "?fbcli=1");
        assert!(!l.is_direct());

        let l = loc("https://site.test/?");
        assert_eq!(l.search, "");
        assert!(l.is_direct());

        assert!(!loc("https://site.test/blog").is_direct());
        assert!(!loc("https://site.test/404").is_direct());
        assert!(Location::parse("not a url").is_err());
    }

    #[tokio::test]
    async fn test_direct_visit_flags_before_calling_server() {
        let storage = Arc::new(MemoryFlagStorage::new());
        let api = FakeApi::new(|_, _| Ok(verdict(false, true, "/404")));
        let gate = gate(api, storage.clone());

        let nav = gate.navigate(&loc("https://site.test/")).await;
        assert_eq!(nav, Navigation::Redirect("/404".to_string()));

        // The server saw the flag that was set before the call.
        assert_eq!(gate.api.calls(), vec![("https://site.test/".to_string(), true)]);
        assert_eq!(gate.flag(), LocalFlag::Confirmed);
        assert_eq!(storage.load("visitor_status").unwrap().as_deref(), Some(FLAG_VALUE));
    }

    #[tokio::test]
    async fn test_local_flag_overrides_server() {
        let storage = Arc::new(MemoryFlagStorage::flagged("visitor_status"));
        let api = FakeApi::new(|_, _| {
            Ok(VisitorVerdict {
                is_bot: false,
                is_blacklisted: false,
                has_parameter: true,
                redirect_to: "https://offer.example".to_string(),
            })
        });
        let gate = gate(api, storage);
        assert_eq!(gate.flag(), LocalFlag::Suspected);

        let outcome = gate.detect(&loc("https://site.test/?fbcli=1")).await.unwrap();
        assert_eq!(outcome.source, VerdictSource::LocalOverride);
        assert!(outcome.verdict.is_blacklisted);
        assert_eq!(outcome.verdict.redirect_to, "/blog");

        let nav = gate.navigate(&loc("https://site.test/?fbcli=1")).await;
        assert_eq!(nav, Navigation::Redirect("/blog".to_string()));
        // Not server-confirmed, so the flag stays suspected.
        assert_eq!(gate.flag(), LocalFlag::Suspected);
    }

    #[tokio::test]
    async fn test_external_redirect() {
        let storage = Arc::new(MemoryFlagStorage::new());
        let api = FakeApi::new(|_, flagged| {
            assert!(!flagged);
            Ok(VisitorVerdict {
                is_bot: false,
                is_blacklisted: false,
                has_parameter: true,
                redirect_to: "https://offer.example".to_string(),
            })
        });
        let gate = gate(api, storage.clone());

        let nav = gate.navigate(&loc("https://site.test/?fbcli=1")).await;
        assert_eq!(nav, Navigation::External("https://offer.example".to_string()));
        assert_eq!(gate.flag(), LocalFlag::Unknown);
        assert_eq!(storage.load("visitor_status").unwrap(), None);
    }

    #[tokio::test]
    async fn test_same_route_renders() {
        let api = FakeApi::new(|_, _| Ok(verdict(true, false, "/blog")));
        let gate = gate(api, Arc::new(MemoryFlagStorage::new()));
        assert_eq!(gate.navigate(&loc("https://site.test/blog")).await, Navigation::Render);
        assert_eq!(gate.flag(), LocalFlag::Unknown);
    }

    #[tokio::test]
    async fn test_failure_with_local_flag_falls_back_to_blog() {
        let storage = Arc::new(MemoryFlagStorage::flagged("visitor_status"));
        let api = FakeApi::new(|_, _| Err(GateError::Status(503)));
        let gate = gate(api, storage);

        let outcome = gate.detect(&loc("https://site.test/?fbcli=1")).await.unwrap();
        assert_eq!(outcome.source, VerdictSource::LocalFallback);
        assert_eq!(outcome.verdict, verdict(false, true, "/blog"));

        let nav = gate.navigate(&loc("https://site.test/?fbcli=1")).await;
        assert_eq!(nav, Navigation::Redirect("/blog".to_string()));
    }

    #[tokio::test]
    async fn test_failure_without_flag_routes_to_not_found() {
        let api = FakeApi::new(|_, _| Err(GateError::Status(500)));
        let gate = gate(api, Arc::new(MemoryFlagStorage::new()));

        assert!(gate.detect(&loc("https://site.test/?fbcli=1")).await.is_err());
        let nav = gate.navigate(&loc("https://site.test/?fbcli=1")).await;
        assert_eq!(nav, Navigation::Redirect("/404".to_string()));
        assert_eq!(gate.flag(), LocalFlag::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_server_times_out() {
        let api = FakeApi::new(|_, _| Ok(verdict(false, false, "https://offer.example")))
            .slow_for("fbcli", Duration::from_millis(500));
        let config = ClientConfig {
            check_timeout_ms: 20,
            ..Default::default()
        };
        let gate = ClientGate::new(api, Arc::new(MemoryFlagStorage::new()), &config);

        let err = gate.detect(&loc("https://site.test/?fbcli=1")).await.unwrap_err();
        assert!(matches!(err, GateError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let api = FakeApi::new(|url, _| {
            if url.contains("slow") {
                Ok(verdict(false, false, "https://offer.example"))
            } else {
                Ok(verdict(true, false, "/blog"))
            }
        })
        .slow_for("slow", Duration::from_millis(100));
        let gate = Arc::new(gate(api, Arc::new(MemoryFlagStorage::new())));

        let first = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.navigate(&loc("https://site.test/?fbcli=1&slow=1")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = gate.navigate(&loc("https://site.test/?fbcli=1")).await;

        assert_eq!(second, Navigation::Redirect("/blog".to_string()));
        assert_eq!(first.await.unwrap(), Navigation::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_started_during_redirect_tick_wins() {
        let api = FakeApi::new(|url, _| {
            if url.contains("slow") {
                Ok(verdict(false, false, "https://offer.example"))
            } else {
                Ok(verdict(true, false, "/blog"))
            }
        })
        .slow_for("slow", Duration::from_millis(100));
        let gate = Arc::new(gate(api, Arc::new(MemoryFlagStorage::new())));

        // Single-threaded runtime: `older` answers at once and parks on its
        // redirect tick, which is when `newer` takes its ticket.
        let older = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.navigate(&loc("https://site.test/x?fbcli=1")).await })
        };
        let newer = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.navigate(&loc("https://site.test/y?fbcli=1&slow=1")).await })
        };

        assert_eq!(older.await.unwrap(), Navigation::Stale);
        assert_eq!(
            newer.await.unwrap(),
            Navigation::External("https://offer.example".to_string())
        );
    }

    struct CountingStorage {
        inner: MemoryFlagStorage,
        writes: AtomicU64,
    }

    impl FlagStorage for CountingStorage {
        fn load(&self, key: &str) -> std::io::Result<Option<String>> {
            self.inner.load(key)
        }

        fn store(&self, key: &str, value: &str) -> std::io::Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.store(key, value)
        }
    }

    #[tokio::test]
    async fn test_flag_is_persisted_once() {
        let storage = Arc::new(CountingStorage {
            inner: MemoryFlagStorage::new(),
            writes: AtomicU64::new(0),
        });
        let api = FakeApi::new(|_, _| Ok(verdict(false, true, "/blog")));
        let gate = ClientGate::new(api, storage.clone(), &ClientConfig::default());

        // Direct visit raises to Suspected, the server verdict to Confirmed.
        gate.navigate(&loc("https://site.test/")).await;
        assert_eq!(gate.flag(), LocalFlag::Confirmed);
        gate.navigate(&loc("https://site.test/?fbcli=1")).await;

        assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
        assert_eq!(storage.load("visitor_status").unwrap().as_deref(), Some(FLAG_VALUE));
    }

    #[tokio::test]
    async fn test_guard() {
        let unflagged = gate(
            FakeApi::new(|_, _| Err(GateError::Status(500))),
            Arc::new(MemoryFlagStorage::new()),
        );
        assert_eq!(unflagged.guard("/anything"), None);

        let flagged = gate(
            FakeApi::new(|_, _| Err(GateError::Status(500))),
            Arc::new(MemoryFlagStorage::flagged("visitor_status")),
        );
        assert_eq!(flagged.guard("/anything"), Some("/blog"));
        assert_eq!(flagged.guard("/"), Some("/blog"));
        assert_eq!(flagged.guard("/blog"), None);
        assert_eq!(flagged.guard("/404"), None);
    }

    #[test]
    fn test_navigation_serializes_tagged() {
        let json = serde_json::to_value(Navigation::External("https://x.example".into())).unwrap();
        assert_eq!(json["action"], "external");
        assert_eq!(json["target"], "https://x.example");
        assert_eq!(serde_json::to_value(Navigation::Render).unwrap()["action"], "render");
    }
}
