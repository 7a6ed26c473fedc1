//! User-Agent classifier.
//!
//! Checks run in a fixed order and the first hit wins:
//! - Known crawler/bot tokens
//! - Secondary indicators (headless browsers, bot info URLs, automation)
//! - Length heuristic (very short User-Agents are treated as bots)
//!
//! All token matching is case-insensitive substring matching.

use super::{Classification, MatchReason};
use crate::config::ClassifierConfig;
use regex::RegexSet;
use std::sync::LazyLock;

/// Known crawler and bot tokens.
static BOT_PATTERNS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    vec![
        // Generic
        "bot",
        "crawler",
        "spider",
        "slurp",

        // Search engines
        "googlebot",
        "bingbot",
        "yahoo",
        "baidu",
        "yandex",
        "duckduckbot",
        "baiduspider",
        "ia_archiver",
        "googlebot-",
        "adsbot-google",
        "mediapartners-google",
        "apis-google",
        "feedfetcher-google",
        "adidxbot",
        "msnbot",

        // SEO and social
        "facebookexternalhit",
        "semrushbot",
        "ahrefsbot",
        "mj12bot",
        "linkedinbot",

        // Command-line tools and libraries
        "wget",
        "curl",
        "python-urllib",
        "python-requests",
        "libwww",
        "httpunit",
        "nutch",
        "go-http-client",
        "phpcrawl",

        // Other well-known crawlers
        "fast-webcrawler",
        "fast enterprise crawler",
        "biglotron",
        "teoma",
        "convera",
    ]
});

/// Secondary indicators not covered by the pattern list.
static BOT_INDICATORS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    vec![
        // Bot info URLs
        "http://www.google.com/bot.html",
        "http://help.yahoo.com/help/us/ysearch/slurp",
        "http://www.bing.com/bingbot.htm",
        "http://search.msn.com/msnbot.htm",

        // Automation
        "headlesschrome",
        "phantomjs",
        "selenium",
        "webdriver",
        "scraper",
        "crawler",
        "archiver",
    ]
});

/// A compiled list of case-insensitive substring tokens.
struct TokenSet {
    tokens: Vec<String>,
    set: RegexSet,
}

impl TokenSet {
    fn compile<I>(tokens: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = Vec::new();
        for token in tokens {
            let token = token.trim().to_lowercase();
            if !token.is_empty() && !seen.contains(&token) {
                seen.push(token);
            }
        }

        let set = RegexSet::new(
            seen.iter()
                .map(|t| format!("(?i){}", regex::escape(t))),
        )?;

        Ok(Self { tokens: seen, set })
    }

    /// First token (in list order) contained in `haystack`.
    fn first_match(&self, haystack: &str) -> Option<&str> {
        self.set
            .matches(haystack)
            .iter()
            .next()
            .map(|i| self.tokens[i].as_str())
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }
}

/// Deterministic User-Agent bot classifier.
pub struct UserAgentClassifier {
    patterns: TokenSet,
    indicators: TokenSet,
    min_length: usize,
}

impl UserAgentClassifier {
    /// Build a classifier from the built-in lists plus configured extras.
    pub fn new(config: &ClassifierConfig) -> Result<Self, regex::Error> {
        let patterns = TokenSet::compile(
            BOT_PATTERNS
                .iter()
                .map(|t| t.to_string())
                .chain(config.extra_bot_patterns.iter().cloned()),
        )?;
        let indicators = TokenSet::compile(
            BOT_INDICATORS
                .iter()
                .map(|t| t.to_string())
                .chain(config.extra_indicators.iter().cloned()),
        )?;

        Ok(Self {
            patterns,
            indicators,
            min_length: config.min_user_agent_length,
        })
    }

    /// Classify a User-Agent, reporting which check fired.
    ///
    /// An empty User-Agent passes both token lists but is caught by the
    /// length heuristic, so a missing header and a short forged one end up
    /// with the same verdict.
    pub fn classify(&self, user_agent: &str) -> Classification {
        if let Some(token) = self.patterns.first_match(user_agent) {
            return Classification::bot(MatchReason::Pattern(token.to_string()));
        }

        if let Some(token) = self.indicators.first_match(user_agent) {
            return Classification::bot(MatchReason::Indicator(token.to_string()));
        }

        let len = user_agent.chars().count();
        if len < self.min_length {
            return Classification::bot(MatchReason::ShortUserAgent(len));
        }

        Classification::human()
    }

    /// Bot verdict only.
    pub fn is_bot(&self, user_agent: &str) -> bool {
        self.classify(user_agent).is_bot
    }

    /// Number of compiled pattern and indicator tokens.
    pub fn token_counts(&self) -> (usize, usize) {
        (self.patterns.len(), self.indicators.len())
    }
}

impl Default for UserAgentClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default()).expect("built-in bot tokens compile")
    }
}
