//! Read-only blog catalog served to bots and blacklisted visitors.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A blog post as served by `/api/blog-posts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: u64,
    pub title: String,
    pub category: String,
    pub date: String,
    pub image_url: String,
    pub url: String,
}

/// A post definition as read from a catalog file; ids are assigned on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlogPost {
    pub title: String,
    pub category: String,
    pub date: String,
    pub image_url: String,
    pub url: String,
}

/// Immutable list of posts, ids starting at 1 in load order.
#[derive(Debug, Clone)]
pub struct BlogCatalog {
    posts: Vec<BlogPost>,
}

impl BlogCatalog {
    /// Build a catalog, numbering posts from 1.
    pub fn from_posts(posts: Vec<NewBlogPost>) -> Self {
        let posts = posts
            .into_iter()
            .zip(1u64..)
            .map(|(post, id)| BlogPost {
                id,
                title: post.title,
                category: post.category,
                date: post.date,
                image_url: post.image_url,
                url: post.url,
            })
            .collect();
        Self { posts }
    }

    /// Load posts from a JSON file, falling back to the built-in posts when
    /// the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let posts: Vec<NewBlogPost> = serde_json::from_str(&content)?;
            info!(path = %path.display(), count = posts.len(), "Loaded blog catalog");
            Ok(Self::from_posts(posts))
        } else {
            Ok(Self::with_defaults())
        }
    }

    /// Catalog seeded with the built-in posts.
    pub fn with_defaults() -> Self {
        Self::from_posts(default_posts())
    }

    pub fn all(&self) -> &[BlogPost] {
        &self.posts
    }

    pub fn get(&self, id: u64) -> Option<&BlogPost> {
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

impl Default for BlogCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

const MARKETS_IMAGE: &str =
    "https://cdn.prod.website-files.com/5e6ba7d72f23ac61d5042cf4/6669497869ac4e55ac62ff66_markets.png";
const CRYPTO_IMAGE: &str =
    "https://cdn.prod.website-files.com/5e6ba7d72f23ac61d5042cf4/6669a6aa0ba0a6a4d904b91f_crypto.png";

fn post(title: &str, category: &str, date: &str, image_url: &str, slug: &str) -> NewBlogPost {
    NewBlogPost {
        title: title.to_string(),
        category: category.to_string(),
        date: date.to_string(),
        image_url: image_url.to_string(),
        url: format!("https://www.changeinvest.com/blog/{}", slug),
    }
}

fn default_posts() -> Vec<NewBlogPost> {
    vec![
        post(
            "Crypto in Focus: Get swept away by Avalanche! 🏔️",
            "Investing Strategy",
            "April 1, 2025",
            MARKETS_IMAGE,
            "crypto-in-focus-get-swept-away-by-avalanche",
        ),
        post(
            "Markets in Focus: Understanding Bid/Ask Price and Spread",
            "Investing Strategy",
            "March 26, 2025",
            MARKETS_IMAGE,
            "markets-in-focus-understanding-bid-ask-price-and-spread",
        ),
        post(
            "Markets in Focus: Understanding CFD Trading",
            "Investing Strategy",
            "March 12, 2025",
            MARKETS_IMAGE,
            "markets-in-focus-understanding-cfd-trading",
        ),
        post(
            "Crypto in Focus: Polygon in 2025 - DIP or RIP?",
            "Investing Strategy",
            "March 6, 2025",
            CRYPTO_IMAGE,
            "crypto-in-focus-polygon-in-2025-dip-or-rip",
        ),
        post(
            "Markets in Focus: Exploring the Forex Market",
            "Investing Strategy",
            "February 26, 2025",
            MARKETS_IMAGE,
            "markets-in-focus-exploring-the-forex-market",
        ),
        post(
            "Crypto in Focus: The Future of Crypto is Being Built on Sui 🛸",
            "Investing Strategy",
            "February 18, 2025",
            CRYPTO_IMAGE,
            "the-future-of-crypto-is-being-built-on-sui",
        ),
        post(
            "Markets in Focus: A Closer Look at Day Trading",
            "Investing Strategy",
            "February 13, 2025",
            MARKETS_IMAGE,
            "markets-in-focus-a-closer-look-at-day-trading",
        ),
        post(
            "Crypto in Focus: Polkadot 2.0 – The Rebirth of the Network 🟣",
            "Investing Strategy",
            "February 4, 2025",
            CRYPTO_IMAGE,
            "crypto-in-focus-polkadot-2-0-the-rebirth-of-the-network",
        ),
        post(
            "Best Bitcoin Trading Apps for Beginners (2025 Guide)",
            "CFD trading",
            "January 29, 2025",
            "https://cdn.prod.website-files.com/5e6ba7d72f23ac61d5042cf4/67ee817c27c6e515af94d27d_20caf8e3-79aa-4350-901b-8cd2dadb24c2.jpeg",
            "bitcoin-trading-apps-for-beginners",
        ),
    ]
}
