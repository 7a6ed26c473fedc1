//! Traffic Gate for Zentinel
//!
//! Classifies inbound visitors and decides where each one is redirected:
//! bots and blacklisted addresses to the blog, unqualified direct visitors to
//! a 404 page (burning their IP), qualified visitors to an external offer.
//!
//! # Features
//!
//! - Keyword and length based User-Agent bot classification
//! - Permanent per-IP blacklist with atomic, idempotent upsert
//! - Append-only visit log with strictly increasing ids
//! - Read-only blog catalog
//! - Client gate that caches the blacklist flag and survives server outages
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zentinel_traffic_gate::{MemoryStore, RedirectEngine, VisitorRequest};
//!
//! let engine = RedirectEngine::with_defaults(Arc::new(MemoryStore::new()))?;
//! let verdict = engine.check(&VisitorRequest {
//!     ip_address: "9.9.9.9".into(),
//!     user_agent: "Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0".into(),
//!     url: "https://site.example/?fbcli=1".into(),
//!     ..Default::default()
//! }).await?;
//! ```

pub mod blog;
pub mod cache;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod gate;
pub mod server;
pub mod store;

pub use blog::{BlogCatalog, BlogPost};
pub use config::GateConfig;
pub use engine::{RedirectEngine, VisitorRequest, VisitorVerdict};
pub use gate::{ClientGate, Location, Navigation};
pub use store::{MemoryStore, VisitorStore};
