//! 📡 Feed -- where the trip updates come from.
//!
//! 🚌 Once per cycle somebody asks the transit agency "where is everyone?" and the agency
//! answers with a pile of entities, one per trip, each pinned to whichever stop the vehicle
//! most recently reported. Sometimes it answers with a 503. Sometimes it answers with nothing
//! at all. Both of those are "no updates this cycle" and we move on with our lives.
//!
//! 🎭 Same casting-agency trick as everywhere else: a trait, a couple of concrete backends,
//! and an enum that dispatches to whichever one the config picked.
//!
//! 🦆 The duck rides for free.

use anyhow::Result;
use async_trait::async_trait;

pub mod entity;
mod http;
mod in_mem;

pub use entity::{FeedEntity, FeedMessage};
pub use http::{FeedConfig, HttpFeed};
pub use in_mem::InMemoryFeed;

/// 🚰 A source of raw trip-update entities, one batch per call.
///
/// # Contract 📜
/// - `fetch_updates` performs exactly one request per call. One call = one cycle.
/// - Transient failures (non-2xx, network trouble) are NOT errors. They are logged and
///   come back as `Ok(vec![])`. The collection loop never sees them.
/// - `Err(...)` is reserved for contract violations: a body that does not decode as the
///   feed schema. That one ends the run, because we cannot trust anything after it.
#[async_trait]
pub trait FeedSource: std::fmt::Debug {
    /// 📦 Ask the feed what every trip is up to right now.
    async fn fetch_updates(&mut self) -> Result<Vec<FeedEntity>>;
}

/// 🎭 The many faces of a feed. The collector holds one of these and never asks which.
#[derive(Debug)]
pub enum FeedBackend {
    Http(HttpFeed),
    InMemory(InMemoryFeed),
}

#[async_trait]
impl FeedSource for FeedBackend {
    async fn fetch_updates(&mut self) -> Result<Vec<FeedEntity>> {
        match self {
            FeedBackend::Http(feed) => feed.fetch_updates().await,
            FeedBackend::InMemory(feed) => feed.fetch_updates().await,
        }
    }
}
