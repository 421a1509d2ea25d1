//! 🧪 A feed that lives entirely in RAM and says exactly what it was told to say.
//!
//! Each call to `fetch_updates` pops the next scripted cycle. When the script runs out, the feed
//! goes quiet and returns empty cycles forever, which is precisely what a real feed looks like
//! at 3am when the last bus has gone home.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::{FeedEntity, FeedSource};

#[derive(Debug, Default)]
pub struct InMemoryFeed {
    cycles: VecDeque<Vec<FeedEntity>>,
    requests: usize,
    latency: Duration,
}

impl InMemoryFeed {
    /// 🚀 One inner `Vec` per cycle, in order.
    pub fn new(cycles: Vec<Vec<FeedEntity>>) -> Self {
        Self {
            cycles: cycles.into(),
            requests: 0,
            latency: Duration::ZERO,
        }
    }

    /// 🐢 Pretend every request takes this long, like a real API on a bad day.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 🔢 How many times somebody has asked. Handy for asserting the pacing.
    pub fn requests(&self) -> usize {
        self.requests
    }
}

#[async_trait]
impl FeedSource for InMemoryFeed {
    async fn fetch_updates(&mut self) -> Result<Vec<FeedEntity>> {
        self.requests += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.cycles.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::entity::tests::entity;

    #[tokio::test]
    async fn the_one_where_the_script_runs_out_and_the_feed_goes_quiet() -> Result<()> {
        let mut feed = InMemoryFeed::new(vec![vec![entity("A", 1, 10, 0)]]);
        assert_eq!(feed.fetch_updates().await?.len(), 1);
        assert!(feed.fetch_updates().await?.is_empty());
        assert!(feed.fetch_updates().await?.is_empty());
        assert_eq!(feed.requests(), 3);
        Ok(())
    }
}
