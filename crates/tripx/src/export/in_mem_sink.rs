use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::BatchSink;

/// 📦 A sink that never forgets. Batches go into a shared Vec as `(name, payload)` pairs.
///
/// Clone-able because tests hand one copy to the collector and keep the other to peek inside
/// afterwards. The `Arc` means everyone shares the same Vec.
#[derive(Debug, Default, Clone)]
pub struct InMemorySink {
    pub received: Arc<Mutex<Vec<(String, String)>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🔍 Copy of everything written so far.
    pub async fn batches(&self) -> Vec<(String, String)> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl BatchSink for InMemorySink {
    async fn write_batch(&mut self, name: &str, payload: &str) -> Result<()> {
        self.received
            .lock()
            .await
            .push((name.to_string(), payload.to_string()));
        Ok(())
    }
}
