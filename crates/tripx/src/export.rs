//! 📤 Export -- where finished trips go to become files.
//!
//! 🚰 Finished records → [`BatchAggregator`] (up to `max_batch_size` of them) → [`BatchExporter`]
//! (asks the [`StorageGuard`] for permission, names the file) → a [`BatchSink`] (pure I/O).
//!
//! The guard is the bouncer. When the save directory is full, it says no, and "no" is final:
//! the collection run ends right there. There is no shedding policy, no oldest-file eviction,
//! no polite compaction. Full means full.
//!
//! 🦆

use anyhow::Result;
use async_trait::async_trait;

mod batch;
mod exporter;
mod file_sink;
mod in_mem_sink;
mod storage_guard;

pub use batch::BatchAggregator;
pub use exporter::{BatchExporter, FlushOutcome};
pub use file_sink::FileSink;
pub use in_mem_sink::InMemorySink;
pub use storage_guard::{StorageDecision, StorageGuard};

/// 🕳️ A sink that writes fully rendered batch payloads. I/O only, zero opinions.
///
/// # Contract 📜
/// - `write_batch` persists `payload` under `name`. Names are unique within a run; the sink
///   does not need to check.
/// - No buffering across calls. When `write_batch` returns `Ok`, the batch is down.
#[async_trait]
pub trait BatchSink: std::fmt::Debug {
    async fn write_batch(&mut self, name: &str, payload: &str) -> Result<()>;
}

/// 🎭 Where batches land: disk for real runs, RAM for tests.
#[derive(Debug)]
pub enum SinkBackend {
    File(FileSink),
    InMemory(InMemorySink),
}

#[async_trait]
impl BatchSink for SinkBackend {
    async fn write_batch(&mut self, name: &str, payload: &str) -> Result<()> {
        match self {
            SinkBackend::File(sink) => sink.write_batch(name, payload).await,
            SinkBackend::InMemory(sink) => sink.write_batch(name, payload).await,
        }
    }
}
