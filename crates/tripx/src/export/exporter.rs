use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use super::{BatchSink, SinkBackend, StorageDecision, StorageGuard};
use crate::trips::SerializedTrip;

/// 🧾 What happened when somebody asked for a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to write, nothing written, the guard was not even consulted.
    Empty,
    Written {
        name: String,
        bytes: usize,
        trips: usize,
    },
    /// 🚫 The save directory is at or over quota. Nothing was written.
    Refused { used_bytes: u64, max_bytes: u64 },
}

/// 📤 Guard check, file naming, rendering, and the hand-off to the sink.
#[derive(Debug)]
pub struct BatchExporter {
    guard: StorageGuard,
    sink: SinkBackend,
    sequence: u64,
    batches_written: usize,
    trips_written: usize,
}

impl BatchExporter {
    pub fn new(guard: StorageGuard, sink: SinkBackend) -> Self {
        Self {
            guard,
            sink,
            sequence: 0,
            batches_written: 0,
            trips_written: 0,
        }
    }

    /// 🚀 Write `entries` as one batch file, if the guard allows it.
    pub async fn export(
        &mut self,
        entries: &BTreeMap<String, SerializedTrip>,
    ) -> Result<FlushOutcome> {
        if entries.is_empty() {
            return Ok(FlushOutcome::Empty);
        }

        if let StorageDecision::Refused {
            used_bytes,
            max_bytes,
        } = self.guard.authorize().await?
        {
            warn!(
                "🚫 Save directory holds {used_bytes} bytes, quota is {max_bytes}. \
                 Refusing to write a batch of {} trips.",
                entries.len()
            );
            return Ok(FlushOutcome::Refused {
                used_bytes,
                max_bytes,
            });
        }

        let payload = serde_json::to_string_pretty(entries)
            .context("💀 A batch of trips refused to become JSON. This should not be possible.")?;
        let name = self.next_batch_name();
        self.sink
            .write_batch(&name, &payload)
            .await
            .context(format!("💀 Writing batch '{name}' failed"))?;

        self.batches_written += 1;
        self.trips_written += entries.len();
        info!(
            "💾 Saved batch {name}: {} trips, {} bytes",
            entries.len(),
            payload.len()
        );
        Ok(FlushOutcome::Written {
            name,
            bytes: payload.len(),
            trips: entries.len(),
        })
    }

    // -- 🏷️ wall clock for humans, run-local counter for uniqueness
    fn next_batch_name(&mut self) -> String {
        self.sequence += 1;
        format!(
            "BatchedRecord-{}-{:04}.json",
            Utc::now().format("%Y%m%dT%H%M%S%3fZ"),
            self.sequence
        )
    }

    pub fn batches_written(&self) -> usize {
        self.batches_written
    }

    pub fn trips_written(&self) -> usize {
        self.trips_written
    }
}
