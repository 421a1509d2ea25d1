use std::collections::BTreeMap;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, warn};

use super::{BatchExporter, FlushOutcome};
use crate::trips::{SerializedTrip, TripRecord};

/// 🧺 Finished trips waiting for a ride to disk.
///
/// Holds at most `max_batch_size` serialized trips. The size check happens before inserting, so
/// a full basket gets flushed to make room instead of overflowing.
#[derive(Debug)]
pub struct BatchAggregator {
    entries: BTreeMap<String, SerializedTrip>,
    max_batch_size: usize,
}

impl BatchAggregator {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_batch_size: max_batch_size.max(1),
        }
    }

    /// 📥 Take one finished trip.
    ///
    /// Returns `Some(outcome)` when making room required a flush. A `Refused` outcome means the
    /// record was NOT absorbed and the caller is expected to stop.
    pub async fn absorb(
        &mut self,
        record: TripRecord,
        exporter: &mut BatchExporter,
    ) -> Result<Option<FlushOutcome>> {
        let mut flushed = None;
        if self.entries.len() >= self.max_batch_size {
            let outcome = self.flush(exporter).await?;
            if matches!(outcome, FlushOutcome::Refused { .. }) {
                return Ok(Some(outcome));
            }
            flushed = Some(outcome);
        }

        let key = self.free_key(record.id());
        debug!(
            "🧺 trip {} absorbed with {} observations",
            record.id(),
            record.observation_count()
        );
        self.entries.insert(key, record.serialize());
        Ok(flushed)
    }

    /// 💾 Write whatever is here and start over empty. Empty aggregators write nothing.
    /// A refused flush leaves the entries where they are.
    pub async fn flush(&mut self, exporter: &mut BatchExporter) -> Result<FlushOutcome> {
        let outcome = exporter.export(&self.entries).await?;
        if let FlushOutcome::Written { .. } = outcome {
            self.entries = BTreeMap::new();
        }
        Ok(outcome)
    }

    // -- ⚠️ the registry hands each id over once per lifetime, so a clash means a trip id was
    // -- reused after leaving the feed. keep both rather than overwrite.
    fn free_key(&self, trip_id: &str) -> String {
        if !self.entries.contains_key(trip_id) {
            return trip_id.to_string();
        }
        let stamp = Utc::now().timestamp_millis();
        let mut key = format!("{trip_id}-{stamp}");
        let mut n = 1;
        while self.entries.contains_key(&key) {
            key = format!("{trip_id}-{stamp}-{n}");
            n += 1;
        }
        warn!("⚠️ trip {trip_id} is already waiting in this batch, storing the newcomer as {key}");
        key
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&SerializedTrip> {
        self.entries.get(key)
    }
}
