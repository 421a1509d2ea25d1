use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::TripRecord;
use crate::feed::FeedEntity;
use crate::ground_truth::GroundTruthIndex;

/// 📒 trip id → the record we are building for it, across cycles.
///
/// ⚠️ "Missing from this cycle's feed" is read as "finished". A trip the agency drops for a
/// single poll gets finalized early and, if it comes back, starts over as a brand new record.
/// There is no grace period.
#[derive(Debug, Default)]
pub struct TripRegistry {
    records: HashMap<String, TripRecord>,
    ground_truth: GroundTruthIndex,
}

impl TripRegistry {
    pub fn new(ground_truth: GroundTruthIndex) -> Self {
        Self {
            records: HashMap::new(),
            ground_truth,
        }
    }

    /// 🔄 Fold one cycle of entities in, and hand back every trip that did not show up.
    ///
    /// Finished records come out sorted by trip id so batch contents are reproducible.
    pub fn process_cycle(&mut self, entities: &[FeedEntity]) -> Vec<TripRecord> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(entities.len());
        for entity in entities {
            let trip_id = entity.trip_id();
            match self.records.get_mut(trip_id) {
                Some(record) => {
                    record.update(entity);
                }
                None => {
                    debug!("🐣 new trip {trip_id} at stop sequence {}", entity.stop_sequence());
                    let stops = self.ground_truth.stop_ids_for_trip(trip_id);
                    self.records
                        .insert(trip_id.to_string(), TripRecord::create(entity, stops));
                }
            }
            seen.insert(trip_id);
        }

        let mut finished_ids: Vec<String> = self
            .records
            .keys()
            .filter(|id| !seen.contains(id.as_str()))
            .cloned()
            .collect();
        finished_ids.sort();

        finished_ids
            .into_iter()
            .filter_map(|id| {
                debug!("🏁 trip {id} left the feed");
                self.records.remove(&id)
            })
            .collect()
    }

    /// 🧹 Shutdown: everything still being tracked is finished now, feed or no feed.
    pub fn drain_all(&mut self) -> Vec<TripRecord> {
        let mut all: Vec<TripRecord> = self.records.drain().map(|(_, record)| record).collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, trip_id: &str) -> bool {
        self.records.contains_key(trip_id)
    }

    pub fn get(&self, trip_id: &str) -> Option<&TripRecord> {
        self.records.get(trip_id)
    }
}
