use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::feed::FeedEntity;
use crate::ground_truth::TripStops;

// -- 🗑️ every entity carries it, every entity carries the same value. zero information.
const SCHEDULE_RELATIONSHIP: &str = "schedule_relationship";

/// 📈 Four parallel columns, one row per stop event, in observation order.
///
/// Invariants: all four columns are the same length, and `stop_sequence` never goes down.
/// Interpolated rows sit on the integer grid but the column is `f64` so sub-stop positions
/// remain possible later without a format change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripSeries {
    arrival_time: Vec<i64>,
    delay: Vec<i64>,
    stop_id: Vec<Option<String>>,
    stop_sequence: Vec<f64>,
}

impl TripSeries {
    fn push(&mut self, arrival_time: i64, delay: i64, stop_id: Option<String>, stop_sequence: f64) {
        self.arrival_time.push(arrival_time);
        self.delay.push(delay);
        self.stop_id.push(stop_id);
        self.stop_sequence.push(stop_sequence);
    }

    pub fn len(&self) -> usize {
        self.arrival_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrival_time.is_empty()
    }

    pub fn arrival_time(&self) -> &[i64] {
        &self.arrival_time
    }

    pub fn delay(&self) -> &[i64] {
        &self.delay
    }

    pub fn stop_id(&self) -> &[Option<String>] {
        &self.stop_id
    }

    pub fn stop_sequence(&self) -> &[f64] {
        &self.stop_sequence
    }

    fn last_arrival_and_delay(&self) -> Option<(i64, i64)> {
        Some((*self.arrival_time.last()?, *self.delay.last()?))
    }
}

/// 📦 What a finished trip looks like on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedTrip {
    pub constant_attributes: BTreeMap<String, Value>,
    pub series: TripSeries,
    /// ⏰ when this was serialized, not when the trip ended. export bookkeeping only.
    pub finalize_time: DateTime<Utc>,
}

/// 🚌 The evolving state of one trip we are watching.
#[derive(Debug, Clone)]
pub struct TripRecord {
    id: String,
    last_observed_sequence: u32,
    constant_attributes: BTreeMap<String, Value>,
    series: TripSeries,
    ground_truth: TripStops,
}

impl TripRecord {
    /// 🐣 First sighting. One observation, straight from the entity.
    pub fn create(entity: &FeedEntity, ground_truth: TripStops) -> Self {
        let trip = &entity.trip_update.trip;
        let mut constant_attributes = trip.attributes.clone();
        constant_attributes.remove(SCHEDULE_RELATIONSHIP);
        constant_attributes.insert("trip_id".to_string(), Value::from(trip.trip_id.clone()));
        constant_attributes.insert("vehicle".to_string(), Value::from(entity.vehicle_id()));

        let mut series = TripSeries::default();
        series.push(
            entity.arrival_time(),
            entity.delay(),
            Some(entity.stop_id().to_string()),
            f64::from(entity.stop_sequence()),
        );

        Self {
            id: trip.trip_id.clone(),
            last_observed_sequence: entity.stop_sequence(),
            constant_attributes,
            series,
            ground_truth,
        }
    }

    /// 🔄 A later sighting of the same trip.
    ///
    /// If the reported stop is past the last one we confirmed, one row is appended per stop
    /// crossed, with times and delays spread evenly between the last row and the new report.
    /// Anything else (same stop again, or a stop we already passed) is ignored.
    ///
    /// Returns how many rows were appended.
    pub fn update(&mut self, entity: &FeedEntity) -> usize {
        let current = entity.stop_sequence();
        let Some(gap) = current
            .checked_sub(self.last_observed_sequence)
            .filter(|gap| *gap > 0)
        else {
            return 0;
        };
        let Some((from_time, from_delay)) = self.series.last_arrival_and_delay() else {
            return 0;
        };
        let (to_time, to_delay) = (entity.arrival_time(), entity.delay());

        for step in 1..=gap {
            let sequence = self.last_observed_sequence + step;
            let (arrival_time, delay) = if step == gap {
                (to_time, to_delay)
            } else {
                let fraction = f64::from(step) / f64::from(gap);
                (
                    lerp(from_time, to_time, fraction),
                    lerp(from_delay, to_delay, fraction),
                )
            };
            // -- 🗺️ the timetable names the stop; the feed's own id is the fallback for the
            // -- stop it actually reported, in case the timetable is short
            let stop_id = self
                .ground_truth
                .stop_at(sequence)
                .map(String::from)
                .or_else(|| (step == gap).then(|| entity.stop_id().to_string()));
            self.series
                .push(arrival_time, delay, stop_id, f64::from(sequence));
        }

        trace!(
            "🚏 trip {} moved {} -> {} ({} rows)",
            self.id, self.last_observed_sequence, current, gap
        );
        self.last_observed_sequence = current;
        gap as usize
    }

    /// 📦 Snapshot for export, stamped with the current wall clock.
    pub fn serialize(&self) -> SerializedTrip {
        SerializedTrip {
            constant_attributes: self.constant_attributes.clone(),
            series: self.series.clone(),
            finalize_time: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn last_observed_sequence(&self) -> u32 {
        self.last_observed_sequence
    }

    pub fn constant_attributes(&self) -> &BTreeMap<String, Value> {
        &self.constant_attributes
    }

    pub fn series(&self) -> &TripSeries {
        &self.series
    }

    pub fn observation_count(&self) -> usize {
        self.series.len()
    }
}

fn lerp(from: i64, to: i64, fraction: f64) -> i64 {
    (from as f64 + (to - from) as f64 * fraction).round() as i64
}
