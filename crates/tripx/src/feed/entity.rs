//! 📜 The wire shape of a trip-updates feed, as much of it as we care about.
//!
//! The agency sends a GTFS-realtime style JSON document. Each entity is scoped to one trip and
//! carries exactly one "this is where I am" stop. Everything on the `trip` object other than the
//! id is kept verbatim, because route/direction/start-time fields vary by agency and we are not
//! in the business of guessing which ones matter.
//!
//! ⚠️ protobuf-JSON likes to encode int64 as strings ("1700000000"). Some agencies do, some
//! don't, some do it on Tuesdays. The integer fields accept both.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// 📦 The whole response body. We only read `entity`; the header can say whatever it likes.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedMessage {
    #[serde(default)]
    pub entity: Vec<FeedEntity>,
}

/// 🚌 One trip, one stop, one moment in time.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntity {
    pub trip_update: TripUpdate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripUpdate {
    pub trip: TripDescriptor,
    pub vehicle: VehicleDescriptor,
    #[serde(deserialize_with = "one_or_last")]
    pub stop_time_update: StopTimeUpdate,
}

/// 🏷️ Trip-level fields. `trip_id` is the only one we insist on.
#[derive(Debug, Clone, Deserialize)]
pub struct TripDescriptor {
    pub trip_id: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleDescriptor {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopTimeUpdate {
    pub stop_id: String,
    #[serde(deserialize_with = "number_or_string")]
    pub stop_sequence: u32,
    pub arrival: StopTimeEvent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopTimeEvent {
    /// ⏰ epoch seconds
    #[serde(deserialize_with = "number_or_string")]
    pub time: i64,
    /// ⏳ signed seconds behind (+) or ahead of (-) the timetable
    #[serde(deserialize_with = "number_or_string")]
    pub delay: i64,
}

impl FeedEntity {
    pub fn trip_id(&self) -> &str {
        &self.trip_update.trip.trip_id
    }

    pub fn stop_sequence(&self) -> u32 {
        self.trip_update.stop_time_update.stop_sequence
    }

    pub fn stop_id(&self) -> &str {
        &self.trip_update.stop_time_update.stop_id
    }

    pub fn arrival_time(&self) -> i64 {
        self.trip_update.stop_time_update.arrival.time
    }

    pub fn delay(&self) -> i64 {
        self.trip_update.stop_time_update.arrival.delay
    }

    pub fn vehicle_id(&self) -> &str {
        &self.trip_update.vehicle.id
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    Text(String),
}

fn number_or_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
    T::Error: std::fmt::Display,
{
    let raw = match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n,
        NumberOrString::Text(s) => s.trim().parse::<i64>().map_err(de::Error::custom)?,
    };
    T::try_from(raw).map_err(de::Error::custom)
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::Text(s) => s,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

// -- 🎯 a list of stop updates means "here's the trail"; the last one is where the bus is now
fn one_or_last<'de, D>(deserializer: D) -> Result<StopTimeUpdate, D::Error>
where
    D: Deserializer<'de>,
{
    match OneOrMany::<StopTimeUpdate>::deserialize(deserializer)? {
        OneOrMany::One(update) => Ok(update),
        OneOrMany::Many(updates) => updates
            .into_iter()
            .last()
            .ok_or_else(|| de::Error::custom("stop_time_update list is empty")),
    }
}
