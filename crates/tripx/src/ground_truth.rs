//! 🗺️ Ground truth: the timetable's idea of which stops a trip visits, in order.
//!
//! The live feed tells us where a bus *is*. It does not tell us where the bus *was* between
//! polls. When the feed jumps from stop 3 to stop 6, the stop ids for 4 and 5 come from here.
//! Times get interpolated; stop identities do not, because the route map is not a matter of
//! opinion.
//!
//! 📂 Loaded once at startup from a CSV with `trip_id`, `stop_id` and (optionally)
//! `stop_sequence` columns. Rows are grouped per trip and ordered by `stop_sequence` when it is
//! there, file order when it isn't.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

/// 🔧 Where the stop lists live and how the feed counts.
#[derive(Debug, Deserialize, Clone)]
pub struct GroundTruthConfig {
    #[serde(default = "default_ground_truth_file")]
    pub file_name: PathBuf,
    /// 🔢 The feed `stop_sequence` that corresponds to the first stop in each list.
    /// 0 for feeds that count from zero, 1 for feeds that count like humans.
    #[serde(default)]
    pub sequence_base: u32,
}

fn default_ground_truth_file() -> PathBuf {
    PathBuf::from("trip-stop-records.txt")
}

impl Default for GroundTruthConfig {
    fn default() -> Self {
        Self {
            file_name: default_ground_truth_file(),
            sequence_base: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Record {
    trip_id: String,
    stop_id: String,
    #[serde(default)]
    stop_sequence: Option<u32>,
}

/// 🚏 The ordered stop ids for one trip, shared cheaply between the index and the trip record.
#[derive(Debug, Clone, Default)]
pub struct TripStops {
    stops: Arc<[String]>,
    sequence_base: u32,
}

impl TripStops {
    pub fn new(stops: Vec<String>, sequence_base: u32) -> Self {
        Self {
            stops: stops.into(),
            sequence_base,
        }
    }

    /// 🎯 The stop id the timetable puts at `sequence`, if the timetable has one.
    pub fn stop_at(&self, sequence: u32) -> Option<&str> {
        let index = sequence.checked_sub(self.sequence_base)?;
        self.stops.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

/// 📚 trip id → ordered stop ids. Read-only after load.
#[derive(Debug, Clone, Default)]
pub struct GroundTruthIndex {
    trips: HashMap<String, TripStops>,
    sequence_base: u32,
}

impl GroundTruthIndex {
    /// 📂 Load the index from disk. Blocking, once, at startup.
    pub fn from_csv_path(path: &Path, sequence_base: u32) -> Result<Self> {
        let file = std::fs::File::open(path).context(format!(
            "💀 The ground-truth stop file '{}' is nowhere to be found. Without it, skipped stops \
             stay nameless.",
            path.display()
        ))?;
        let index = Self::from_reader(file, sequence_base)
            .context(format!("💀 Couldn't make sense of '{}'", path.display()))?;
        info!(
            "🗺️ Loaded ground-truth stop lists for {} trips from {}",
            index.trips.len(),
            path.display()
        );
        Ok(index)
    }

    pub fn from_reader<R: std::io::Read>(reader: R, sequence_base: u32) -> Result<Self> {
        let mut grouped: HashMap<String, Vec<(Option<u32>, String)>> = HashMap::new();
        for rec in csv::Reader::from_reader(reader).deserialize() {
            let rec: Record = rec?;
            grouped
                .entry(rec.trip_id)
                .or_default()
                .push((rec.stop_sequence, rec.stop_id));
        }

        let trips = grouped
            .into_iter()
            .map(|(trip_id, mut stops)| {
                // -- only reorder when every row says where it belongs
                if stops.iter().all(|(seq, _)| seq.is_some()) {
                    stops.sort_by_key(|(seq, _)| *seq);
                }
                let stops = stops.into_iter().map(|(_, stop_id)| stop_id).collect();
                (trip_id, TripStops::new(stops, sequence_base))
            })
            .collect();
        Ok(Self {
            trips,
            sequence_base,
        })
    }

    /// 🔍 Exact trip id match. Unknown trips get an empty list, so their skipped stops stay
    /// unnamed but their times are still recorded.
    pub fn stop_ids_for_trip(&self, trip_id: &str) -> TripStops {
        match self.trips.get(trip_id) {
            Some(stops) => stops.clone(),
            None => {
                debug!("🗺️ no ground-truth stops for trip {trip_id}");
                TripStops::new(Vec::new(), self.sequence_base)
            }
        }
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_rows_are_sorted_by_their_sequence() -> Result<()> {
        let csv = "trip_id,stop_id,stop_sequence\n\
                   T1,c,2\n\
                   T1,a,0\n\
                   T1,b,1\n\
                   T2,x,0\n";
        let index = GroundTruthIndex::from_reader(csv.as_bytes(), 0)?;
        let stops = index.stop_ids_for_trip("T1");
        assert_eq!(stops.len(), 3);
        assert_eq!(stops.stop_at(0), Some("a"));
        assert_eq!(stops.stop_at(1), Some("b"));
        assert_eq!(stops.stop_at(2), Some("c"));
        assert_eq!(stops.stop_at(3), None);
        assert_eq!(index.trip_count(), 2);
        Ok(())
    }

    #[test]
    fn the_one_where_there_is_no_sequence_column_and_file_order_wins() -> Result<()> {
        let csv = "trip_id,stop_id\nT1,first\nT1,second\n";
        let index = GroundTruthIndex::from_reader(csv.as_bytes(), 1)?;
        let stops = index.stop_ids_for_trip("T1");
        assert_eq!(stops.stop_at(0), None, "below the base is nowhere");
        assert_eq!(stops.stop_at(1), Some("first"));
        assert_eq!(stops.stop_at(2), Some("second"));
        Ok(())
    }

    #[test]
    fn the_one_where_an_unknown_trip_gets_an_empty_map() -> Result<()> {
        let index = GroundTruthIndex::from_reader("trip_id,stop_id\n".as_bytes(), 0)?;
        let stops = index.stop_ids_for_trip("ghost");
        assert!(stops.is_empty());
        assert_eq!(stops.stop_at(0), None);
        Ok(())
    }

    #[test]
    fn the_one_where_the_file_is_real_and_on_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("trip-stop-records.txt");
        std::fs::write(&path, "trip_id,stop_id,stop_sequence\nT9,s0,0\nT9,s1,1\n")?;
        let index = GroundTruthIndex::from_csv_path(&path, 0)?;
        assert_eq!(index.stop_ids_for_trip("T9").stop_at(1), Some("s1"));
        assert!(GroundTruthIndex::from_csv_path(&dir.path().join("nope.txt"), 0).is_err());
        Ok(())
    }
}
