//! 🏎️ How fast can we fill in the stops a bus skipped?
//!
//! Two hot paths: a single record jumping across a gap of N stops, and a whole registry
//! folding a realistic cycle (a few hundred trips, most of them one or two stops further along).

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;
use tripx::feed::FeedEntity;
use tripx::ground_truth::{GroundTruthIndex, TripStops};
use tripx::trips::{TripRecord, TripRegistry};

fn entity(trip_id: &str, stop_sequence: u32, time: i64, delay: i64) -> FeedEntity {
    serde_json::from_value(json!({
        "trip_update": {
            "trip": { "trip_id": trip_id, "route_id": "83", "direction_id": 1 },
            "vehicle": { "id": "2240" },
            "stop_time_update": {
                "stop_sequence": stop_sequence,
                "stop_id": format!("stop-{stop_sequence}"),
                "arrival": { "time": time, "delay": delay }
            }
        }
    }))
    .expect("💀 bench fixture is malformed")
}

fn stops(n: u32) -> TripStops {
    TripStops::new((0..=n).map(|i| format!("gt-{i}")).collect(), 0)
}

fn bench_gap_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("trip_record/update");
    for gap in [1u32, 5, 20, 80] {
        let first = entity("T", 0, 1_000, 0);
        let jump = entity("T", gap, 1_000 + 60 * i64::from(gap), 90);
        let ground_truth = stops(gap);
        group.bench_with_input(BenchmarkId::from_parameter(gap), &gap, |b, _| {
            b.iter(|| {
                let mut record = TripRecord::create(black_box(&first), ground_truth.clone());
                black_box(record.update(black_box(&jump)));
            })
        });
    }
    group.finish();
}

fn bench_registry_cycle(c: &mut Criterion) {
    let trips = 400u32;
    let mut csv = String::from("trip_id,stop_id,stop_sequence\n");
    for t in 0..trips {
        for s in 0..40 {
            csv.push_str(&format!("trip-{t},gt-{s},{s}\n"));
        }
    }
    let index = GroundTruthIndex::from_reader(csv.as_bytes(), 0).expect("💀 bench csv is broken");

    let cycle_one: Vec<_> = (0..trips)
        .map(|t| entity(&format!("trip-{t}"), t % 10, 1_000, 0))
        .collect();
    // -- 🚌 most trips move one or two stops, every tenth one goes missing
    let cycle_two: Vec<_> = (0..trips)
        .filter(|t| t % 10 != 0)
        .map(|t| entity(&format!("trip-{t}"), t % 10 + 1 + t % 2, 1_150, 30))
        .collect();

    c.bench_function("trip_registry/process_cycle", |b| {
        b.iter(|| {
            let mut registry = TripRegistry::new(index.clone());
            registry.process_cycle(black_box(&cycle_one));
            black_box(registry.process_cycle(black_box(&cycle_two)));
        })
    });
}

criterion_group!(benches, bench_gap_fill, bench_registry_cycle);
criterion_main!(benches);
