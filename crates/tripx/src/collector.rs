//! 🔄 The collection loop -- poll, fold, finalize, flush, wait, repeat.
//!
//! 🎬 *[a clock on the wall. a feed on the wire. a directory slowly filling with JSON.]*
//!
//! One cycle at a time, one request at a time, one thread's worth of attention. The loop owns
//! the registry, the aggregator, the exporter and every counter; nothing here is shared and
//! nothing needs a lock.
//!
//! States: `Running` until the time budget runs out, then `Stopping` while every trip still in
//! flight is forced out and the last partial batch is written, then `Terminated`. If the storage
//! guard ever refuses a flush, the loop jumps straight to `Aborted` and stops. Anything that was
//! only in memory at that point is gone. We log how much.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use tokio::time::{Instant, sleep_until};
use tracing::{info, warn};

use crate::export::{BatchAggregator, BatchExporter, FlushOutcome};
use crate::feed::{FeedBackend, FeedSource};
use crate::ground_truth::GroundTruthIndex;
use crate::progress::{CollectionProgress, ProgressSnapshot};
use crate::trips::{TripRecord, TripRegistry};

/// ⏱️ How long, how often, where to, and how much.
#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    /// ⏳ Total time budget for the run.
    pub run_time_secs: u64,
    /// 🐢 Minimum time between the starts of two consecutive requests.
    #[serde(default = "default_request_delay_secs")]
    pub request_delay_secs: u64,
    #[serde(default = "default_save_path")]
    pub save_path: PathBuf,
    /// 🧺 Finished trips per batch file.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// 🚧 Quota for everything under `save_path`, in bytes.
    #[serde(default = "default_max_storage_bytes")]
    pub max_storage_bytes: u64,
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

fn default_request_delay_secs() -> u64 {
    120
}

fn default_save_path() -> PathBuf {
    PathBuf::from("SavedTrips")
}

fn default_max_batch_size() -> usize {
    100
}

// -- 📦 1 GB. somebody's laptop is going to thank us
fn default_max_storage_bytes() -> u64 {
    1_000_000_000
}

fn default_show_progress() -> bool {
    true
}

impl CollectionConfig {
    pub fn run_time(&self) -> Duration {
        Duration::from_secs(self.run_time_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_secs(self.request_delay_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Running,
    Stopping,
    Terminated,
    Aborted,
}

/// 🏁 How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// Time budget used up, everything written.
    Completed,
    /// The save directory hit its quota.
    Aborted { used_bytes: u64, max_bytes: u64 },
}

/// 🧾 The end-of-run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub outcome: CollectionOutcome,
    /// Trips handed to the aggregator.
    pub trips_finalized: usize,
    /// Trips that made it into a batch file.
    pub trips_written: usize,
    pub batches_written: usize,
    pub requests: usize,
    pub elapsed: Duration,
    /// Trips lost to an abort: in the aggregator, mid hand-off, or still being tracked.
    pub discarded_trips: usize,
}

// -- 🚫 internal: a flush was refused somewhere down the line
#[derive(Debug, Clone, Copy)]
struct Refusal {
    used_bytes: u64,
    max_bytes: u64,
    in_flight: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleOutcome {
    Continue,
    Refused,
}

/// 🚌 The thing that actually runs. Owns everything, shares nothing.
#[derive(Debug)]
pub struct Collector {
    config: CollectionConfig,
    feed: FeedBackend,
    pub(crate) registry: TripRegistry,
    pub(crate) aggregator: BatchAggregator,
    exporter: BatchExporter,
    progress: CollectionProgress,
    state: CollectionState,
    started: Instant,
    requests: usize,
    trips_finalized: usize,
    refusal: Option<Refusal>,
}

impl Collector {
    pub fn new(
        config: CollectionConfig,
        feed: FeedBackend,
        ground_truth: GroundTruthIndex,
        exporter: BatchExporter,
    ) -> Self {
        Self {
            aggregator: BatchAggregator::new(config.max_batch_size),
            progress: CollectionProgress::new(config.show_progress),
            registry: TripRegistry::new(ground_truth),
            config,
            feed,
            exporter,
            state: CollectionState::Running,
            started: Instant::now(),
            requests: 0,
            trips_finalized: 0,
            refusal: None,
        }
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    /// 🚀 Run until the time budget is spent or the disk is full, whichever comes first.
    ///
    /// `Err` only for things that are actually broken (an unreadable feed body, a failed
    /// write). Running out of quota is an outcome, not an error.
    pub async fn run(&mut self) -> Result<CollectionSummary> {
        self.started = Instant::now();
        self.state = CollectionState::Running;
        let run_time = self.config.run_time();
        info!(
            "🚀 Collecting for {}s, at most one request every {}s, saving to {}",
            run_time.as_secs(),
            self.config.request_delay_secs,
            self.config.save_path.display()
        );

        while self.started.elapsed() < run_time {
            if self.run_cycle().await? == CycleOutcome::Refused {
                return Ok(self.abort());
            }
        }

        // -- 🧹 time's up: whatever is still on the road is finished now
        self.state = CollectionState::Stopping;
        let remaining = self.registry.drain_all();
        info!("⏰ Time budget spent, finalizing {} ongoing trips", remaining.len());
        if self.absorb_all(remaining).await? == CycleOutcome::Refused {
            return Ok(self.abort());
        }
        if let FlushOutcome::Refused {
            used_bytes,
            max_bytes,
        } = self.aggregator.flush(&mut self.exporter).await?
        {
            self.refusal = Some(Refusal {
                used_bytes,
                max_bytes,
                in_flight: 0,
            });
            return Ok(self.abort());
        }

        self.state = CollectionState::Terminated;
        self.progress.finish();
        let summary = self.summary(CollectionOutcome::Completed, 0);
        info!(
            "🏁 END: saved {} trips from {} requests over {:.1} seconds",
            summary.trips_finalized,
            summary.requests,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    /// 🔄 One poll, one fold, one round of hand-offs, then wait out the rest of the delay.
    pub(crate) async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let cycle_start = Instant::now();
        let entities = self.feed.fetch_updates().await?;
        self.requests += 1;

        let finished = self.registry.process_cycle(&entities);
        if self.absorb_all(finished).await? == CycleOutcome::Refused {
            return Ok(CycleOutcome::Refused);
        }

        // -- 🐢 a floor, not a ceiling: a slow cycle just goes again straight away
        sleep_until(cycle_start + self.config.request_delay()).await;

        self.progress.observe(&ProgressSnapshot {
            ongoing_trips: self.registry.len(),
            trips_saved: self.trips_finalized,
            requests: self.requests,
            elapsed: self.started.elapsed(),
            run_time: self.config.run_time(),
        });
        Ok(CycleOutcome::Continue)
    }

    async fn absorb_all(&mut self, records: Vec<TripRecord>) -> Result<CycleOutcome> {
        let mut records = records.into_iter();
        while let Some(record) = records.next() {
            if let Some(FlushOutcome::Refused {
                used_bytes,
                max_bytes,
            }) = self.aggregator.absorb(record, &mut self.exporter).await?
            {
                self.refusal = Some(Refusal {
                    used_bytes,
                    max_bytes,
                    // -- the one we were holding, plus everyone behind it
                    in_flight: 1 + records.len(),
                });
                return Ok(CycleOutcome::Refused);
            }
            self.trips_finalized += 1;
        }
        Ok(CycleOutcome::Continue)
    }

    fn abort(&mut self) -> CollectionSummary {
        self.state = CollectionState::Aborted;
        self.progress.finish();
        let Refusal {
            used_bytes,
            max_bytes,
            in_flight,
        } = self.refusal.unwrap_or(Refusal {
            used_bytes: 0,
            max_bytes: self.config.max_storage_bytes,
            in_flight: 0,
        });
        let discarded = in_flight + self.aggregator.len() + self.registry.len();
        warn!(
            "💀 END: max storage reached ({used_bytes} of {max_bytes} bytes) with {} trips saved \
             from {} requests over {:.1} seconds. {discarded} trips only in memory were discarded.",
            self.exporter.trips_written(),
            self.requests,
            self.started.elapsed().as_secs_f64()
        );
        self.summary(
            CollectionOutcome::Aborted {
                used_bytes,
                max_bytes,
            },
            discarded,
        )
    }

    fn summary(&self, outcome: CollectionOutcome, discarded_trips: usize) -> CollectionSummary {
        CollectionSummary {
            outcome,
            trips_finalized: self.trips_finalized,
            trips_written: self.exporter.trips_written(),
            batches_written: self.exporter.batches_written(),
            requests: self.requests,
            elapsed: self.started.elapsed(),
            discarded_trips,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::export::{FileSink, InMemorySink, SinkBackend, StorageGuard};
    use crate::feed::InMemoryFeed;
    use crate::feed::entity::tests::entity;
    use crate::trips::SerializedTrip;

    fn config(run_time_secs: u64, max_batch_size: usize, max_storage_bytes: u64) -> CollectionConfig {
        CollectionConfig {
            run_time_secs,
            request_delay_secs: 120,
            save_path: PathBuf::from("unused"),
            max_batch_size,
            max_storage_bytes,
            show_progress: false,
        }
    }

    fn ground_truth() -> GroundTruthIndex {
        let csv = "trip_id,stop_id,stop_sequence\nA,a0,0\nA,a1,1\nA,a2,2\nA,a3,3\n";
        GroundTruthIndex::from_reader(csv.as_bytes(), 0).expect("💀 fixture csv is broken")
    }

    fn collector(
        dir: &tempfile::TempDir,
        config: CollectionConfig,
        feed: InMemoryFeed,
    ) -> (Collector, InMemorySink) {
        let sink = InMemorySink::new();
        let exporter = BatchExporter::new(
            StorageGuard::new(dir.path(), config.max_storage_bytes),
            SinkBackend::InMemory(sink.clone()),
        );
        let collector = Collector::new(config, FeedBackend::InMemory(feed), ground_truth(), exporter);
        (collector, sink)
    }

    async fn all_written(sink: &InMemorySink) -> BTreeMap<String, SerializedTrip> {
        let mut all = BTreeMap::new();
        for (_, payload) in sink.batches().await {
            let batch: BTreeMap<String, SerializedTrip> =
                serde_json::from_str(&payload).expect("💀 batch payload is not valid JSON");
            all.extend(batch);
        }
        all
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_trip_seen_once_is_finished_the_next_cycle() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let feed = InMemoryFeed::new(vec![vec![entity("A", 1, 100, 0)], vec![]]);
        let (mut collector, _sink) = collector(&dir, config(240, 100, u64::MAX), feed);

        assert_eq!(collector.run_cycle().await?, CycleOutcome::Continue);
        assert!(collector.registry.contains("A"));
        assert!(collector.aggregator.is_empty());

        assert_eq!(collector.run_cycle().await?, CycleOutcome::Continue);
        assert!(!collector.registry.contains("A"));
        let a = collector.aggregator.get("A").expect("A should be waiting in the batch");
        assert_eq!(a.series.len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_two_cycles_fit_the_budget_exactly() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let feed = InMemoryFeed::new(vec![vec![entity("A", 1, 100, 0)], vec![]]);
        let (mut collector, sink) = collector(&dir, config(240, 100, u64::MAX), feed);

        let summary = collector.run().await?;
        assert_eq!(summary.outcome, CollectionOutcome::Completed);
        assert_eq!(summary.requests, 2);
        assert_eq!(summary.trips_finalized, 1);
        assert_eq!(summary.trips_written, 1);
        assert_eq!(collector.state(), CollectionState::Terminated);

        let written = all_written(&sink).await;
        assert_eq!(written["A"].series.len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_the_clock_runs_out_and_every_trip_still_gets_saved() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let feed = InMemoryFeed::new(vec![
            vec![entity("A", 0, 0, 0), entity("B", 5, 0, 0)],
            vec![entity("A", 3, 300, 30), entity("B", 6, 200, 0)],
        ]);
        let (mut collector, sink) = collector(&dir, config(240, 100, u64::MAX), feed);

        let summary = collector.run().await?;
        assert_eq!(summary.outcome, CollectionOutcome::Completed);
        assert_eq!(summary.batches_written, 1, "one partial batch at shutdown");
        assert_eq!(summary.trips_written, 2);
        assert!(collector.registry.is_empty());

        let written = all_written(&sink).await;
        assert_eq!(written["A"].series.arrival_time(), &[0, 100, 200, 300]);
        assert_eq!(written["A"].series.stop_id()[2].as_deref(), Some("a2"));
        assert_eq!(written["B"].series.len(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_full_batches_are_written_mid_run() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let first: Vec<_> = ["A", "B", "C", "D", "E"]
            .iter()
            .map(|id| entity(id, 1, 10, 0))
            .collect();
        let feed = InMemoryFeed::new(vec![first, vec![], vec![]]);
        let (mut collector, sink) = collector(&dir, config(360, 2, u64::MAX), feed);

        let summary = collector.run().await?;
        // -- 5 trips, batches of 2: two full batches mid-cycle, the fifth at shutdown
        assert_eq!(summary.batches_written, 3);
        assert_eq!(summary.trips_written, 5);
        assert_eq!(all_written(&sink).await.len(), 5);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_the_delay_counts_from_the_start_of_the_cycle() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let feed = InMemoryFeed::new(vec![]).with_latency(Duration::from_secs(30));
        let (mut collector, _sink) = collector(&dir, config(600, 100, u64::MAX), feed);

        let summary = collector.run().await?;
        // -- cycles start at 0, 120, 240, 360, 480. if the delay stacked on top of the
        // -- 30s request it would be 0, 150, 300, 450 instead.
        assert_eq!(summary.requests, 5);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_slow_cycle_goes_again_immediately() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let feed = InMemoryFeed::new(vec![]).with_latency(Duration::from_secs(200));
        let (mut collector, _sink) = collector(&dir, config(500, 100, u64::MAX), feed);

        let summary = collector.run().await?;
        // -- 0, 200, 400: each one starts the moment the last one finished
        assert_eq!(summary.requests, 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_the_disk_is_full_and_the_run_aborts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("previous-run.json"), vec![b'x'; 50])?;
        let exporter = BatchExporter::new(
            StorageGuard::new(dir.path(), 50),
            SinkBackend::File(FileSink::new(dir.path()).await?),
        );
        let feed = InMemoryFeed::new(vec![
            vec![entity("A", 0, 0, 0), entity("B", 0, 0, 0), entity("C", 0, 0, 0)],
            vec![],
        ]);
        let mut collector = Collector::new(
            config(3_600, 1, 50),
            FeedBackend::InMemory(feed),
            ground_truth(),
            exporter,
        );

        let summary = collector.run().await?;
        assert_eq!(
            summary.outcome,
            CollectionOutcome::Aborted {
                used_bytes: 50,
                max_bytes: 50
            }
        );
        assert_eq!(collector.state(), CollectionState::Aborted);
        assert_eq!(summary.requests, 2, "stopped on the cycle that hit the quota");
        // -- A sat in the batch, B was mid hand-off, C never got its turn
        assert_eq!(summary.trips_finalized, 1);
        assert_eq!(summary.discarded_trips, 3);
        assert_eq!(summary.batches_written, 0);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1, "no new file written");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_the_quota_bites_on_the_final_flush() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("previous-run.json"), vec![b'x'; 10])?;
        let feed = InMemoryFeed::new(vec![vec![entity("A", 0, 0, 0)]]);
        let (mut collector, sink) = collector(&dir, config(120, 100, 10), feed);

        let summary = collector.run().await?;
        assert!(matches!(summary.outcome, CollectionOutcome::Aborted { .. }));
        assert_eq!(summary.discarded_trips, 1);
        assert!(sink.batches().await.is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_nothing_ever_shows_up_and_nothing_is_written() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // -- 🎯 zero quota: any flush attempt would be refused, so Completed proves none happened
        let (mut collector, sink) = collector(&dir, config(240, 100, 0), InMemoryFeed::default());

        let summary = collector.run().await?;
        assert_eq!(summary.outcome, CollectionOutcome::Completed);
        assert_eq!(summary.requests, 2);
        assert!(sink.batches().await.is_empty());
        Ok(())
    }
}
