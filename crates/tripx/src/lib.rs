//! 🚌 tripx -- watches a live transit feed and writes down where every trip actually went.
//!
//! 🎬 *[a bus skips three stops on the live map. somebody, somewhere, wants to know when it
//! really passed them.]*
//!
//! Poll the trip-update feed, fold each sighting into a per-trip time series (filling in the
//! stops the feed skipped), hand finished trips to a batch, write batches as JSON until the
//! clock or the disk runs out.

pub mod app_config;
pub mod collector;
pub mod export;
pub mod feed;
pub mod ground_truth;
pub mod progress;
pub mod trips;

use anyhow::{Context, Result};
use tracing::info;

use crate::app_config::AppConfig;
use crate::collector::{CollectionSummary, Collector};
use crate::export::{BatchExporter, FileSink, SinkBackend, StorageGuard};
use crate::feed::{FeedBackend, HttpFeed};
use crate::ground_truth::GroundTruthIndex;

/// 🚀 Wire up the real feed, the real disk, and run one collection to the end.
pub async fn run(app_config: AppConfig) -> Result<CollectionSummary> {
    let AppConfig {
        feed,
        ground_truth,
        collection,
    } = app_config;

    let ground_truth =
        GroundTruthIndex::from_csv_path(&ground_truth.file_name, ground_truth.sequence_base)
            .context("💀 Could not load the ground-truth stop lists. No timetable, no gap filling.")?;

    let sink = FileSink::new(&collection.save_path).await.context(format!(
        "💀 Could not prepare the save directory '{}'",
        collection.save_path.display()
    ))?;
    let guard = StorageGuard::new(&collection.save_path, collection.max_storage_bytes);
    let exporter = BatchExporter::new(guard, SinkBackend::File(sink));

    let feed = HttpFeed::new(feed)
        .await
        .context("💀 Could not set up the trip-update feed")?;

    info!(
        "🗺️ Ground truth covers {} trips. Let's go.",
        ground_truth.trip_count()
    );
    let mut collector =
        Collector::new(collection, FeedBackend::Http(feed), ground_truth, exporter);
    collector.run().await
}
