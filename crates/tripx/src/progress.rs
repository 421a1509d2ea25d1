//! 📊 progress.rs -- "Are we there yet?" -- every collection run, every cycle, forever.
//!
//! 🚀 Once per cycle: how many trips are in flight, how many we've saved, how many times we've
//! bothered the API, and how long we've been at it. As a spinner with a comfy table for humans
//! staring at a terminal, and as an `info!` line for humans grepping logs on Monday.
//!
//! ⚠️ Watching this spinner will not make the buses go faster. We've tried.

use std::time::Duration;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// ⏱️ Formats a Duration into MM:SS or HH:MM:SS.
/// If it shows HH:MM:SS, you should probably call your mom. It's been a while.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 🔢 Formats a number with commas. "1000000 trips" → "1,000,000 trips", you're welcome, eyes.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// 📸 One cycle's worth of counters, borrowed from the collector just long enough to print.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot {
    pub ongoing_trips: usize,
    pub trips_saved: usize,
    pub requests: usize,
    pub elapsed: Duration,
    pub run_time: Duration,
}

/// 🌀 The spinner plus its table.
pub struct CollectionProgress {
    progress_bar: ProgressBar,
}

impl std::fmt::Debug for CollectionProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("CollectionProgress").finish()
    }
}

impl CollectionProgress {
    pub fn new(visible: bool) -> Self {
        let progress_bar = if visible {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { progress_bar }
    }

    /// 📡 Report one cycle.
    pub fn observe(&self, snapshot: &ProgressSnapshot) {
        info!(
            "📊 CURRENTLY: duration {:.1}s out of {}s, ongoing trips: {}, saved trips: {}, requests: {}",
            snapshot.elapsed.as_secs_f64(),
            snapshot.run_time.as_secs(),
            snapshot.ongoing_trips,
            snapshot.trips_saved,
            snapshot.requests
        );
        self.progress_bar.set_message(render(snapshot).to_string());
        self.progress_bar.tick();
    }

    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }
}

// 🍽️ two columns, right-aligned, no borders. minimalists. also the borders looked bad.
fn render(snapshot: &ProgressSnapshot) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec![
        Cell::new(format!("{} ongoing", format_number(snapshot.ongoing_trips as u64)))
            .set_alignment(CellAlignment::Right),
        Cell::new(format!("{} saved", format_number(snapshot.trips_saved as u64)))
            .set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new(format!("{} requests", format_number(snapshot.requests as u64)))
            .set_alignment(CellAlignment::Right),
        Cell::new(format!(
            "{} / {}",
            format_duration(snapshot.elapsed),
            format_duration(snapshot.run_time)
        ))
        .set_alignment(CellAlignment::Right),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_numbers_get_their_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn the_one_where_durations_grow_an_hours_column_when_they_need_it() {
        assert_eq!(format_duration(Duration::from_secs(59)), "00:59");
        assert_eq!(format_duration(Duration::from_secs(125)), "02:05");
        assert_eq!(format_duration(Duration::from_secs(86_400 + 61)), "24:01:01");
    }

    #[test]
    fn the_one_where_the_table_mentions_every_counter() {
        let table = render(&ProgressSnapshot {
            ongoing_trips: 12,
            trips_saved: 3_400,
            requests: 77,
            elapsed: Duration::from_secs(130),
            run_time: Duration::from_secs(3_600),
        })
        .to_string();
        assert!(table.contains("12 ongoing"));
        assert!(table.contains("3,400 saved"));
        assert!(table.contains("77 requests"));
        assert!(table.contains("02:10 / 01:00:00"));
    }
}
