//! Helpers for the parser statistics in [`PerfEventStats`].

use crate::proto::{PerfEvent, PerfEventPayload, PerfEventStats};

/// Counts a retained event in the per-kind counters.
pub fn count_event(stats: &mut PerfEventStats, event: &PerfEvent) {
    match &event.event {
        Some(PerfEventPayload::Sample(_)) => stats.num_sample_events += 1,
        Some(PerfEventPayload::Mmap(_)) => stats.num_mmap_events += 1,
        Some(PerfEventPayload::Comm(_)) => stats.num_comm_events += 1,
        Some(PerfEventPayload::Fork(_)) => stats.num_fork_events += 1,
        Some(PerfEventPayload::Exit(_)) => stats.num_exit_events += 1,
        _ => {}
    }
}

/// Adds the counters of `other` to `stats`.
pub fn merge(stats: &mut PerfEventStats, other: &PerfEventStats) {
    stats.num_events_read += other.num_events_read;
    stats.num_sample_events += other.num_sample_events;
    stats.num_mmap_events += other.num_mmap_events;
    stats.num_comm_events += other.num_comm_events;
    stats.num_fork_events += other.num_fork_events;
    stats.num_exit_events += other.num_exit_events;
    stats.num_unknown_events_skipped += other.num_unknown_events_skipped;
    stats.num_filtered_events += other.num_filtered_events;
    stats.num_size_mismatches += other.num_size_mismatches;
    stats.num_mmaps_skipped += other.num_mmaps_skipped;
    stats.num_compressed_events += other.num_compressed_events;
    stats.num_unknown_features_skipped += other.num_unknown_features_skipped;
}

/// Logs a one-line summary of a finished read.
pub fn log_summary(stats: &PerfEventStats) {
    log::debug!(
        "Read {} records: {} samples, {} mmaps, {} comms, {} forks, {} exits",
        stats.num_events_read,
        stats.num_sample_events,
        stats.num_mmap_events,
        stats.num_comm_events,
        stats.num_fork_events,
        stats.num_exit_events
    );
    let anomalies = stats.num_unknown_events_skipped
        + stats.num_size_mismatches
        + stats.num_mmaps_skipped
        + stats.num_unknown_features_skipped;
    if anomalies != 0 {
        log::warn!(
            "Skipped {} unknown records, {} mmaps and {} unknown features; {} records had a size mismatch",
            stats.num_unknown_events_skipped,
            stats.num_mmaps_skipped,
            stats.num_unknown_features_skipped,
            stats.num_size_mismatches
        );
    }
}
