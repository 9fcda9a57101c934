//! Transfer statistics

use crate::utils::format_bytes;

/// Counters for one transfer run, or one worker's share of it.
///
/// Workers accumulate a private instance each; the queue folds them
/// together after every worker has finished. Safety comes from that
/// collection discipline (task results over a join barrier), not from
/// atomics: there is never more than one writer per instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Objects uploaded
    pub objects: u64,
    /// Bytes uploaded
    pub object_bytes: u64,
    /// Jobs skipped by policy
    pub skipped: u64,
    /// Bytes not transferred because of skips
    pub skipped_bytes: u64,
    /// Jobs that failed
    pub failed: u64,
}

impl Stats {
    /// Count one uploaded object
    pub fn record_uploaded(&mut self, bytes: u64) {
        self.objects += 1;
        self.object_bytes += bytes;
    }

    /// Count one skipped job
    pub fn record_skipped(&mut self, bytes: u64) {
        self.skipped += 1;
        self.skipped_bytes += bytes;
    }

    /// Count one failed job
    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    /// Fold another worker's counters into this one. Pure addition, so
    /// merge order never changes the totals.
    pub fn merge(&mut self, other: &Stats) {
        self.objects += other.objects;
        self.object_bytes += other.object_bytes;
        self.skipped += other.skipped;
        self.skipped_bytes += other.skipped_bytes;
        self.failed += other.failed;
    }

    /// Total jobs accounted for
    pub fn total(&self) -> u64 {
        self.objects + self.skipped + self.failed
    }

    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        format!(
            "uploaded {} objects ({}), skipped {} ({}), failed {}",
            self.objects,
            format_bytes(self.object_bytes),
            self.skipped,
            format_bytes(self.skipped_bytes),
            self.failed,
        )
    }
}
