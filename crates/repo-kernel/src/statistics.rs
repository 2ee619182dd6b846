//! Periodically sampled repository-wide counters (spec §4.10
//! "RepositoryStatistics"). Hot-path increments are plain atomics;
//! `snapshot()` is the only place that reads them together to build a
//! consistent-enough view for the periodic sampler to log.
//!
//! Durations are tracked as accumulated nanoseconds alongside an operation
//! count; `snapshot()` derives the average by dividing the two rather than
//! keeping a running average field that would need its own synchronization.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Sampler tick: fixed rather than configurable, since the sample itself
/// never affects repository behavior and a fixed cadence keeps the
/// statistics log comparable across deployments.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub sessions_created: u64,
    pub sessions_active: i64,
    pub workspaces_active: i64,
    pub saves_committed: u64,
    pub session_reads: u64,
    pub session_read_nanos: u64,
    pub session_writes: u64,
    pub session_write_nanos: u64,
    pub bundle_reads: u64,
    pub bundle_read_nanos: u64,
    pub bundle_writes: u64,
    pub bundle_write_nanos: u64,
    pub queries_executed: u64,
}

impl StatisticsSnapshot {
    pub fn avg_session_read_nanos(&self) -> f64 {
        avg(self.session_read_nanos, self.session_reads)
    }

    pub fn avg_session_write_nanos(&self) -> f64 {
        avg(self.session_write_nanos, self.session_writes)
    }

    pub fn avg_bundle_read_nanos(&self) -> f64 {
        avg(self.bundle_read_nanos, self.bundle_reads)
    }

    pub fn avg_bundle_write_nanos(&self) -> f64 {
        avg(self.bundle_write_nanos, self.bundle_writes)
    }
}

fn avg(total_nanos: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total_nanos as f64 / count as f64
    }
}

#[derive(Default)]
pub struct RepositoryStatistics {
    sessions_created: AtomicU64,
    sessions_active: AtomicI64,
    workspaces_active: AtomicI64,
    saves_committed: AtomicU64,
    session_reads: AtomicU64,
    session_read_nanos: AtomicU64,
    session_writes: AtomicU64,
    session_write_nanos: AtomicU64,
    bundle_reads: AtomicU64,
    bundle_read_nanos: AtomicU64,
    bundle_writes: AtomicU64,
    bundle_write_nanos: AtomicU64,
    queries_executed: AtomicU64,
}

impl RepositoryStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_session_login(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_logout(&self) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_workspace_initialized(&self) {
        self.workspaces_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_workspace_disposed(&self) {
        self.workspaces_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_save(&self) {
        self.saves_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_read(&self, elapsed: Duration) {
        self.session_reads.fetch_add(1, Ordering::Relaxed);
        self.session_read_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_session_write(&self, elapsed: Duration) {
        self.session_writes.fetch_add(1, Ordering::Relaxed);
        self.session_write_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_bundle_read(&self, elapsed: Duration) {
        self.bundle_reads.fetch_add(1, Ordering::Relaxed);
        self.bundle_read_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_bundle_write(&self, elapsed: Duration) {
        self.bundle_writes.fetch_add(1, Ordering::Relaxed);
        self.bundle_write_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_query(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Time `f`, recording it as a session read. Convenience for call sites
    /// that would otherwise need to straddle an `Instant::now()` pair
    /// themselves.
    pub fn time_session_read<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.record_session_read(start.elapsed());
        result
    }

    /// Time `f`, recording it as a session write.
    pub fn time_session_write<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.record_session_write(start.elapsed());
        result
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            workspaces_active: self.workspaces_active.load(Ordering::Relaxed),
            saves_committed: self.saves_committed.load(Ordering::Relaxed),
            session_reads: self.session_reads.load(Ordering::Relaxed),
            session_read_nanos: self.session_read_nanos.load(Ordering::Relaxed),
            session_writes: self.session_writes.load(Ordering::Relaxed),
            session_write_nanos: self.session_write_nanos.load(Ordering::Relaxed),
            bundle_reads: self.bundle_reads.load(Ordering::Relaxed),
            bundle_read_nanos: self.bundle_read_nanos.load(Ordering::Relaxed),
            bundle_writes: self.bundle_writes.load(Ordering::Relaxed),
            bundle_write_nanos: self.bundle_write_nanos.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
        }
    }

    /// Spawn a task that logs a snapshot every [`SAMPLE_INTERVAL`] until
    /// `cancellation` fires. Purely observational: no state here affects
    /// repository behavior.
    pub fn spawn_sampler(self: std::sync::Arc<Self>, cancellation: CancellationToken) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    _ = tokio::time::sleep(SAMPLE_INTERVAL) => {
                        let snapshot = self.snapshot();
                        tracing::info!(
                            sessions_active = snapshot.sessions_active,
                            workspaces_active = snapshot.workspaces_active,
                            saves_committed = snapshot.saves_committed,
                            avg_session_read_nanos = snapshot.avg_session_read_nanos(),
                            avg_session_write_nanos = snapshot.avg_session_write_nanos(),
                            avg_bundle_read_nanos = snapshot.avg_bundle_read_nanos(),
                            avg_bundle_write_nanos = snapshot.avg_bundle_write_nanos(),
                            queries_executed = snapshot.queries_executed,
                            "repository statistics sample"
                        );
                    }
                }
            }
        });
    }
}
