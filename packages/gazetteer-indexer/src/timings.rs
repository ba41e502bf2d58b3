//! Per-table write timings and the periodic reporter

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Cumulative write time per table, for the lifetime of an engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableTimings {
    durations: BTreeMap<String, Duration>,
}

impl TableTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, table: &str, elapsed: Duration) {
        *self.durations.entry(table.to_string()).or_default() += elapsed;
    }

    pub fn get(&self, table: &str) -> Option<Duration> {
        self.durations.get(table).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.durations.iter().map(|(name, d)| (name.as_str(), *d))
    }

    pub fn total(&self) -> Duration {
        self.durations.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }
}

/// Background task logging [`TableTimings`] on a fixed interval
///
/// Stops when [`stop`](Self::stop) is called, when the reporter is dropped,
/// or when the run context is cancelled.
pub struct TimingReporter {
    guard: DropGuard,
    handle: JoinHandle<()>,
}

impl TimingReporter {
    pub fn spawn(
        ctx: &CancellationToken,
        timings: Arc<RwLock<TableTimings>>,
        seen: Arc<AtomicUsize>,
        interval: Duration,
    ) -> Self {
        let done = ctx.child_token();
        let stopped = done.clone();
        let started = Instant::now();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

            loop {
                tokio::select! {
                    _ = stopped.cancelled() => break,
                    _ = ticker.tick() => {
                        let timings = timings.read().await;
                        report(&timings, seen.load(Ordering::Relaxed), started.elapsed());
                    }
                }
            }
        });

        Self {
            guard: done.drop_guard(),
            handle,
        }
    }

    /// Signal completion and wait for the task to exit
    pub async fn stop(self) {
        let Self { guard, handle } = self;
        drop(guard);
        if let Err(e) = handle.await {
            warn!("Timing reporter task failed: {}", e);
        }
    }
}

fn report(timings: &TableTimings, seen: usize, elapsed: Duration) {
    for (table, d) in timings.iter() {
        info!(table, count = seen, time = ?d, "Time to index table");
    }
    info!(count = seen, time = ?elapsed, "Time to index all");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timings_accumulate() {
        let mut timings = TableTimings::new();
        assert!(timings.is_empty());

        timings.add("properties", Duration::from_millis(5));
        timings.add("properties", Duration::from_millis(7));
        timings.add("ancestors", Duration::from_millis(1));

        assert_eq!(timings.get("properties"), Some(Duration::from_millis(12)));
        assert_eq!(timings.get("spelunker"), None);
        assert_eq!(timings.total(), Duration::from_millis(13));

        let names: Vec<&str> = timings.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["ancestors", "properties"]);
    }

    #[tokio::test]
    async fn test_reporter_stops_on_signal() {
        let ctx = CancellationToken::new();
        let reporter = TimingReporter::spawn(
            &ctx,
            Arc::new(RwLock::new(TableTimings::new())),
            Arc::new(AtomicUsize::new(0)),
            Duration::from_millis(5),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        reporter.stop().await;
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_reporter_stops_on_cancel() {
        let ctx = CancellationToken::new();
        let reporter = TimingReporter::spawn(
            &ctx,
            Arc::new(RwLock::new(TableTimings::new())),
            Arc::new(AtomicUsize::new(0)),
            Duration::from_secs(3600),
        );

        ctx.cancel();
        let TimingReporter { guard, handle } = reporter;
        handle.await.unwrap();
        drop(guard);
    }

    #[tokio::test]
    async fn test_stop_after_reporter_panicked() {
        let reporter = TimingReporter {
            guard: CancellationToken::new().drop_guard(),
            handle: tokio::spawn(async { panic!("reporter blew up") }),
        };

        tokio::task::yield_now().await;
        reporter.stop().await;
    }
}
