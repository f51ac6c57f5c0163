//! Stall reporting for long-lived reads.
//!
//! The read loop stamps a [`ReadClock`] after every successful read. A
//! [`StallWatchdog`] ticks on its own task and reports the time since the last
//! stamp. The two share nothing but one atomic.

use crate::dispatch::CompletionSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Last-read timestamp shared between a read loop and its watchdog.
#[derive(Debug, Clone)]
pub struct ReadClock {
    origin: Instant,
    last_read_ms: Arc<AtomicU64>,
}

impl ReadClock {
    /// Start a clock; "now" counts as the last read.
    pub fn new() -> Self {
        ReadClock {
            origin: Instant::now(),
            last_read_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a successful read.
    pub fn mark_read(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_read_ms.store(now, Ordering::Release);
    }

    /// Time since the last recorded read.
    pub fn since_last_read(&self) -> Duration {
        let now = self.origin.elapsed().as_millis() as u64;
        let last = self.last_read_ms.load(Ordering::Acquire);
        Duration::from_millis(now.saturating_sub(last))
    }
}

impl Default for ReadClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic stall reporter. Dropping the guard stops the ticker.
pub struct StallWatchdog {
    handle: JoinHandle<()>,
}

impl StallWatchdog {
    /// Report `clock.since_last_read()` to `on_stall` every `interval`, posted
    /// through `sink`.
    pub fn spawn<F>(
        clock: ReadClock,
        interval: Duration,
        sink: Arc<dyn CompletionSink>,
        on_stall: Arc<F>,
    ) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            // The first tick fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let stalled = clock.since_last_read();
                let callback = on_stall.clone();
                sink.post(Box::new(move || callback(stalled)));
            }
        });
        StallWatchdog { handle }
    }

    /// Stop the ticker.
    pub fn stop(self) {}
}

impl Drop for StallWatchdog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::InlineSink;
    use parking_lot::Mutex;
    use tokio::time::sleep;

    #[test]
    fn test_clock_resets_on_read() {
        let clock = ReadClock::new();
        std::thread::sleep(Duration::from_millis(15));
        assert!(clock.since_last_read() >= Duration::from_millis(10));
        clock.mark_read();
        assert!(clock.since_last_read() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_reports_elapsed_since_last_read() {
        let clock = ReadClock::new();
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();

        let watchdog = StallWatchdog::spawn(
            clock.clone(),
            Duration::from_millis(10),
            Arc::new(InlineSink),
            Arc::new(move |d: Duration| sink.lock().push(d)),
        );

        sleep(Duration::from_millis(55)).await;
        watchdog.stop();

        let seen = reports.lock().clone();
        assert!(seen.len() >= 2, "expected several reports, got {}", seen.len());
        // Nothing was read, so the stall grows.
        assert!(seen.last() >= seen.first());
    }

    #[tokio::test]
    async fn test_drop_stops_reports() {
        let count = Arc::new(Mutex::new(0usize));
        let c = count.clone();
        {
            let _watchdog = StallWatchdog::spawn(
                ReadClock::new(),
                Duration::from_millis(5),
                Arc::new(InlineSink),
                Arc::new(move |_: Duration| *c.lock() += 1),
            );
            sleep(Duration::from_millis(30)).await;
        }
        sleep(Duration::from_millis(5)).await;
        let after_drop = *count.lock();
        sleep(Duration::from_millis(40)).await;
        assert_eq!(*count.lock(), after_drop);
    }

    #[tokio::test]
    async fn test_zero_interval_still_ticks() {
        let count = Arc::new(Mutex::new(0usize));
        let c = count.clone();
        let watchdog = StallWatchdog::spawn(
            ReadClock::new(),
            Duration::ZERO,
            Arc::new(InlineSink),
            Arc::new(move |_: Duration| *c.lock() += 1),
        );
        sleep(Duration::from_millis(20)).await;
        watchdog.stop();
        assert!(*count.lock() > 0);
    }
}
