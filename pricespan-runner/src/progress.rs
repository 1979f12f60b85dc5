//! Progress callbacks for a running batch.

use pricespan_core::domain::Market;

/// Totals reported once a batch has joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duplicates: usize,
}

/// Observer for a dispatch batch. Called from worker threads.
pub trait ScanProgress: Send + Sync {
    /// Called once before any task starts.
    fn on_batch_start(&self, market: Market, total: usize);

    /// Called after each task finishes. `completed` comes from one atomic
    /// counter, so every value in `1..=total` is reported exactly once.
    fn on_symbol_done(&self, code: &str, completed: usize, total: usize, ok: bool);

    fn on_batch_complete(&self, market: Market, counts: &BatchCounts);
}

/// Reports through `log`: a line every `every` completions at info level,
/// every completion at trace level.
pub struct LogProgress {
    every: usize,
}

impl LogProgress {
    /// Log an info line every `every` completions (at least 1).
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ScanProgress for LogProgress {
    fn on_batch_start(&self, market: Market, total: usize) {
        log::info!("{market}: dispatching {total} symbols");
    }

    fn on_symbol_done(&self, code: &str, completed: usize, total: usize, ok: bool) {
        log::trace!("[{completed}/{total}] {code} {}", if ok { "ok" } else { "failed" });
        if completed % self.every == 0 || completed == total {
            log::info!("progress: {completed}/{total}");
        }
    }

    fn on_batch_complete(&self, market: Market, counts: &BatchCounts) {
        log::info!(
            "{market}: {}/{} succeeded, {} failed, {} duplicate rows dropped",
            counts.succeeded,
            counts.total,
            counts.failed,
            counts.duplicates
        );
    }
}

/// Discards every event.
pub struct SilentProgress;

impl ScanProgress for SilentProgress {
    fn on_batch_start(&self, _market: Market, _total: usize) {}
    fn on_symbol_done(&self, _code: &str, _completed: usize, _total: usize, _ok: bool) {}
    fn on_batch_complete(&self, _market: Market, _counts: &BatchCounts) {}
}
