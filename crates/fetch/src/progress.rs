use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

/// How often a running episode download reports progress.
pub const TICK: Duration = Duration::from_secs(1);

/// Snapshot of one episode download.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeProgress {
    pub downloaded: usize,
    pub total: usize,
    pub elapsed: Duration,
}
impl EpisodeProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.downloaded as f64 / self.total as f64 * 100.0
    }

    /// Images per second so far.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.downloaded as f64 / secs
    }
}

/// Receives episode progress; called from a background task.
pub type ProgressSink = Arc<dyn Fn(EpisodeProgress) + Send + Sync>;

/// Ignores every update.
pub fn no_progress() -> ProgressSink {
    Arc::new(|_| {})
}

/// Reports a shared download counter every [`TICK`] until dropped.
pub(crate) struct Ticker {
    handle: JoinHandle<()>,
}
impl Ticker {
    pub(crate) fn start(counter: Arc<AtomicUsize>, total: usize, sink: ProgressSink) -> Self {
        let started = Instant::now();
        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(started + TICK, TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let progress = EpisodeProgress {
                    downloaded: counter.load(Ordering::Relaxed),
                    total,
                    elapsed: started.elapsed(),
                };
                debug!(
                    downloaded = progress.downloaded,
                    total,
                    rate = format!("{:.2}", progress.rate()),
                    "Downloading images"
                );
                sink(progress);
            }
        });
        Self { handle }
    }
}
impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
