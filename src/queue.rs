use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Single-lane FIFO for outbound provider calls.
///
/// Jobs run one at a time in arrival order (tokio's mutex is fair), and the
/// start of a job is never closer than `min_interval` to the start of the
/// previous one. Each job must bound its own duration; the lane is held until
/// the job completes.
pub struct RequestQueue {
    min_interval_ms: AtomicU64,
    lane: AsyncMutex<Option<Instant>>,
    depth: AtomicUsize,
}

impl RequestQueue {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval_ms: AtomicU64::new(min_interval.as_millis() as u64),
            lane: AsyncMutex::new(None),
            depth: AtomicUsize::new(0),
        }
    }

    pub fn set_min_interval(&self, interval: Duration) {
        self.min_interval_ms
            .store(interval.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms.load(Ordering::SeqCst))
    }

    /// Jobs waiting for the lane plus the one currently running.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub async fn run<F, Fut, T>(&self, job: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _pending = DepthGuard::enter(&self.depth);
        let mut last_dispatch = self.lane.lock().await;
        let interval = self.min_interval();
        if let Some(prev) = *last_dispatch {
            let elapsed = prev.elapsed();
            if elapsed < interval {
                trace!(wait = ?(interval - elapsed), "request queue throttling dispatch");
                sleep(interval - elapsed).await;
            }
        }
        *last_dispatch = Some(Instant::now());
        job().await
    }
}

struct DepthGuard<'a>(&'a AtomicUsize);

impl<'a> DepthGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn spaces_dispatches_by_min_interval() {
        let queue = Arc::new(RequestQueue::new(Duration::from_millis(1_100)));
        let starts = Arc::new(Mutex::new(Vec::new()));

        let jobs = (0..3).map(|idx| {
            let queue = queue.clone();
            let starts = starts.clone();
            async move {
                queue
                    .run(move || async move {
                        starts.lock().push((idx, Instant::now()));
                        sleep(Duration::from_millis(300)).await;
                    })
                    .await
            }
        });
        futures_util::future::join_all(jobs).await;

        let starts = starts.lock();
        let order: Vec<usize> = starts.iter().map(|(idx, _)| *idx).collect();
        assert_eq!(order, vec![0, 1, 2]);
        for pair in starts.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(1_100));
        }
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn never_overlaps_long_jobs() {
        let queue = Arc::new(RequestQueue::new(Duration::from_millis(10)));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..4).map(|_| {
            let queue = queue.clone();
            let running = running.clone();
            let peak = peak.clone();
            async move {
                queue
                    .run(move || async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        sleep(Duration::from_millis(500)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }
        });
        futures_util::future::join_all(jobs).await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn picks_up_interval_changes_between_jobs() {
        let queue = RequestQueue::new(Duration::from_millis(1_100));
        queue.run(|| async {}).await;

        queue.set_min_interval(Duration::from_millis(200));
        assert_eq!(queue.min_interval(), Duration::from_millis(200));
        let before = Instant::now();
        queue.run(|| async {}).await;
        assert!(Instant::now() - before <= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn first_dispatch_is_immediate() {
        let queue = RequestQueue::new(Duration::from_secs(5));
        let before = Instant::now();
        let value = queue.run(|| async { 42 }).await;
        assert_eq!(value, 42);
        assert_eq!(Instant::now() - before, Duration::ZERO);
    }
}
