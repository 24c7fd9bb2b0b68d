//! Periodic background task handle with an explicit lifecycle.
//!
//! Replaces ambient interval scheduling: the owning engine hands out a
//! `Ticker`, the caller decides when it starts and stops.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

type BoxFut = Pin<Box<dyn Future<Output = ()> + Send>>;

pub struct Ticker {
    name: &'static str,
    period: Duration,
    task: Arc<dyn Fn() -> BoxFut + Send + Sync>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new<F, Fut>(name: &'static str, period: Duration, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            period,
            task: Arc::new(move || Box::pin(task()) as BoxFut),
            handle: None,
        }
    }

    /// Spawn the interval loop. No-op if already running.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        let name = self.name;
        let period = self.period;
        let task = self.task.clone();

        debug!("starting {} ticker (every {:?})", name, period);
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                task().await;
            }
        }));
    }

    /// Abort the loop. Safe to call when not running.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("stopping {} ticker", self.name);
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let mut ticker = Ticker::new("test", Duration::from_secs(10), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(!ticker.is_running());
        ticker.start();
        tokio::time::sleep(Duration::from_secs(25)).await;
        ticker.stop();
        assert!(!ticker.is_running());

        // First tick fires immediately, then at 10s and 20s.
        let ticks = count.load(Ordering::SeqCst);
        assert!(ticks >= 3, "expected >= 3 ticks, got {}", ticks);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), ticks, "ticks after stop");
    }
}
