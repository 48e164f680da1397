//! Background expiration sweep
//!
//! Every tick, one store picked at random gives up a bounded number of its
//! expired entries. Lazy expiry catches whatever the sweep has not reached.

use crate::cache::Cache;
use crate::config::CacheConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle on the running sweep task
///
/// Dropping the handle cancels the task; `stop` also waits for it.
pub struct Sweeper {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Start sweeping `cache` every `interval`, at most `limit` entries per tick
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(cache: Arc<Cache>, interval: Duration, limit: usize) -> Self {
        let token = CancellationToken::new();
        let interval = interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(Self::run(cache, interval, limit, token.clone()));
        Sweeper {
            token,
            handle: Some(handle),
        }
    }

    pub fn from_config(cache: Arc<Cache>, config: &CacheConfig) -> Self {
        Self::spawn(cache, config.sweep_interval(), config.sweep_limit)
    }

    /// Signal the task and wait for it to finish its current tick
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Sweeper task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    async fn run(cache: Arc<Cache>, interval: Duration, limit: usize, token: CancellationToken) {
        info!("Sweeper started (every {:?}, up to {} keys)", interval, limit);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    // blocking, but `limit` bounds the time spent on this worker
                    let (kind, removed) = cache.sweep_random(limit);
                    if removed > 0 {
                        debug!("Swept {} expired {} keys", removed, kind);
                    }
                }
            }
        }

        info!("Sweeper stopped");
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KeyType;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_sweeper_reclaims_expired_keys() {
        let cache = Arc::new(Cache::new());
        for kind in KeyType::ALL {
            let key = format!("tmp:{}", kind);
            match kind {
                KeyType::String => cache.set(key.clone(), "v").unwrap(),
                KeyType::List => cache.rpush(key.clone(), "v").unwrap(),
                KeyType::Hash => cache.hset(key.clone(), "f", "v").unwrap(),
                KeyType::Set => cache.sadd(key.clone(), "v").unwrap(),
                KeyType::SortedSet => cache.zadd(key.clone(), "v", 1.0).unwrap(),
            };
            cache.expiration(key.as_bytes(), Duration::from_millis(1)).unwrap();
        }
        cache.set("keep", "v").unwrap();
        assert_eq!(cache.len(), 6);

        let sweeper = Sweeper::spawn(Arc::clone(&cache), Duration::from_millis(2), 100);
        for _ in 0..500 {
            if cache.len() == 1 {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        sweeper.stop().await;

        assert_eq!(cache.len(), 1);
        assert!(cache.exists(b"keep"));
    }

    #[tokio::test]
    async fn test_stop_ends_task() {
        let cache = Arc::new(Cache::new());
        let sweeper = Sweeper::spawn(cache, Duration::from_millis(1), 10);
        assert!(sweeper.is_running());
        tokio::time::timeout(Duration::from_secs(1), sweeper.stop())
            .await
            .expect("sweeper did not stop");
    }

    #[tokio::test]
    async fn test_drop_cancels() {
        let cache = Arc::new(Cache::new());
        let sweeper = Sweeper::from_config(Arc::clone(&cache), &CacheConfig::default());
        let token = sweeper.token.clone();
        drop(sweeper);
        assert!(token.is_cancelled());
    }
}
