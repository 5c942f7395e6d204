//! Background task keeping the cache fresh on a fixed interval.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::remote::RemoteSource;

use super::store::CacheStore;

/// Spawn a task refreshing `store` every `interval`, starting immediately.
///
/// With `incremental` set, ticks after the first only fetch records changed
/// since the previous sync. Ticks that find a refresh already running are
/// skipped. Failures are logged and the task keeps going; abort the returned
/// handle to stop it.
pub fn spawn_periodic_sync<R: RemoteSource>(
  store: Arc<CacheStore<R>>,
  interval: Duration,
  incremental: bool,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      ticker.tick().await;
      let result = if incremental {
        store.refresh_since().await
      } else {
        store.refresh().await
      };
      match result {
        Ok(report) => info!(
          orders = report.summary.total_orders,
          fetched = report.fetched,
          skipped = report.skipped,
          incremental = report.incremental,
          "scheduled sync complete"
        ),
        Err(SyncError::RefreshInProgress) => debug!("sync already running, skipping tick"),
        Err(e) => warn!(error = %e, "scheduled sync failed"),
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheOptions;
  use crate::remote::fake::{raw_order, FakeRemote};

  #[tokio::test]
  async fn test_periodic_sync_runs_repeatedly() {
    let remote = Arc::new(FakeRemote::new(vec![raw_order(
      "a",
      "Pending",
      1.0,
      "2025-06-01T00:00:00Z",
    )]));
    let store = Arc::new(CacheStore::new(Arc::clone(&remote), CacheOptions::default()));

    let handle = spawn_periodic_sync(Arc::clone(&store), Duration::from_millis(10), false);
    tokio::time::sleep(Duration::from_millis(55)).await;
    handle.abort();

    assert!(remote.fetch_calls() >= 2);
    assert!(store.snapshot().await.is_populated());
  }

  #[tokio::test]
  async fn test_periodic_sync_survives_failures() {
    let remote = Arc::new(FakeRemote::new(Vec::new()));
    remote.set_failing(true);
    let store = Arc::new(CacheStore::new(Arc::clone(&remote), CacheOptions::default()));

    let handle = spawn_periodic_sync(Arc::clone(&store), Duration::from_millis(10), false);
    tokio::time::sleep(Duration::from_millis(35)).await;
    remote.set_failing(false);
    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.abort();

    assert!(remote.fetch_calls() >= 3);
    assert!(store.snapshot().await.is_populated());
  }

  #[tokio::test]
  async fn test_incremental_sync_fetches_full_set_once() {
    let remote = Arc::new(FakeRemote::new(vec![raw_order(
      "a",
      "Pending",
      1.0,
      "2025-06-01T00:00:00Z",
    )]));
    let store = Arc::new(CacheStore::new(Arc::clone(&remote), CacheOptions::default()));

    let handle = spawn_periodic_sync(Arc::clone(&store), Duration::from_millis(10), true);
    tokio::time::sleep(Duration::from_millis(45)).await;
    handle.abort();

    assert_eq!(remote.fetch_calls(), 1);
    assert!(remote.since_calls() >= 2);
    assert_eq!(store.snapshot().await.len(), 1);
  }
}
