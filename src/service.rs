//! Order operations as seen by callers (the CLI).

use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheStore, OrderQuery, Page, RefreshReport, Summary};
use crate::error::Result;
use crate::orders::{Order, OrderUpdate};
use crate::remote::{map_record, RemoteSource};

/// Handle combining the cache with the remote source it mirrors.
///
/// Built once at startup and passed to whoever serves requests.
pub struct OrderService<R: RemoteSource> {
  store: Arc<CacheStore<R>>,
}

impl<R: RemoteSource> Clone for OrderService<R> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<R: RemoteSource> OrderService<R> {
  pub fn new(store: Arc<CacheStore<R>>) -> Self {
    Self { store }
  }

  #[allow(dead_code)]
  pub fn store(&self) -> &Arc<CacheStore<R>> {
    &self.store
  }

  pub async fn list(&self, query: &OrderQuery) -> Result<Page<Order>> {
    self.store.query(query).await
  }

  pub async fn get(&self, id: &str) -> Result<Order> {
    self.store.get(id).await
  }

  pub async fn summary(&self) -> Result<Summary> {
    self.store.summary().await
  }

  /// Explicit full sync. A sync already running is reported as
  /// [`SyncError::RefreshInProgress`](crate::error::SyncError), not awaited.
  pub async fn sync(&self) -> Result<RefreshReport> {
    self.store.refresh().await
  }

  /// Update an order remotely, then install the remote's answer in the cache.
  ///
  /// The id is resolved by the remote, so orders created since the last sync
  /// can be updated and are inserted into the cache. If the response cannot
  /// be mapped the cached order is left as it was and the mapping error is
  /// returned, even though the remote write happened.
  pub async fn update(&self, id: &str, update: &OrderUpdate) -> Result<Order> {
    let record = self.store.remote().update(id, update).await?;
    let order = map_record(&record).inspect_err(|e| {
      warn!(id = %id, error = %e, "updated record could not be mapped, cache not patched");
    })?;

    self.store.reconcile_one(order.clone()).await;
    info!(id = %id, status = %order.status, priority = %order.priority, "order updated");
    Ok(order)
  }
}
