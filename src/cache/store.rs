//! Cache store owning the in-memory order set and the refresh protocol.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::orders::Order;
use crate::remote::{map_record, RawRecord, RemoteSource};

use super::aggregate::{Summary, DEFAULT_WINDOW_DAYS};
use super::query::{run_query, OrderQuery, Page, PageLimits};
use super::snapshot::Snapshot;

/// Source of the current time, injectable for tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
  /// Trailing window of the daily histogram
  pub histogram_window: Duration,
  pub page_limits: PageLimits,
}

impl Default for CacheOptions {
  fn default() -> Self {
    Self {
      histogram_window: Duration::days(DEFAULT_WINDOW_DAYS),
      page_limits: PageLimits::default(),
    }
  }
}

/// Outcome of a successful refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
  pub summary: Summary,
  /// Records returned by the remote source
  pub fetched: usize,
  /// Records dropped because they could not be mapped
  pub skipped: usize,
  pub synced_at: DateTime<Utc>,
  pub incremental: bool,
}

struct State {
  snapshot: Arc<Snapshot>,
  /// Orders reconciled while a refresh is fetching. Replayed onto the fetched
  /// set so the refresh does not resurrect values older than the update.
  pending: Option<Vec<Order>>,
}

/// Outcome of the most recent full fetch, guarded by the refresh gate.
#[derive(Default)]
struct LastFetch {
  error: Option<SyncError>,
}

/// In-memory order cache populated from a [`RemoteSource`].
///
/// Readers clone the current `Arc<Snapshot>` under a short read lock and work
/// on it without holding any lock. Refreshes are serialized by `gate`, which
/// is held across the remote fetch; the snapshot lock is only taken for the
/// swap.
pub struct CacheStore<R: RemoteSource> {
  remote: Arc<R>,
  state: RwLock<State>,
  gate: Mutex<LastFetch>,
  /// Completed full fetches, successful or not
  fetches: AtomicU64,
  options: CacheOptions,
  clock: Clock,
}

impl<R: RemoteSource> CacheStore<R> {
  pub fn new(remote: Arc<R>, options: CacheOptions) -> Self {
    Self {
      remote,
      state: RwLock::new(State {
        snapshot: Arc::new(Snapshot::empty()),
        pending: None,
      }),
      gate: Mutex::new(LastFetch::default()),
      fetches: AtomicU64::new(0),
      options,
      clock: Arc::new(Utc::now),
    }
  }

  /// Replace the wall clock used for sync timestamps and histogram windows.
  #[allow(dead_code)]
  pub fn with_clock<F>(mut self, clock: F) -> Self
  where
    F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
  {
    self.clock = Arc::new(clock);
    self
  }

  pub fn remote(&self) -> &Arc<R> {
    &self.remote
  }

  /// The current snapshot, without triggering a refresh.
  pub async fn snapshot(&self) -> Arc<Snapshot> {
    Arc::clone(&self.state.read().await.snapshot)
  }

  pub async fn synced_at(&self) -> Option<DateTime<Utc>> {
    self.snapshot().await.synced_at()
  }

  pub async fn get(&self, id: &str) -> Result<Order> {
    let snapshot = self.populated().await?;
    snapshot
      .get(id)
      .cloned()
      .ok_or_else(|| SyncError::NotFound(id.to_string()))
  }

  pub async fn query(&self, query: &OrderQuery) -> Result<Page<Order>> {
    let snapshot = self.populated().await?;
    Ok(run_query(snapshot.orders(), query, self.options.page_limits))
  }

  pub async fn summary(&self) -> Result<Summary> {
    let snapshot = self.populated().await?;
    Ok(snapshot.summary().clone())
  }

  /// Refetch everything from the remote source.
  ///
  /// Fails with [`SyncError::RefreshInProgress`] instead of waiting when
  /// another refresh holds the gate.
  pub async fn refresh(&self) -> Result<RefreshReport> {
    let mut gate = self
      .gate
      .try_lock()
      .map_err(|_| SyncError::RefreshInProgress)?;
    let (_, report) = self.full_refresh(&mut gate).await?;
    Ok(report)
  }

  /// Fetch only records modified since the last sync and merge them in.
  ///
  /// An uninitialized cache gets a full refresh instead. Records deleted
  /// remotely are not noticed until the next full refresh.
  pub async fn refresh_since(&self) -> Result<RefreshReport> {
    let mut gate = self
      .gate
      .try_lock()
      .map_err(|_| SyncError::RefreshInProgress)?;

    let Some(since) = self.synced_at().await else {
      let (_, report) = self.full_refresh(&mut gate).await?;
      return Ok(report);
    };

    let started = self.begin_fetch().await;
    let records = match self.remote.fetch_since(since).await {
      Ok(records) => records,
      Err(e) => return Err(self.abort_fetch(e).await),
    };

    let fetched = records.len();
    let (orders, skipped) = map_records(&records);

    let mut state = self.state.write().await;
    let replay = state.pending.take().unwrap_or_default();
    let snapshot = Arc::new(state.snapshot.merged(
      orders.into_iter().chain(replay),
      Some(started),
      started,
      self.options.histogram_window,
    ));
    state.snapshot = Arc::clone(&snapshot);
    drop(state);

    info!(fetched, skipped, orders = snapshot.len(), "incremental refresh complete");

    Ok(RefreshReport {
      summary: snapshot.summary().clone(),
      fetched,
      skipped,
      synced_at: started,
      incremental: true,
    })
  }

  /// Install an order confirmed by the remote source without a full refresh.
  ///
  /// Unknown ids are inserted. The summary is recomputed from the whole set
  /// and swapped in together with the order.
  pub async fn reconcile_one(&self, order: Order) {
    let now = (self.clock)();
    let mut state = self.state.write().await;

    if let Some(pending) = state.pending.as_mut() {
      pending.push(order.clone());
    }

    let id = order.id.clone();
    let next = state.snapshot.merged(
      [order],
      state.snapshot.synced_at(),
      now,
      self.options.histogram_window,
    );
    state.snapshot = Arc::new(next);
    debug!(id = %id, "reconciled order");
  }

  /// Current snapshot, populating the cache first if it never synced.
  ///
  /// Concurrent callers queue on the gate; whoever gets it first fetches and
  /// the rest share its outcome. A caller that waited while a fetch ran gets
  /// that fetch's error rather than starting another one.
  async fn populated(&self) -> Result<Arc<Snapshot>> {
    let snapshot = self.snapshot().await;
    if snapshot.is_populated() {
      return Ok(snapshot);
    }

    let seen = self.fetches.load(Ordering::SeqCst);
    let mut gate = self.gate.lock().await;
    let snapshot = self.snapshot().await;
    if snapshot.is_populated() {
      return Ok(snapshot);
    }
    if self.fetches.load(Ordering::SeqCst) != seen {
      if let Some(error) = gate.error.clone() {
        return Err(error);
      }
    }

    debug!("cache not populated yet, fetching");
    let (snapshot, _) = self.full_refresh(&mut gate).await?;
    Ok(snapshot)
  }

  /// Full refetch and swap. Requires the gate to be held.
  async fn full_refresh(
    &self,
    gate: &mut MutexGuard<'_, LastFetch>,
  ) -> Result<(Arc<Snapshot>, RefreshReport)> {
    let started = self.begin_fetch().await;
    let outcome = self.remote.fetch_all().await;
    gate.error = outcome.as_ref().err().cloned();
    self.fetches.fetch_add(1, Ordering::SeqCst);
    let records = match outcome {
      Ok(records) => records,
      Err(e) => return Err(self.abort_fetch(e).await),
    };

    let fetched = records.len();
    let (orders, skipped) = map_records(&records);
    let mut by_id: BTreeMap<String, Order> =
      orders.into_iter().map(|o| (o.id.clone(), o)).collect();

    let mut state = self.state.write().await;
    for order in state.pending.take().unwrap_or_default() {
      by_id.insert(order.id.clone(), order);
    }
    let snapshot = Arc::new(Snapshot::build(
      by_id,
      Some(started),
      started,
      self.options.histogram_window,
    ));
    state.snapshot = Arc::clone(&snapshot);
    drop(state);

    info!(fetched, skipped, orders = snapshot.len(), "refresh complete");

    let report = RefreshReport {
      summary: snapshot.summary().clone(),
      fetched,
      skipped,
      synced_at: started,
      incremental: false,
    };
    Ok((snapshot, report))
  }

  /// Start recording reconciliations and return the fetch start time.
  async fn begin_fetch(&self) -> DateTime<Utc> {
    self.state.write().await.pending = Some(Vec::new());
    (self.clock)()
  }

  async fn abort_fetch(&self, error: SyncError) -> SyncError {
    self.state.write().await.pending = None;
    warn!(error = %error, "refresh failed, keeping previous snapshot");
    error
  }
}

/// Map every record, dropping and logging the ones that fail.
fn map_records(records: &[RawRecord]) -> (Vec<Order>, usize) {
  let mut orders = Vec::with_capacity(records.len());
  let mut skipped = 0;

  for record in records {
    match map_record(record) {
      Ok(order) => orders.push(order),
      Err(e) => {
        warn!(id = %record.id, error = %e, "skipping record");
        skipped += 1;
      }
    }
  }

  (orders, skipped)
}
