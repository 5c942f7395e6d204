//! Access to the remote order table.

pub mod api_types;
pub mod client;
#[cfg(test)]
pub mod fake;
pub mod mapper;

use chrono::{DateTime, Utc};
use std::future::Future;

use crate::error::Result;
use crate::orders::OrderUpdate;

pub use api_types::RawRecord;
pub use client::AirtableClient;
pub use mapper::map_record;

/// Source of truth the cache is built from.
///
/// Implementations bound every call with their own timeout and report
/// failures as [`SyncError::RemoteUnavailable`](crate::error::SyncError).
pub trait RemoteSource: Send + Sync + 'static {
  /// Every record in the table, following pagination until exhausted.
  fn fetch_all(&self) -> impl Future<Output = Result<Vec<RawRecord>>> + Send;

  /// Records modified after `cutoff`.
  fn fetch_since(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<RawRecord>>> + Send;

  /// Apply a partial update and return the record as stored remotely.
  fn update(
    &self,
    id: &str,
    update: &OrderUpdate,
  ) -> impl Future<Output = Result<RawRecord>> + Send;
}
