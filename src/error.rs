//! Error kinds surfaced by the cache and sync layer.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
  /// Network failure, timeout or non-2xx response from Airtable.
  #[error("remote source unavailable: {0}")]
  RemoteUnavailable(String),
  /// A single remote record could not be turned into an order.
  #[error("record {id} could not be mapped: {reason}")]
  Mapping { id: String, reason: String },
  /// An explicit refresh was requested while another one is running.
  #[error("a refresh is already in progress")]
  RefreshInProgress,
  #[error("order {0} not found")]
  NotFound(String),
}

impl SyncError {
  pub fn mapping(id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
    Self::Mapping {
      id: id.into(),
      reason: reason.to_string(),
    }
  }
}

impl From<reqwest::Error> for SyncError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      Self::RemoteUnavailable(format!("request timed out: {}", e))
    } else {
      Self::RemoteUnavailable(e.to_string())
    }
  }
}

pub type Result<T> = std::result::Result<T, SyncError>;
