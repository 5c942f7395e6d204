//! In-memory remote used by unit tests.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::orders::OrderUpdate;

use super::api_types::RawRecord;
use super::mapper::parse_timestamp;
use super::RemoteSource;

/// Remote table kept in memory, recording how it is called.
#[derive(Default)]
pub struct FakeRemote {
  records: Mutex<Vec<RawRecord>>,
  delay: Duration,
  fail: AtomicBool,
  fetch_calls: AtomicUsize,
  since_calls: AtomicUsize,
  update_calls: AtomicUsize,
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
}

impl FakeRemote {
  pub fn new(records: Vec<RawRecord>) -> Self {
    Self {
      records: Mutex::new(records),
      ..Self::default()
    }
  }

  /// Make every fetch take `delay` so calls overlap.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn set_failing(&self, fail: bool) {
    self.fail.store(fail, Ordering::SeqCst);
  }

  pub fn set_records(&self, records: Vec<RawRecord>) {
    *self.records.lock().unwrap() = records;
  }

  pub fn push_record(&self, record: RawRecord) {
    self.records.lock().unwrap().push(record);
  }

  pub fn fetch_calls(&self) -> usize {
    self.fetch_calls.load(Ordering::SeqCst)
  }

  pub fn since_calls(&self) -> usize {
    self.since_calls.load(Ordering::SeqCst)
  }

  pub fn update_calls(&self) -> usize {
    self.update_calls.load(Ordering::SeqCst)
  }

  pub fn max_in_flight(&self) -> usize {
    self.max_in_flight.load(Ordering::SeqCst)
  }

  async fn begin(&self) -> Result<()> {
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    self.in_flight.fetch_sub(1, Ordering::SeqCst);
    if self.fail.load(Ordering::SeqCst) {
      return Err(SyncError::RemoteUnavailable("connection refused".to_string()));
    }
    Ok(())
  }
}

impl RemoteSource for FakeRemote {
  async fn fetch_all(&self) -> Result<Vec<RawRecord>> {
    self.fetch_calls.fetch_add(1, Ordering::SeqCst);
    self.begin().await?;
    Ok(self.records.lock().unwrap().clone())
  }

  async fn fetch_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RawRecord>> {
    self.since_calls.fetch_add(1, Ordering::SeqCst);
    self.begin().await?;
    let records = self.records.lock().unwrap();
    Ok(
      records
        .iter()
        .filter(|r| last_touched(r).is_some_and(|touched| touched > cutoff))
        .cloned()
        .collect(),
    )
  }

  async fn update(&self, id: &str, update: &OrderUpdate) -> Result<RawRecord> {
    self.update_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail.load(Ordering::SeqCst) {
      return Err(SyncError::RemoteUnavailable("connection refused".to_string()));
    }
    let mut records = self.records.lock().unwrap();
    let record = records
      .iter_mut()
      .find(|r| r.id == id)
      .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
    if let Some(status) = update.status {
      record.fields.insert("Status".into(), json!(status.as_str()));
    }
    if let Some(priority) = update.priority {
      record.fields.insert("Priority".into(), json!(priority.as_str()));
    }
    Ok(record.clone())
  }
}

/// `Updated At`, or the creation time for rows never updated.
fn last_touched(record: &RawRecord) -> Option<DateTime<Utc>> {
  let field = |name: &str| {
    record
      .fields
      .get(name)
      .and_then(Value::as_str)
      .and_then(parse_timestamp)
  };
  field("Updated At")
    .or_else(|| field("Created At"))
    .or_else(|| record.created_time.as_deref().and_then(parse_timestamp))
}

/// Build a raw order record the way Airtable returns it.
pub fn raw_order(id: &str, status: &str, total: f64, created_at: &str) -> RawRecord {
  let mut fields = Map::new();
  fields.insert("Order ID".into(), json!(format!("ORD-{}", id)));
  fields.insert("Customer".into(), json!(format!("Customer {}", id)));
  fields.insert("Status".into(), json!(status));
  fields.insert("Priority".into(), json!("Medium"));
  fields.insert("Order Total".into(), json!(total));
  fields.insert("Created At".into(), json!(created_at));
  RawRecord {
    id: id.to_string(),
    created_time: None,
    fields,
  }
}
