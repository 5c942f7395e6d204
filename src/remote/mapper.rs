//! Conversion from remote records into cached orders.
//!
//! Defaults applied for absent columns: status `Pending`, priority `Medium`,
//! empty order reference and customer, total `0`. Values outside the closed
//! status/priority sets, negative totals and records without a creation time
//! are rejected rather than stored.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Result, SyncError};
use crate::orders::{Order, OrderPriority, OrderStatus};

use super::api_types::{reserialize, ApiOrderFields, RawRecord};

pub fn map_record(record: &RawRecord) -> Result<Order> {
  if record.id.trim().is_empty() {
    return Err(SyncError::mapping("<missing>", "record has no id"));
  }
  let id = record.id.clone();

  let fields: ApiOrderFields =
    reserialize(&record.fields).map_err(|e| SyncError::mapping(&id, e))?;

  let status = match fields.status.as_deref() {
    None | Some("") => OrderStatus::Pending,
    Some(s) => s.parse().map_err(|e| SyncError::mapping(&id, e))?,
  };

  let priority = match fields.priority.as_deref() {
    None | Some("") => OrderPriority::Medium,
    Some(p) => p.parse().map_err(|e| SyncError::mapping(&id, e))?,
  };

  let order_total = fields.order_total.unwrap_or(0.0);
  if !order_total.is_finite() || order_total < 0.0 {
    return Err(SyncError::mapping(
      &id,
      format!("order total {} is not a non-negative amount", order_total),
    ));
  }

  let created_raw = fields
    .created_at
    .as_deref()
    .filter(|s| !s.trim().is_empty())
    .or(record.created_time.as_deref())
    .ok_or_else(|| SyncError::mapping(&id, "missing creation timestamp"))?;
  let created_at = parse_timestamp(created_raw)
    .ok_or_else(|| SyncError::mapping(&id, format!("invalid timestamp '{}'", created_raw)))?;

  let updated_at = match fields.updated_at.as_deref() {
    None | Some("") => None,
    Some(raw) => Some(
      parse_timestamp(raw)
        .ok_or_else(|| SyncError::mapping(&id, format!("invalid timestamp '{}'", raw)))?,
    ),
  };

  Ok(Order {
    id,
    order_id: fields.order_id.unwrap_or_default(),
    customer: fields.customer.unwrap_or_default(),
    status,
    priority,
    order_total,
    created_at,
    updated_at,
  })
}

/// Parse the timestamp shapes Airtable produces.
///
/// RFC 3339 with offset or `Z`, naive date-times (taken as UTC) and bare
/// dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.with_timezone(&Utc));
  }
  if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
    return Some(dt.and_utc());
  }
  if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
    return Some(dt.and_utc());
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|dt| dt.and_utc())
}
