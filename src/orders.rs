//! Order domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
  Pending,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 5] = [
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
  ];

  /// Value as stored in the remote table.
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "Pending",
      OrderStatus::Processing => "Processing",
      OrderStatus::Shipped => "Shipped",
      OrderStatus::Delivered => "Delivered",
      OrderStatus::Cancelled => "Cancelled",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderPriority {
  Low,
  Medium,
  High,
  Urgent,
}

impl OrderPriority {
  pub const ALL: [OrderPriority; 4] = [
    OrderPriority::Low,
    OrderPriority::Medium,
    OrderPriority::High,
    OrderPriority::Urgent,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderPriority::Low => "Low",
      OrderPriority::Medium => "Medium",
      OrderPriority::High => "High",
      OrderPriority::Urgent => "Urgent",
    }
  }
}

/// Error for a value outside one of the closed enum sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue {
  pub kind: &'static str,
  pub value: String,
}

impl fmt::Display for UnknownValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "unrecognized {} '{}'", self.kind, self.value)
  }
}

impl std::error::Error for UnknownValue {}

impl FromStr for OrderStatus {
  type Err = UnknownValue;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    OrderStatus::ALL
      .into_iter()
      .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
      .ok_or_else(|| UnknownValue {
        kind: "status",
        value: s.to_string(),
      })
  }
}

impl FromStr for OrderPriority {
  type Err = UnknownValue;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    OrderPriority::ALL
      .into_iter()
      .find(|priority| priority.as_str().eq_ignore_ascii_case(trimmed))
      .ok_or_else(|| UnknownValue {
        kind: "priority",
        value: s.to_string(),
      })
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl fmt::Display for OrderPriority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// An order as held in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
  /// Remote record id, assigned by Airtable
  pub id: String,
  /// External order reference
  pub order_id: String,
  pub customer: String,
  pub status: OrderStatus,
  pub priority: OrderPriority,
  pub order_total: f64,
  pub created_at: DateTime<Utc>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// Partial field update applied to a single remote record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
  pub status: Option<OrderStatus>,
  pub priority: Option<OrderPriority>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_parse_is_case_insensitive() {
    assert_eq!("delivered".parse::<OrderStatus>(), Ok(OrderStatus::Delivered));
    assert_eq!(" Pending ".parse::<OrderStatus>(), Ok(OrderStatus::Pending));
  }

  #[test]
  fn test_unknown_status_rejected() {
    let err = "Completed".parse::<OrderStatus>().unwrap_err();
    assert_eq!(err.kind, "status");
    assert_eq!(err.to_string(), "unrecognized status 'Completed'");
  }

  #[test]
  fn test_urgent_priority_accepted() {
    assert_eq!("Urgent".parse::<OrderPriority>(), Ok(OrderPriority::Urgent));
    assert!("Critical".parse::<OrderPriority>().is_err());
  }
}
