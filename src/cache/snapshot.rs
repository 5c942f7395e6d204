//! Immutable point-in-time view of the cached orders.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use crate::orders::Order;

use super::aggregate::{summarize, Summary};

/// Orders keyed by record id together with their precomputed summary.
///
/// A snapshot is never modified once built; changes produce a new snapshot
/// that replaces the old one wholesale.
#[derive(Debug, Clone)]
pub struct Snapshot {
  orders: BTreeMap<String, Order>,
  summary: Summary,
  synced_at: Option<DateTime<Utc>>,
}

impl Snapshot {
  /// The uninitialized state: no orders and never synced.
  pub fn empty() -> Self {
    Self {
      orders: BTreeMap::new(),
      summary: Summary::default(),
      synced_at: None,
    }
  }

  pub fn build(
    orders: BTreeMap<String, Order>,
    synced_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
  ) -> Self {
    // BTreeMap iteration keeps the summation order stable across rebuilds
    let summary = summarize(orders.values(), now, window);
    Self {
      orders,
      summary,
      synced_at,
    }
  }

  /// Copy of this snapshot with `updates` upserted, last write wins.
  pub fn merged<I>(
    &self,
    updates: I,
    synced_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
  ) -> Self
  where
    I: IntoIterator<Item = Order>,
  {
    let mut orders = self.orders.clone();
    for order in updates {
      orders.insert(order.id.clone(), order);
    }
    Self::build(orders, synced_at, now, window)
  }

  /// True once a full refresh has succeeded.
  pub fn is_populated(&self) -> bool {
    self.synced_at.is_some()
  }

  pub fn get(&self, id: &str) -> Option<&Order> {
    self.orders.get(id)
  }

  /// Orders in record id order.
  pub fn orders(&self) -> impl Iterator<Item = &Order> {
    self.orders.values()
  }

  pub fn len(&self) -> usize {
    self.orders.len()
  }

  #[allow(dead_code)]
  pub fn is_empty(&self) -> bool {
    self.orders.is_empty()
  }

  pub fn summary(&self) -> &Summary {
    &self.summary
  }

  pub fn synced_at(&self) -> Option<DateTime<Utc>> {
    self.synced_at
  }
}

impl Default for Snapshot {
  fn default() -> Self {
    Self::empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::orders::{OrderPriority, OrderStatus};
  use chrono::TimeZone;

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap()
  }

  fn order(id: &str, status: OrderStatus, total: f64) -> Order {
    Order {
      id: id.to_string(),
      order_id: id.to_uppercase(),
      customer: "Initech".to_string(),
      status,
      priority: OrderPriority::Low,
      order_total: total,
      created_at: now() - Duration::days(2),
      updated_at: None,
    }
  }

  #[test]
  fn test_empty_is_uninitialized() {
    let snapshot = Snapshot::empty();
    assert!(!snapshot.is_populated());
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.summary().total_orders, 0);
  }

  #[test]
  fn test_merged_replaces_and_inserts() {
    let orders = [order("a", OrderStatus::Pending, 10.0)]
      .into_iter()
      .map(|o| (o.id.clone(), o))
      .collect();
    let base = Snapshot::build(orders, Some(now()), now(), Duration::days(30));

    let next = base.merged(
      [
        order("a", OrderStatus::Delivered, 10.0),
        order("b", OrderStatus::Pending, 5.0),
      ],
      base.synced_at(),
      now(),
      Duration::days(30),
    );

    // the original is untouched
    assert_eq!(base.get("a").unwrap().status, OrderStatus::Pending);
    assert_eq!(base.len(), 1);

    assert_eq!(next.len(), 2);
    assert_eq!(next.get("a").unwrap().status, OrderStatus::Delivered);
    assert_eq!(next.summary().status(OrderStatus::Delivered).count, 1);
    assert_eq!(next.summary().status(OrderStatus::Pending).count, 1);
    assert_eq!(next.synced_at(), Some(now()));
  }
}
