//! Summary statistics over a set of orders.
//!
//! Status and priority breakdowns are dense: every variant is reported, with
//! zero count and zero revenue when no order has it. The daily histogram is
//! sparse: days without orders are left out. Consumers charting the
//! histogram must fill gaps themselves.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::orders::{Order, OrderPriority, OrderStatus};

/// Default trailing window of the daily histogram.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
  pub count: usize,
  pub revenue: f64,
}

impl Totals {
  fn add(&mut self, order: &Order) {
    self.count += 1;
    self.revenue += order.order_total;
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusTotals {
  pub status: OrderStatus,
  #[serde(flatten)]
  pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityTotals {
  pub priority: OrderPriority,
  #[serde(flatten)]
  pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
  pub date: NaiveDate,
  pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
  pub total_orders: usize,
  pub total_revenue: f64,
  /// One entry per status, in declaration order
  pub by_status: Vec<StatusTotals>,
  /// One entry per priority, in declaration order
  pub by_priority: Vec<PriorityTotals>,
  /// Ascending by date, zero-count days omitted
  pub orders_per_day: Vec<DailyCount>,
}

#[allow(dead_code)]
impl Summary {
  pub fn status(&self, status: OrderStatus) -> Totals {
    self
      .by_status
      .iter()
      .find(|s| s.status == status)
      .map(|s| s.totals)
      .unwrap_or_default()
  }

  pub fn priority(&self, priority: OrderPriority) -> Totals {
    self
      .by_priority
      .iter()
      .find(|p| p.priority == priority)
      .map(|p| p.totals)
      .unwrap_or_default()
  }
}

impl Default for Summary {
  fn default() -> Self {
    summarize(std::iter::empty(), DateTime::<Utc>::MIN_UTC, Duration::zero())
  }
}

/// Compute the summary of `orders` as seen at `now`.
///
/// Sums are accumulated in iteration order, so callers wanting repeatable
/// floating point results must pass orders in a stable order.
pub fn summarize<'a, I>(orders: I, now: DateTime<Utc>, window: Duration) -> Summary
where
  I: IntoIterator<Item = &'a Order>,
{
  let mut by_status: BTreeMap<OrderStatus, Totals> =
    OrderStatus::ALL.iter().map(|s| (*s, Totals::default())).collect();
  let mut by_priority: BTreeMap<OrderPriority, Totals> = OrderPriority::ALL
    .iter()
    .map(|p| (*p, Totals::default()))
    .collect();
  let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();

  let first_day = (now - window).date_naive();
  let last_day = now.date_naive();

  let mut total = Totals::default();
  for order in orders {
    total.add(order);
    by_status.entry(order.status).or_default().add(order);
    by_priority.entry(order.priority).or_default().add(order);

    let day = order.created_at.date_naive();
    if day >= first_day && day <= last_day {
      *per_day.entry(day).or_default() += 1;
    }
  }

  Summary {
    total_orders: total.count,
    total_revenue: total.revenue,
    by_status: by_status
      .into_iter()
      .map(|(status, totals)| StatusTotals { status, totals })
      .collect(),
    by_priority: by_priority
      .into_iter()
      .map(|(priority, totals)| PriorityTotals { priority, totals })
      .collect(),
    orders_per_day: per_day
      .into_iter()
      .map(|(date, count)| DailyCount { date, count })
      .collect(),
  }
}
