//! Filtering, sorting and pagination over a snapshot's orders.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

use crate::orders::{Order, OrderPriority, OrderStatus};

/// Conjunctive filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
  pub status: Option<OrderStatus>,
  pub priority: Option<OrderPriority>,
  /// Case-insensitive substring of the customer name
  pub customer: Option<String>,
  /// Inclusive lower bound on `created_at`
  pub created_from: Option<DateTime<Utc>>,
  /// Inclusive upper bound on `created_at`
  pub created_to: Option<DateTime<Utc>>,
}

impl OrderFilter {
  pub fn matches(&self, order: &Order) -> bool {
    if self.status.is_some_and(|s| s != order.status) {
      return false;
    }
    if self.priority.is_some_and(|p| p != order.priority) {
      return false;
    }
    if self.created_from.is_some_and(|from| order.created_at < from) {
      return false;
    }
    if self.created_to.is_some_and(|to| order.created_at > to) {
      return false;
    }
    match self.customer.as_deref().map(str::trim) {
      Some(needle) if !needle.is_empty() => order
        .customer
        .to_lowercase()
        .contains(&needle.to_lowercase()),
      _ => true,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
  #[default]
  CreatedAt,
  UpdatedAt,
  OrderTotal,
  Customer,
  OrderId,
  Status,
  Priority,
}

impl SortField {
  /// Resolve a caller-supplied field name. Unknown names sort by creation time.
  pub fn parse_or_default(name: &str) -> Self {
    match name.trim().to_lowercase().replace('-', "_").as_str() {
      "created_at" | "created" => SortField::CreatedAt,
      "updated_at" | "updated" => SortField::UpdatedAt,
      "order_total" | "total" => SortField::OrderTotal,
      "customer" => SortField::Customer,
      "order_id" => SortField::OrderId,
      "status" => SortField::Status,
      "priority" => SortField::Priority,
      _ => SortField::default(),
    }
  }

  fn compare(self, a: &Order, b: &Order) -> Ordering {
    match self {
      SortField::CreatedAt => a.created_at.cmp(&b.created_at),
      SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
      SortField::OrderTotal => a.order_total.total_cmp(&b.order_total),
      SortField::Customer => a.customer.to_lowercase().cmp(&b.customer.to_lowercase()),
      SortField::OrderId => a.order_id.cmp(&b.order_id),
      SortField::Status => a.status.cmp(&b.status),
      SortField::Priority => a.priority.cmp(&b.priority),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
  Asc,
  #[default]
  Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderQuery {
  pub filter: OrderFilter,
  pub sort: SortField,
  pub direction: SortDirection,
  /// 1-based; 0 is treated as 1
  pub page: usize,
  /// Falls back to the configured default when unset
  pub page_size: Option<usize>,
}

impl Default for OrderQuery {
  fn default() -> Self {
    Self {
      filter: OrderFilter::default(),
      sort: SortField::default(),
      direction: SortDirection::default(),
      page: 1,
      page_size: None,
    }
  }
}

/// Page size bounds applied to every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
  pub default_page_size: usize,
  pub max_page_size: usize,
}

impl Default for PageLimits {
  fn default() -> Self {
    Self {
      default_page_size: 20,
      max_page_size: 100,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: usize,
  pub page: usize,
  pub page_size: usize,
  /// Never below 1, even for an empty result
  pub total_pages: usize,
}

/// Run `query` over `orders`.
///
/// Orders comparing equal on the sort field keep their input order.
pub fn run_query<'a, I>(orders: I, query: &OrderQuery, limits: PageLimits) -> Page<Order>
where
  I: IntoIterator<Item = &'a Order>,
{
  let mut matched: Vec<&Order> = orders
    .into_iter()
    .filter(|o| query.filter.matches(o))
    .collect();

  let field = query.sort;
  match query.direction {
    SortDirection::Asc => matched.sort_by(|a, b| field.compare(a, b)),
    SortDirection::Desc => matched.sort_by(|a, b| field.compare(b, a)),
  }

  let page = query.page.max(1);
  let page_size = query
    .page_size
    .unwrap_or(limits.default_page_size)
    .clamp(1, limits.max_page_size.max(1));
  let total = matched.len();
  let total_pages = total.div_ceil(page_size).max(1);

  let items = matched
    .into_iter()
    .skip((page - 1).saturating_mul(page_size))
    .take(page_size)
    .cloned()
    .collect();

  Page {
    items,
    total,
    page,
    page_size,
    total_pages,
  }
}
