//! In-memory order cache kept in sync with the remote table.
//!
//! - [`CacheStore`] owns the current [`Snapshot`] and arbitrates refreshes
//! - [`aggregate`] derives the summary statistics of a snapshot
//! - [`query`] filters, sorts and paginates a snapshot
//! - [`scheduler`] refreshes the store periodically

pub mod aggregate;
pub mod query;
pub mod scheduler;
mod snapshot;
mod store;

pub use aggregate::Summary;
pub use query::{OrderFilter, OrderQuery, Page, PageLimits, SortDirection, SortField};
pub use scheduler::spawn_periodic_sync;
pub use store::{CacheOptions, CacheStore, RefreshReport};
