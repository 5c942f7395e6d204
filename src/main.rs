mod cache;
mod config;
mod error;
mod orders;
mod remote;
mod service;

use chrono::{DateTime, Utc};
use clap::{ArgGroup, Args as ClapArgs, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cache::{spawn_periodic_sync, CacheStore, OrderFilter, OrderQuery, SortDirection, SortField};
use crate::orders::{OrderPriority, OrderStatus, OrderUpdate};
use crate::remote::AirtableClient;
use crate::service::OrderService;

#[derive(Parser, Debug)]
#[command(name = "ordersync")]
#[command(about = "Cached, filterable view over orders stored in Airtable")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/ordersync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch every order and print the refresh report
  Sync,
  /// Print order counts, revenue and the daily histogram
  Summary,
  /// List orders with optional filters
  List(ListArgs),
  /// Show a single order by record id
  Get { id: String },
  /// Change an order's status and/or priority
  Update(UpdateArgs),
  /// Keep syncing on the configured interval until interrupted
  Watch,
}

#[derive(ClapArgs, Debug)]
struct ListArgs {
  #[arg(long)]
  status: Option<OrderStatus>,
  #[arg(long)]
  priority: Option<OrderPriority>,
  /// Case-insensitive substring of the customer name
  #[arg(long)]
  customer: Option<String>,
  /// Earliest creation time (RFC 3339 or YYYY-MM-DD)
  #[arg(long, value_parser = parse_from)]
  from: Option<DateTime<Utc>>,
  /// Latest creation time; a bare date includes the whole day
  #[arg(long, value_parser = parse_to)]
  to: Option<DateTime<Utc>>,
  /// created_at, updated_at, order_total, customer, order_id, status or priority
  #[arg(long, default_value = "created_at")]
  sort: String,
  /// Sort ascending instead of newest/largest first
  #[arg(long)]
  asc: bool,
  #[arg(long, default_value_t = 1)]
  page: usize,
  #[arg(long)]
  page_size: Option<usize>,
}

impl ListArgs {
  fn into_query(self) -> OrderQuery {
    OrderQuery {
      filter: OrderFilter {
        status: self.status,
        priority: self.priority,
        customer: self.customer,
        created_from: self.from,
        created_to: self.to,
      },
      sort: SortField::parse_or_default(&self.sort),
      direction: if self.asc {
        SortDirection::Asc
      } else {
        SortDirection::Desc
      },
      page: self.page,
      page_size: self.page_size,
    }
  }
}

#[derive(ClapArgs, Debug)]
#[command(group(
  ArgGroup::new("fields")
    .required(true)
    .multiple(true)
    .args(["status", "priority"])
))]
struct UpdateArgs {
  id: String,
  #[arg(long)]
  status: Option<OrderStatus>,
  #[arg(long)]
  priority: Option<OrderPriority>,
}

fn parse_from(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
  remote::mapper::parse_timestamp(raw).ok_or_else(|| format!("invalid date '{}'", raw))
}

fn parse_to(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
  let start = parse_from(raw)?;
  if raw.trim().len() == "YYYY-MM-DD".len() {
    return Ok(start + chrono::Duration::days(1) - chrono::Duration::nanoseconds(1));
  }
  Ok(start)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  // Logs go to stderr so stdout only carries JSON
  let (writer, _log_guard) = tracing_appender::non_blocking(std::io::stderr());
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ordersync=info")),
    )
    .with_writer(writer)
    .init();

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;
  let remote = Arc::new(AirtableClient::new(&config.airtable)?);
  let store = Arc::new(CacheStore::new(remote, config.cache.options()));
  let service = OrderService::new(Arc::clone(&store));

  match args.command {
    Command::Sync => print_json(&service.sync().await?)?,
    Command::Summary => print_json(&service.summary().await?)?,
    Command::List(list) => print_json(&service.list(&list.into_query()).await?)?,
    Command::Get { id } => print_json(&service.get(&id).await?)?,
    Command::Update(update) => {
      let delta = OrderUpdate {
        status: update.status,
        priority: update.priority,
      };
      print_json(&service.update(&update.id, &delta).await?)?
    }
    Command::Watch => {
      let interval = config.cache.sync_interval();
      info!(interval_secs = interval.as_secs(), "watching for changes");
      let handle = spawn_periodic_sync(Arc::clone(&store), interval, config.cache.incremental_sync);

      tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to listen for Ctrl-C: {}", e))?;
      handle.abort();

      print_json(store.snapshot().await.summary())?
    }
  }

  Ok(())
}
