use chrono::Duration as ChronoDuration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheOptions, PageLimits};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub airtable: AirtableConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirtableConfig {
  pub base_id: String,
  pub table_id: String,
  #[serde(default = "default_api_url")]
  pub api_url: String,
  /// Per-request timeout, bounding every remote fetch
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Records per list request (Airtable caps this at 100)
  #[serde(default = "default_remote_page_size")]
  pub page_size: u32,
  /// How many 429 responses to wait out before giving up
  #[serde(default = "default_rate_limit_retries")]
  pub rate_limit_retries: u32,
  #[serde(default = "default_rate_limit_delay_ms")]
  pub rate_limit_delay_ms: u64,
}

fn default_api_url() -> String {
  "https://api.airtable.com/v0".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_remote_page_size() -> u32 {
  100
}

fn default_rate_limit_retries() -> u32 {
  5
}

fn default_rate_limit_delay_ms() -> u64 {
  1000
}

impl Default for AirtableConfig {
  fn default() -> Self {
    Self {
      base_id: String::new(),
      table_id: String::new(),
      api_url: default_api_url(),
      timeout_secs: default_timeout_secs(),
      page_size: default_remote_page_size(),
      rate_limit_retries: default_rate_limit_retries(),
      rate_limit_delay_ms: default_rate_limit_delay_ms(),
    }
  }
}

/// Longest histogram window accepted from config.
const MAX_HISTOGRAM_DAYS: u32 = 3650;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
  /// Trailing window of the orders-per-day histogram
  pub histogram_days: u32,
  pub default_page_size: usize,
  pub max_page_size: usize,
  /// Interval of the background sync used by `watch`
  pub sync_interval_minutes: u64,
  /// Background syncs after the first only fetch changed records
  pub incremental_sync: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      histogram_days: 30,
      default_page_size: 20,
      max_page_size: 100,
      sync_interval_minutes: 5,
      incremental_sync: false,
    }
  }
}

impl CacheConfig {
  pub fn options(&self) -> CacheOptions {
    CacheOptions {
      histogram_window: ChronoDuration::days(i64::from(
        self.histogram_days.min(MAX_HISTOGRAM_DAYS),
      )),
      page_limits: PageLimits {
        default_page_size: self.default_page_size.max(1),
        max_page_size: self.max_page_size.max(1),
      },
    }
  }

  pub fn sync_interval(&self) -> Duration {
    Duration::from_secs(self.sync_interval_minutes.max(1) * 60)
  }
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./ordersync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ordersync/config.yaml
  /// 4. AIRTABLE_BASE_ID / AIRTABLE_TABLE_ID environment variables
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Self::from_env(),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("ordersync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("ordersync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.airtable.base_id.is_empty() || config.airtable.table_id.is_empty() {
      return Err(eyre!("airtable.base_id and airtable.table_id must not be empty"));
    }
    Ok(config)
  }

  fn from_env() -> Result<Self> {
    let base_id = std::env::var("AIRTABLE_BASE_ID");
    let table_id = std::env::var("AIRTABLE_TABLE_ID");

    match (base_id, table_id) {
      (Ok(base_id), Ok(table_id)) if !base_id.is_empty() && !table_id.is_empty() => Ok(Config {
        airtable: AirtableConfig {
          base_id,
          table_id,
          ..AirtableConfig::default()
        },
        cache: CacheConfig::default(),
      }),
      _ => Err(eyre!(
        "No configuration found. Create ~/.config/ordersync/config.yaml \
         or set AIRTABLE_BASE_ID and AIRTABLE_TABLE_ID."
      )),
    }
  }

  /// Get the Airtable API token from environment variables.
  ///
  /// Checks ORDERSYNC_AIRTABLE_TOKEN first, then AIRTABLE_API_KEY as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("ORDERSYNC_AIRTABLE_TOKEN")
      .or_else(|_| std::env::var("AIRTABLE_API_KEY"))
      .map_err(|_| {
        eyre!(
          "Airtable token not found. Set ORDERSYNC_AIRTABLE_TOKEN or AIRTABLE_API_KEY environment variable."
        )
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse(
      r#"
airtable:
  base_id: appOrders
  table_id: tblOrders
"#,
    )
    .unwrap();

    assert_eq!(config.airtable.api_url, "https://api.airtable.com/v0");
    assert_eq!(config.airtable.timeout_secs, 30);
    assert_eq!(config.airtable.page_size, 100);
    assert_eq!(config.cache, CacheConfig::default());
  }

  #[test]
  fn test_cache_section_overrides() {
    let config = Config::parse(
      r#"
airtable:
  base_id: appOrders
  table_id: tblOrders
  timeout_secs: 5
cache:
  histogram_days: 7
  max_page_size: 50
"#,
    )
    .unwrap();

    assert_eq!(config.airtable.timeout_secs, 5);
    let options = config.cache.options();
    assert_eq!(options.histogram_window, ChronoDuration::days(7));
    assert_eq!(options.page_limits.max_page_size, 50);
    assert_eq!(options.page_limits.default_page_size, 20);
  }

  #[test]
  fn test_empty_ids_rejected() {
    let result = Config::parse(
      r#"
airtable:
  base_id: ""
  table_id: tblOrders
"#,
    );
    assert!(result.is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let result = Config::load(Some(Path::new("/definitely/not/here.yaml")));
    assert!(result.is_err());
  }

  #[test]
  fn test_histogram_window_is_capped() {
    let cache = CacheConfig {
      histogram_days: u32::MAX,
      ..CacheConfig::default()
    };
    assert_eq!(
      cache.options().histogram_window,
      ChronoDuration::days(i64::from(MAX_HISTOGRAM_DAYS))
    );
  }

  #[test]
  fn test_sync_interval_has_a_floor() {
    let cache = CacheConfig {
      sync_interval_minutes: 0,
      ..CacheConfig::default()
    };
    assert_eq!(cache.sync_interval(), Duration::from_secs(60));
  }
}
