use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result as EyreResult};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::{AirtableConfig, Config};
use crate::error::{Result, SyncError};
use crate::orders::OrderUpdate;

use super::api_types::{ApiListResponse, ApiUpdateFields, ApiUpdateRequest, RawRecord};
use super::RemoteSource;

/// Airtable REST client for a single table.
#[derive(Clone)]
pub struct AirtableClient {
  http: reqwest::Client,
  table_url: Url,
  token: String,
  page_size: u32,
  rate_limit_retries: u32,
  rate_limit_delay: Duration,
}

impl AirtableClient {
  pub fn new(config: &AirtableConfig) -> EyreResult<Self> {
    let token = Config::get_api_token()?;
    Self::with_token(config, token)
  }

  pub fn with_token(config: &AirtableConfig, token: String) -> EyreResult<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      table_url: table_url(config)?,
      token,
      page_size: config.page_size.clamp(1, 100),
      rate_limit_retries: config.rate_limit_retries,
      rate_limit_delay: Duration::from_millis(config.rate_limit_delay_ms),
    })
  }

  fn record_url(&self, id: &str) -> Result<Url> {
    let mut url = self.table_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| SyncError::RemoteUnavailable(format!("invalid table url {}", self.table_url)))?
      .push(id);
    Ok(url)
  }

  /// List records page by page, optionally restricted by a formula.
  async fn list(&self, formula: Option<&str>) -> Result<Vec<RawRecord>> {
    let mut all_records = Vec::new();
    let mut offset: Option<String> = None;

    loop {
      let response = self
        .send(|| {
          let mut params = vec![("pageSize", self.page_size.to_string())];
          if let Some(formula) = formula {
            params.push(("filterByFormula", formula.to_string()));
          }
          if let Some(offset) = &offset {
            params.push(("offset", offset.clone()));
          }
          self.http.get(self.table_url.clone()).query(&params)
        })
        .await
        .map_err(|e| match e {
          SyncError::NotFound(_) => {
            SyncError::RemoteUnavailable(format!("table {} not found", self.table_url))
          }
          other => other,
        })?;

      let page: ApiListResponse = response.json().await?;
      debug!(records = page.records.len(), "fetched page");
      all_records.extend(page.records);

      match page.offset {
        Some(next) => offset = Some(next),
        None => break,
      }
    }

    Ok(all_records)
  }

  /// Send a request, waiting out rate limiting and rejecting non-2xx answers.
  ///
  /// A 404 becomes [`SyncError::NotFound`] carrying the request path.
  async fn send<F>(&self, build: F) -> Result<Response>
  where
    F: Fn() -> RequestBuilder,
  {
    let mut attempts = 0;

    loop {
      let response = build().bearer_auth(&self.token).send().await?;
      let status = response.status();

      if status == StatusCode::TOO_MANY_REQUESTS {
        attempts += 1;
        if attempts > self.rate_limit_retries {
          return Err(SyncError::RemoteUnavailable(format!(
            "still rate limited after {} retries",
            self.rate_limit_retries
          )));
        }
        warn!(attempt = attempts, "rate limited by remote, retrying");
        tokio::time::sleep(self.rate_limit_delay).await;
        continue;
      }

      if status == StatusCode::NOT_FOUND {
        return Err(SyncError::NotFound(response.url().path().to_string()));
      }

      if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SyncError::RemoteUnavailable(format!(
          "{} returned {}: {}",
          self.table_url, status, body
        )));
      }

      return Ok(response);
    }
  }
}

impl RemoteSource for AirtableClient {
  async fn fetch_all(&self) -> Result<Vec<RawRecord>> {
    self.list(None).await
  }

  async fn fetch_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RawRecord>> {
    let formula = modified_since_formula(cutoff);
    self.list(Some(&formula)).await
  }

  async fn update(&self, id: &str, update: &OrderUpdate) -> Result<RawRecord> {
    let url = self.record_url(id)?;
    let body = ApiUpdateRequest {
      fields: ApiUpdateFields {
        status: update.status.map(|s| s.as_str()),
        priority: update.priority.map(|p| p.as_str()),
        updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
      },
    };

    let response = self
      .send(|| self.http.patch(url.clone()).json(&body))
      .await
      .map_err(|e| match e {
        SyncError::NotFound(_) => SyncError::NotFound(id.to_string()),
        other => other,
      })?;

    let record: RawRecord = response.json().await?;
    Ok(record)
  }
}

fn table_url(config: &AirtableConfig) -> EyreResult<Url> {
  let raw = format!(
    "{}/{}/{}",
    config.api_url.trim_end_matches('/'),
    config.base_id,
    config.table_id
  );
  Url::parse(&raw).map_err(|e| eyre!("Invalid Airtable URL {}: {}", raw, e))
}

/// Airtable formula selecting records modified or created after `cutoff`.
///
/// Rows created since the cutoff have a blank `Updated At`, so the record's
/// own modification and creation times are used instead of that column.
fn modified_since_formula(cutoff: DateTime<Utc>) -> String {
  let cutoff = format!(
    "DATETIME_PARSE('{}')",
    cutoff.to_rfc3339_opts(SecondsFormat::Secs, true)
  );
  format!(
    "OR(IS_AFTER(LAST_MODIFIED_TIME(), {cutoff}), IS_AFTER(CREATED_TIME(), {cutoff}))"
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn config() -> AirtableConfig {
    AirtableConfig {
      base_id: "appBase".to_string(),
      table_id: "tblOrders".to_string(),
      ..AirtableConfig::default()
    }
  }

  #[test]
  fn test_table_url() {
    let url = table_url(&config()).unwrap();
    assert_eq!(url.as_str(), "https://api.airtable.com/v0/appBase/tblOrders");
  }

  #[test]
  fn test_record_url_appends_id() {
    let client = AirtableClient::with_token(&config(), "token".to_string()).unwrap();
    let url = client.record_url("rec123").unwrap();
    assert_eq!(
      url.as_str(),
      "https://api.airtable.com/v0/appBase/tblOrders/rec123"
    );
  }

  #[test]
  fn test_page_size_capped_by_remote_limit() {
    let mut cfg = config();
    cfg.page_size = 500;
    let client = AirtableClient::with_token(&cfg, "token".to_string()).unwrap();
    assert_eq!(client.page_size, 100);
  }

  #[test]
  fn test_modified_since_formula() {
    let cutoff = Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap();
    assert_eq!(
      modified_since_formula(cutoff),
      "OR(IS_AFTER(LAST_MODIFIED_TIME(), DATETIME_PARSE('2025-04-01T10:00:00Z')), \
       IS_AFTER(CREATED_TIME(), DATETIME_PARSE('2025-04-01T10:00:00Z')))"
    );
  }
}
