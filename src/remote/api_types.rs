//! Serde types matching Airtable REST API payloads.
//!
//! Kept separate from the domain types so the wire shape can change without
//! touching the cache.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Re-serialize a value through JSON to convert between compatible types.
/// Used to turn a record's loose field map into [`ApiOrderFields`].
pub fn reserialize<T: DeserializeOwned>(value: impl Serialize) -> serde_json::Result<T> {
  serde_json::from_value(serde_json::to_value(value)?)
}

// ============================================================================
// Records
// ============================================================================

/// A record exactly as returned by the remote table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
  #[serde(default)]
  pub id: String,
  /// Record creation time maintained by Airtable itself
  #[serde(rename = "createdTime", default, skip_serializing_if = "Option::is_none")]
  pub created_time: Option<String>,
  #[serde(default)]
  pub fields: Map<String, Value>,
}

/// One page of the list endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiListResponse {
  #[serde(default)]
  pub records: Vec<RawRecord>,
  /// Cursor for the next page; absent on the last page
  pub offset: Option<String>,
}

/// Typed view over the order table's columns.
#[derive(Debug, Default, Deserialize)]
pub struct ApiOrderFields {
  #[serde(rename = "Order ID", default, deserialize_with = "string_or_number")]
  pub order_id: Option<String>,
  #[serde(rename = "Customer", alias = "Customer Name", default)]
  pub customer: Option<String>,
  #[serde(rename = "Status", default)]
  pub status: Option<String>,
  #[serde(rename = "Priority", default)]
  pub priority: Option<String>,
  #[serde(rename = "Order Total", default, deserialize_with = "number_or_string")]
  pub order_total: Option<f64>,
  #[serde(rename = "Created At", default)]
  pub created_at: Option<String>,
  #[serde(rename = "Updated At", default)]
  pub updated_at: Option<String>,
}

// ============================================================================
// Update request
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiUpdateFields {
  #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
  pub status: Option<&'static str>,
  #[serde(rename = "Priority", skip_serializing_if = "Option::is_none")]
  pub priority: Option<&'static str>,
  #[serde(rename = "Updated At")]
  pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct ApiUpdateRequest {
  pub fields: ApiUpdateFields,
}

// ============================================================================
// Helpers
// ============================================================================

/// Accept both `"42.5"` and `42.5` for numeric columns.
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<Value>::deserialize(deserializer)? {
    None | Some(Value::Null) => Ok(None),
    Some(Value::Number(n)) => n
      .as_f64()
      .map(Some)
      .ok_or_else(|| serde::de::Error::custom("number out of range")),
    Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
    Some(Value::String(s)) => s
      .trim()
      .parse::<f64>()
      .map(Some)
      .map_err(|_| serde::de::Error::custom(format!("'{}' is not a number", s))),
    Some(other) => Err(serde::de::Error::custom(format!(
      "expected a number, got {}",
      other
    ))),
  }
}

/// Autonumber columns come back as numbers, text columns as strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<Value>::deserialize(deserializer)? {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(s)) => Ok(Some(s)),
    Some(Value::Number(n)) => Ok(Some(n.to_string())),
    Some(other) => Err(serde::de::Error::custom(format!(
      "expected a string, got {}",
      other
    ))),
  }
}
