//! LLM-extractable models for requirement extraction and verification
//!
//! These mirror the declared output schemas but accept the variance models
//! actually produce: numbers as strings, missing optional arrays.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

use crate::model::Status;

static LEADING_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([+-]?\d+)").unwrap());

/// Payload of the extraction call
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedRequirements {
    #[serde(default)]
    pub requirements: Vec<ExtractedRequirement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedRequirement {
    #[serde(deserialize_with = "integer")]
    pub id: i64,
    pub parameter: String,
    pub requirement: String,
    pub source: String,
    pub notes: String,
}

/// Arguments of the `save_verification_results` tool call
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedVerification {
    #[serde(default)]
    pub verification_results: Vec<ExtractedResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedResult {
    #[serde(deserialize_with = "integer")]
    pub id: i64,
    pub parameter: String,
    pub requirement: String,
    pub source: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub actual_value: String,
    pub status: Status,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, deserialize_with = "page_number")]
    pub page_number: u32,
    #[serde(default)]
    pub best_document: Option<String>,
    #[serde(default, deserialize_with = "optional_list")]
    pub comparisons: Option<Vec<ExtractedComparison>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedComparison {
    pub document_name: String,
    #[serde(default)]
    pub actual_value: String,
    pub status: Status,
    #[serde(default, deserialize_with = "page_number")]
    pub page_number: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Integer from a JSON number or from the leading digits of a string
pub fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => LEADING_INTEGER
            .captures(s)
            .and_then(|caps| caps[1].parse().ok()),
        _ => None,
    }
}

fn integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_integer(&value)
        .ok_or_else(|| de::Error::custom(format!("expected an integer, found {value}")))
}

/// Page number; anything unusable means "unknown" (0)
fn page_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_integer(&value)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0))
}

/// Arrays pass through, any non-array value is treated as absent
fn optional_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: de::DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(de::Error::custom))
            .collect::<Result<Vec<T>, _>>()
            .map(Some),
        _ => Ok(None),
    }
}
