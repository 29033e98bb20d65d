//! Tabsight request/response protocol.
//!
//! This crate defines the JSON wire format for query, insights and health
//! requests. Field names are camelCase and frozen; adding optional fields is
//! compatible, renaming or removing one is not.
//!
//! # Usage
//!
//! ```ignore
//! use tabsight_protocol::{parse_query_request, Envelope};
//!
//! let request = parse_query_request(&body)?;
//! let result = engine.run(request.query_text(), &request.data, &request.columns);
//! let json = serde_json::to_string(&Envelope::query(result, timestamp))?;
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value as Json;
use tabsight_engine::{Column, ColumnType, Insight, QueryResult, Row};

/// Service name reported by the health endpoint.
pub const SERVICE_NAME: &str = "Tabsight";

/// `details` of a 500 from the query endpoint.
pub const QUERY_FAILURE_DETAILS: &str = "Please check your query and try again";
/// `details` of a 500 from the insights endpoint.
pub const INSIGHTS_FAILURE_DETAILS: &str = "Please check your data format and try again";

// =============================================================================
// Requests
// =============================================================================

/// `{ query?, data, columns }`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub query: Option<String>,
    pub data: Vec<Row>,
    pub columns: Vec<Column>,
}

impl QueryRequest {
    /// The query text, empty when none was sent.
    pub fn query_text(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }
}

/// `{ data, columns }`
#[derive(Debug, Clone, PartialEq)]
pub struct InsightsRequest {
    pub data: Vec<Row>,
    pub columns: Vec<Column>,
}

/// Why a request was rejected. Every variant maps to HTTP 400.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Body is not JSON, or not a JSON object
    InvalidBody(String),
    MissingField(&'static str),
    NotAnArray(&'static str),
    EmptyData,
    EmptyColumns,
    /// An element of `data` or `columns` could not be decoded
    InvalidElement { field: &'static str, index: usize, reason: String },
    InvalidQuery,
    DuplicateColumnKey(String),
}

impl ValidationError {
    /// Short message for the envelope's `error` field.
    pub fn message(&self) -> String {
        match self {
            Self::InvalidBody(_) => "Invalid request body".to_string(),
            Self::MissingField(field) => format!("Missing required field: {}", field),
            Self::NotAnArray(field) => format!("Field {} must be an array", field),
            Self::EmptyData => "Data array cannot be empty".to_string(),
            Self::EmptyColumns => "Columns array cannot be empty".to_string(),
            Self::InvalidElement { field, index, .. } => format!("Invalid {} entry at index {}", field, index),
            Self::InvalidQuery => "Field query must be a string".to_string(),
            Self::DuplicateColumnKey(key) => format!("Duplicate column key: {}", key),
        }
    }

    /// Extra context for the envelope's `details` field.
    pub fn details(&self) -> Option<String> {
        match self {
            Self::InvalidBody(reason) | Self::InvalidElement { reason, .. } => Some(reason.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.details() {
            Some(details) => write!(f, "{}: {}", self.message(), details),
            None => f.write_str(&self.message()),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Parse and validate a query request body.
pub fn parse_query_request(body: &str) -> Result<QueryRequest, ValidationError> {
    let json = parse_body(body)?;
    let (data, columns) = dataset(&json)?;
    let query = match json.get("query") {
        None | Some(Json::Null) => None,
        Some(Json::String(s)) => Some(s.clone()),
        Some(_) => return Err(ValidationError::InvalidQuery),
    };
    Ok(QueryRequest { query, data, columns })
}

/// Parse and validate an insights request body.
pub fn parse_insights_request(body: &str) -> Result<InsightsRequest, ValidationError> {
    let json = parse_body(body)?;
    let (data, columns) = dataset(&json)?;
    Ok(InsightsRequest { data, columns })
}

fn parse_body(body: &str) -> Result<Json, ValidationError> {
    let json: Json = serde_json::from_str(body).map_err(|e| ValidationError::InvalidBody(e.to_string()))?;
    if !json.is_object() {
        return Err(ValidationError::InvalidBody("request body must be a JSON object".to_string()));
    }
    Ok(json)
}

/// Shared `data`/`columns` checks, in reporting order: presence, array
/// shape, emptiness, element decoding, column key uniqueness.
fn dataset(json: &Json) -> Result<(Vec<Row>, Vec<Column>), ValidationError> {
    let data = required(json, "data")?;
    let columns = required(json, "columns")?;

    let data = data.as_array().ok_or(ValidationError::NotAnArray("data"))?;
    let columns = columns.as_array().ok_or(ValidationError::NotAnArray("columns"))?;

    if data.is_empty() {
        return Err(ValidationError::EmptyData);
    }
    if columns.is_empty() {
        return Err(ValidationError::EmptyColumns);
    }

    let columns: Vec<Column> = decode_all("columns", columns)?;
    let rows: Vec<Row> = decode_all("data", data)?;

    let mut seen = HashSet::new();
    for column in &columns {
        if !seen.insert(column.key.as_str()) {
            return Err(ValidationError::DuplicateColumnKey(column.key.clone()));
        }
    }

    Ok((rows, columns))
}

fn required<'a>(json: &'a Json, field: &'static str) -> Result<&'a Json, ValidationError> {
    match json.get(field) {
        None | Some(Json::Null) => Err(ValidationError::MissingField(field)),
        Some(v) => Ok(v),
    }
}

fn decode_all<T: serde::de::DeserializeOwned>(field: &'static str, items: &[Json]) -> Result<Vec<T>, ValidationError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item.clone()).map_err(|e| ValidationError::InvalidElement {
                field,
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

// =============================================================================
// Responses
// =============================================================================

/// HTTP-equivalent status of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    InternalError,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::InternalError => 500,
        }
    }
}

/// Response wrapper shared by every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<Vec<Insight>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<InsightsMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsMetadata {
    pub total_records: usize,
    pub total_columns: usize,
    pub insight_count: usize,
    pub generated_at: String,
}

impl Envelope {
    fn empty(success: bool, timestamp: String) -> Self {
        Self {
            success,
            result: None,
            insights: None,
            metadata: None,
            error: None,
            details: None,
            timestamp,
        }
    }

    pub fn query(result: QueryResult, timestamp: String) -> Self {
        Self { result: Some(result), ..Self::empty(true, timestamp) }
    }

    pub fn insights(request: &InsightsRequest, insights: Vec<Insight>, timestamp: String) -> Self {
        let metadata = InsightsMetadata {
            total_records: request.data.len(),
            total_columns: request.columns.len(),
            insight_count: insights.len(),
            generated_at: timestamp.clone(),
        };
        Self {
            insights: Some(insights),
            metadata: Some(metadata),
            ..Self::empty(true, timestamp)
        }
    }

    pub fn rejected(error: &ValidationError, timestamp: String) -> Self {
        Self {
            error: Some(error.message()),
            details: error.details(),
            ..Self::empty(false, timestamp)
        }
    }

    pub fn failure(error: impl Into<String>, details: &str, timestamp: String) -> Self {
        Self {
            error: Some(error.into()),
            details: Some(details.to_string()),
            ..Self::empty(false, timestamp)
        }
    }
}

/// A status plus the envelope to send with it.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub body: Envelope,
}

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub features: Features,
    pub supported_data_types: Vec<ColumnType>,
    pub ai_provider: String,
    pub ai_key_present: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub natural_language_query: bool,
    pub ai_insights: bool,
    pub keyword_fallback: bool,
    pub statistics: bool,
    pub aggregations: bool,
}

impl HealthReport {
    pub fn healthy(version: &'static str, timestamp: String, ai_provider: &str, ai_key_present: bool) -> Self {
        Self {
            status: "healthy",
            service: SERVICE_NAME,
            version,
            timestamp,
            features: Features {
                natural_language_query: true,
                ai_insights: ai_key_present,
                keyword_fallback: true,
                statistics: true,
                aggregations: true,
            },
            supported_data_types: ColumnType::ALL.to_vec(),
            ai_provider: ai_provider.to_string(),
            ai_key_present,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &str = r#"[{"key":"name","label":"Name","type":"string"}]"#;

    fn body(data: &str, columns: &str) -> String {
        format!(r#"{{"query":"top","data":{data},"columns":{columns}}}"#)
    }

    fn message(body: &str) -> String {
        parse_query_request(body).unwrap_err().message()
    }

    #[test]
    fn missing_and_empty_fields() {
        assert_eq!(message(&format!(r#"{{"columns":{COLUMNS}}}"#)), "Missing required field: data");
        assert_eq!(message(r#"{"data":[{"name":"a"}]}"#), "Missing required field: columns");
        assert_eq!(message(&body("null", COLUMNS)), "Missing required field: data");
        assert_eq!(message(&body("[]", COLUMNS)), "Data array cannot be empty");
        assert_eq!(message(&body(r#"[{"name":"a"}]"#, "[]")), "Columns array cannot be empty");
        assert_eq!(message(&body(r#"{"name":"a"}"#, COLUMNS)), "Field data must be an array");
    }

    #[test]
    fn bad_json_has_details() {
        let err = parse_query_request("{oops").unwrap_err();
        assert_eq!(err.message(), "Invalid request body");
        assert!(err.details().is_some());
        assert!(matches!(parse_query_request("[1]"), Err(ValidationError::InvalidBody(_))));
    }

    #[test]
    fn element_errors_name_their_index() {
        let err = parse_query_request(&body(r#"[{"name":"a"}, 7]"#, COLUMNS)).unwrap_err();
        assert_eq!(err.message(), "Invalid data entry at index 1");

        let cols = r#"[{"key":"a","label":"A","type":"blob"}]"#;
        let err = parse_query_request(&body(r#"[{"a":1}]"#, cols)).unwrap_err();
        assert_eq!(err.message(), "Invalid columns entry at index 0");
    }

    #[test]
    fn duplicate_column_keys_rejected() {
        let cols = r#"[{"key":"a","label":"A","type":"number"},{"key":"a","label":"B","type":"string"}]"#;
        assert_eq!(message(&body(r#"[{"a":1}]"#, cols)), "Duplicate column key: a");
    }

    #[test]
    fn query_is_optional_but_must_be_text() {
        let req = parse_insights_request(&format!(r#"{{"data":[{{"name":"a"}}],"columns":{COLUMNS}}}"#)).unwrap();
        assert_eq!(req.data.len(), 1);

        let req = parse_query_request(&format!(r#"{{"data":[{{"name":"a"}}],"columns":{COLUMNS}}}"#)).unwrap();
        assert_eq!(req.query_text(), "");

        let bad = format!(r#"{{"query":5,"data":[{{"name":"a"}}],"columns":{COLUMNS}}}"#);
        assert_eq!(parse_query_request(&bad), Err(ValidationError::InvalidQuery));
    }

    #[test]
    fn rejected_envelope_shape() {
        let json = serde_json::to_value(Envelope::rejected(&ValidationError::EmptyData, "t".into())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "error": "Data array cannot be empty", "timestamp": "t"})
        );
    }

    #[test]
    fn status_codes() {
        assert_eq!(Status::Ok.code(), 200);
        assert_eq!(Status::BadRequest.code(), 400);
        assert_eq!(Status::InternalError.code(), 500);
    }
}
