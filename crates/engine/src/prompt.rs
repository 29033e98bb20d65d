//! Prompts sent to the remote model.

use crate::model::{Column, Row};
use crate::remote::CompletionRequest;
use crate::stats::StatisticsMap;

/// Rows embedded in the interpretation prompt.
pub const QUERY_SAMPLE_ROWS: usize = 5;
/// Rows embedded in the insights prompt.
pub const INSIGHTS_SAMPLE_ROWS: usize = 10;

pub const TEMPERATURE: f32 = 0.3;
pub const QUERY_MAX_TOKENS: u32 = 2000;
pub const INSIGHTS_MAX_TOKENS: u32 = 1500;

pub const QUERY_SYSTEM_PROMPT: &str = "You are an expert data analyst AI. Provide accurate, \
actionable insights and data filtering instructions based on natural language queries.";

pub const INSIGHTS_SYSTEM_PROMPT: &str =
    "You are an expert data scientist. Provide accurate, actionable insights based on data analysis.";

const QUERY_RESPONSE_FORMAT: &str = r#"{
  "interpretation": "What the user is asking for",
  "filters": [
    {
      "column": "column_key",
      "operator": "equals|contains|greater_than|less_than|between",
      "value": "filter_value"
    }
  ],
  "sorting": {
    "column": "column_key",
    "direction": "asc|desc"
  },
  "aggregations": [
    {
      "column": "column_key",
      "function": "sum|avg|count|min|max"
    }
  ],
  "insights": [
    {
      "type": "trend|anomaly|correlation|summary|prediction",
      "title": "Insight title",
      "description": "Detailed insight description",
      "confidence": 0.85
    }
  ],
  "confidence": 0.9
}"#;

const INSIGHTS_RESPONSE_FORMAT: &str = r#"{
  "insights": [
    {
      "type": "trend|anomaly|correlation|summary|prediction",
      "title": "Insight title",
      "description": "Detailed insight description with specific findings",
      "confidence": 0.85
    }
  ]
}"#;

/// Prompt asking the model to turn `query` into a structured instruction.
pub fn query_request(query: &str, rows: &[Row], schema: &[Column]) -> CompletionRequest {
    let user = format!(
        "You are an AI data analyst. Analyze the following natural language query and provide a structured response.\n\n\
         Query: \"{query}\"\n\n\
         Data Context:\n\
         - Columns: {columns}\n\
         - Sample Data: {sample}\n\
         - Total Rows: {total}\n\n\
         Please provide a response in the following JSON format:\n\
         {QUERY_RESPONSE_FORMAT}\n\n\
         Focus on providing actionable insights and accurate data filtering based on the query.\n",
        columns = to_json(schema),
        sample = to_json(sample(rows, QUERY_SAMPLE_ROWS)),
        total = rows.len(),
    );

    CompletionRequest {
        system: QUERY_SYSTEM_PROMPT.to_string(),
        user,
        temperature: TEMPERATURE,
        max_tokens: QUERY_MAX_TOKENS,
    }
}

/// Prompt asking the model for 3-5 insights about the dataset.
pub fn insights_request(rows: &[Row], schema: &[Column], stats: &StatisticsMap) -> CompletionRequest {
    let user = format!(
        "Analyze the following dataset and provide actionable insights.\n\n\
         Data Context:\n\
         - Columns: {columns}\n\
         - Sample Data: {sample}\n\
         - Total Rows: {total}\n\
         - Statistics: {stats}\n\n\
         Please provide 3-5 insights in the following JSON format:\n\
         {INSIGHTS_RESPONSE_FORMAT}\n\n\
         Focus on:\n\
         1. Data trends and patterns\n\
         2. Anomalies or outliers\n\
         3. Correlations between variables\n\
         4. Summary statistics insights\n\
         5. Predictive observations\n\n\
         Provide specific, actionable insights based on the actual data.\n",
        columns = to_json(schema),
        sample = to_json(sample(rows, INSIGHTS_SAMPLE_ROWS)),
        total = rows.len(),
        stats = to_json(stats),
    );

    CompletionRequest {
        system: INSIGHTS_SYSTEM_PROMPT.to_string(),
        user,
        temperature: TEMPERATURE,
        max_tokens: INSIGHTS_MAX_TOKENS,
    }
}

fn sample(rows: &[Row], n: usize) -> &[Row] {
    &rows[..rows.len().min(n)]
}

// Model, column and stats types serialize infallibly; an empty array keeps
// the prompt well-formed if that ever changes.
fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}
