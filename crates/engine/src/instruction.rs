//! Structured query instructions.
//!
//! An [`Instruction`] is the only thing the execution engine ever sees.
//! Deserialization is lenient because instructions also arrive from a
//! remote model: malformed list items are dropped, an unknown operator
//! becomes [`FilterOperator::Unsupported`], and a malformed sort is ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{Column, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default, deserialize_with = "lenient_list")]
    pub filters: Vec<Filter>,
    #[serde(default, alias = "sorting", deserialize_with = "lenient_option")]
    pub sort: Option<Sort>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub aggregations: Vec<Aggregation>,
}

impl Instruction {
    /// No filter, no sort, no aggregation.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        self.filters.is_empty() && self.sort.is_none() && self.aggregations.is_empty()
    }

    /// Column keys referenced by this instruction that the schema lacks.
    pub fn unknown_columns<'a>(&'a self, schema: &[Column]) -> Vec<&'a str> {
        let referenced = self
            .filters
            .iter()
            .map(|f| f.column.as_str())
            .chain(self.sort.iter().map(|s| s.column.as_str()))
            .chain(self.aggregations.iter().map(|a| a.column.as_str()));

        let mut unknown: Vec<&str> = Vec::new();
        for key in referenced {
            if !schema.iter().any(|c| c.key == key) && !unknown.contains(&key) {
                unknown.push(key);
            }
        }
        unknown
    }
}

// ----------------------------------------------------------------------------
// Filters
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

impl Filter {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self { column: column.into(), operator, value: value.into() }
    }

    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOperator::Equals, value)
    }

    pub fn between(column: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::new(column, FilterOperator::Between, Value::List(vec![low.into(), high.into()]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
    Between,
    /// Any operator name not listed above. Passes every row.
    #[serde(other)]
    Unsupported,
}

// ----------------------------------------------------------------------------
// Sort
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub column: String,
    #[serde(default = "default_direction")]
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), direction: SortDirection::Asc }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), direction: SortDirection::Desc }
    }
}

/// Anything other than `"asc"` sorts descending, including a missing
/// direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[serde(other)]
    Desc,
}

fn default_direction() -> SortDirection {
    SortDirection::Desc
}

// ----------------------------------------------------------------------------
// Aggregations
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub column: String,
    pub function: AggregateFunction,
}

impl Aggregation {
    pub fn new(column: impl Into<String>, function: AggregateFunction) -> Self {
        Self { column: column.into(), function }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

// ----------------------------------------------------------------------------
// Lenient decoding
// ----------------------------------------------------------------------------

/// Accepts `null` or an array; items that fail to decode are skipped.
pub(crate) fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Accepts anything; yields `None` unless it decodes as `T`.
fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).ok())
}
