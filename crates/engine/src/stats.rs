//! Per-column descriptive statistics.
//!
//! Pure function of (rows, schema). Three shapes, chosen by column type:
//! numeric for number/currency, boolean for boolean, categorical for the
//! rest. `null_count` is always `total_rows - present_values`.

use std::collections::{BTreeMap, HashMap};

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::coerce::{display_string, is_present, to_number};
use crate::model::{Column, ColumnType, Row, Value};

/// Maximum number of entries in `top_values`.
pub const TOP_VALUES_LIMIT: usize = 5;

/// Statistics for every column in a schema, keyed by column key.
pub type StatisticsMap = BTreeMap<String, ColumnStatistics>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnStatistics {
    Numeric(NumericStats),
    Boolean(BooleanStats),
    Categorical(CategoricalStats),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Element at index `count / 2` of the ascending values. For even counts
    /// this is the upper of the two central elements, not their average.
    pub median: f64,
    pub sum: f64,
    pub null_count: usize,
    /// Population variance (denominator = count).
    pub variance: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanStats {
    pub count: usize,
    pub true_count: usize,
    pub false_count: usize,
    /// 0 when the column holds no booleans at all.
    pub true_percentage: f64,
    pub null_count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalStats {
    pub count: usize,
    pub unique_count: usize,
    pub null_count: usize,
    pub top_values: Vec<ValueCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

impl ColumnStatistics {
    pub fn null_count(&self) -> usize {
        match self {
            Self::Numeric(s) => s.null_count,
            Self::Boolean(s) => s.null_count,
            Self::Categorical(s) => s.null_count,
        }
    }

    pub fn as_numeric(&self) -> Option<&NumericStats> {
        match self {
            Self::Numeric(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<&BooleanStats> {
        match self {
            Self::Boolean(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&CategoricalStats> {
        match self {
            Self::Categorical(s) => Some(s),
            _ => None,
        }
    }
}

/// Compute statistics for every column of `schema` over `rows`.
pub fn compute_statistics(rows: &[Row], schema: &[Column]) -> StatisticsMap {
    schema
        .iter()
        .map(|column| (column.key.clone(), column_statistics(rows, column)))
        .collect()
}

/// Statistics for a single column.
pub fn column_statistics(rows: &[Row], column: &Column) -> ColumnStatistics {
    let present: Vec<&Value> = present_values(rows, &column.key).collect();
    let null_count = rows.len() - present.len();

    match column.kind {
        ColumnType::Number | ColumnType::Currency => {
            ColumnStatistics::Numeric(numeric_stats(&present, null_count))
        }
        ColumnType::Boolean => ColumnStatistics::Boolean(boolean_stats(&present, null_count)),
        ColumnType::String
        | ColumnType::Date
        | ColumnType::Percentage
        | ColumnType::Email
        | ColumnType::Url => ColumnStatistics::Categorical(categorical_stats(&present, null_count)),
    }
}

/// Present values of `key` across `rows`, in row order.
pub fn present_values<'a>(rows: &'a [Row], key: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
    rows.iter()
        .filter_map(move |row| row.get(key))
        .filter(|v| is_present(Some(*v)))
}

fn numeric_stats(present: &[&Value], null_count: usize) -> NumericStats {
    let values: Vec<f64> = present.iter().filter_map(|v| to_number(Some(*v))).collect();
    if values.is_empty() {
        return NumericStats { null_count, ..NumericStats::default() };
    }

    let mut sorted = values.clone();
    sorted.sort_by_key(|v| OrderedFloat(*v));

    let count = values.len();
    let sum: f64 = values.iter().sum();
    let mean = sum / count as f64;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;

    NumericStats {
        count,
        min: sorted[0],
        max: sorted[count - 1],
        mean,
        median: sorted[count / 2],
        sum,
        null_count,
        variance,
    }
}

fn boolean_stats(present: &[&Value], null_count: usize) -> BooleanStats {
    let true_count = present.iter().filter(|v| v.as_bool() == Some(true)).count();
    let false_count = present.iter().filter(|v| v.as_bool() == Some(false)).count();
    let count = true_count + false_count;
    let true_percentage = if count > 0 {
        true_count as f64 / count as f64 * 100.0
    } else {
        0.0
    };

    BooleanStats { count, true_count, false_count, true_percentage, null_count }
}

fn categorical_stats(present: &[&Value], null_count: usize) -> CategoricalStats {
    // First-encounter order is kept so ties stay stable below
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for value in present {
        let key = display_string(value);
        match index.get(&key) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(key.clone(), order.len());
                order.push((key, 1));
            }
        }
    }

    let unique_count = order.len();
    order.sort_by(|a, b| b.1.cmp(&a.1));
    let top_values = order
        .into_iter()
        .take(TOP_VALUES_LIMIT)
        .map(|(value, count)| ValueCount { value, count })
        .collect();

    CategoricalStats { count: present.len(), unique_count, null_count, top_values }
}
