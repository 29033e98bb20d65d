use serde::Serialize;

use crate::coerce::{date_from_ordinal, to_date_ordinal, to_number};
use crate::instruction::{AggregateFunction, Aggregation};
use crate::model::{Column, ColumnType, Row, Value};
use crate::stats::present_values;

/// Result of one instruction-driven aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub column: String,
    pub function: AggregateFunction,
    pub value: Value,
}

/// Evaluate each requested aggregation over `rows`.
///
/// `count` counts present values. `sum`/`avg`/`min`/`max` use values that
/// coerce to finite numbers; with none, `sum` is 0 and the rest are null.
/// `min`/`max` over a date column report the earliest/latest date instead.
pub fn evaluate_aggregations(
    rows: &[Row],
    schema: &[Column],
    aggregations: &[Aggregation],
) -> Vec<AggregateResult> {
    aggregations
        .iter()
        .map(|agg| {
            let kind = schema.iter().find(|c| c.key == agg.column).map(|c| c.kind);
            AggregateResult {
                column: agg.column.clone(),
                function: agg.function,
                value: evaluate(rows, &agg.column, agg.function, kind),
            }
        })
        .collect()
}

fn evaluate(rows: &[Row], key: &str, function: AggregateFunction, kind: Option<ColumnType>) -> Value {
    let is_date = kind == Some(ColumnType::Date);
    match function {
        AggregateFunction::Count => Value::Number(present_values(rows, key).count() as f64),
        AggregateFunction::Min if is_date => date_extreme(rows, key, true),
        AggregateFunction::Max if is_date => date_extreme(rows, key, false),
        AggregateFunction::Sum => Value::Number(finite_numbers(rows, key).iter().sum()),
        AggregateFunction::Avg => {
            let numbers = finite_numbers(rows, key);
            if numbers.is_empty() {
                Value::Null
            } else {
                Value::Number(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        AggregateFunction::Min => number_or_null(finite_numbers(rows, key).into_iter().reduce(f64::min)),
        AggregateFunction::Max => number_or_null(finite_numbers(rows, key).into_iter().reduce(f64::max)),
    }
}

fn finite_numbers(rows: &[Row], key: &str) -> Vec<f64> {
    present_values(rows, key)
        .filter_map(|v| to_number(Some(v)))
        .filter(|n| n.is_finite())
        .collect()
}

fn number_or_null(n: Option<f64>) -> Value {
    n.map_or(Value::Null, Value::Number)
}

fn date_extreme(rows: &[Row], key: &str, earliest: bool) -> Value {
    let days = present_values(rows, key).filter_map(|v| to_date_ordinal(Some(v)));
    let picked = if earliest { days.min() } else { days.max() };
    picked.map_or(Value::Null, |d| Value::Text(date_from_ordinal(d)))
}
