//! Insight Generator.
//!
//! The remote path asks the model for insights and keeps only well-formed
//! items. The fallback path walks six fixed generators in priority order:
//!
//! | Slot | Kind        | Emitted when                                  | Confidence |
//! |------|-------------|-----------------------------------------------|------------|
//! | 1    | summary     | always                                        | 0.95       |
//! | 2    | trend       | first number/currency column has a value      | 0.82       |
//! | 3    | anomaly     | some column has a missing value               | 0.88       |
//! | 4    | correlation | a boolean column exists                       | 0.75       |
//! | 5    | correlation | two number/currency columns exist             | 0.65       |
//! | 6    | prediction  | more than 10 rows and a number/currency column | 0.70       |
//!
//! At most [`MAX_INSIGHTS`] are returned, so slot 6 only survives when an
//! earlier slot was skipped. Ids and timestamps are always assigned locally.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::clock::{iso_timestamp, Clock};
use crate::coerce::format_number;
use crate::model::{first_column, Column, ColumnType, Row};
use crate::prompt;
use crate::remote::{extract_json_object, RemoteError, RemoteInsightProvider};
use crate::stats::{column_statistics, compute_statistics, present_values, StatisticsMap};

pub const MAX_INSIGHTS: usize = 5;

/// Columns missing more than this share of values are called out by name.
const SIGNIFICANT_MISSING_PERCENT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Trend,
    Anomaly,
    Correlation,
    Summary,
    Prediction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub timestamp: String,
}

/// An insight before it has been given an id and timestamp.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InsightSeed {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    pub confidence: f64,
}

impl InsightSeed {
    fn new(kind: InsightKind, title: impl Into<String>, description: impl Into<String>, confidence: f64) -> Self {
        Self { kind, title: title.into(), description: description.into(), confidence }
    }

    fn into_insight(self, id: String, timestamp: &str) -> Insight {
        Insight {
            id,
            kind: self.kind,
            title: self.title,
            description: self.description,
            confidence: self.confidence.clamp(0.0, 1.0),
            timestamp: timestamp.to_string(),
        }
    }
}

/// Decode the `insights` array of a remote reply, dropping malformed items.
pub fn parse_seeds(value: &serde_json::Value) -> Vec<InsightSeed> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| serde_json::from_value::<InsightSeed>(item.clone()).ok())
        .filter(|seed| seed.confidence.is_finite())
        .collect()
}

/// Give remote seeds local ids (`insight-<millis>-<index>`) and timestamps.
pub fn materialize_seeds(seeds: Vec<InsightSeed>, now: DateTime<Utc>) -> Vec<Insight> {
    let millis = now.timestamp_millis();
    let timestamp = iso_timestamp(now);
    seeds
        .into_iter()
        .take(MAX_INSIGHTS)
        .enumerate()
        .map(|(index, seed)| seed.into_insight(format!("insight-{millis}-{index}"), &timestamp))
        .collect()
}

pub struct InsightGenerator<'a> {
    remote: Option<&'a dyn RemoteInsightProvider>,
    clock: &'a dyn Clock,
}

impl<'a> InsightGenerator<'a> {
    pub fn new(remote: Option<&'a dyn RemoteInsightProvider>, clock: &'a dyn Clock) -> Self {
        Self { remote, clock }
    }

    /// At most [`MAX_INSIGHTS`] insights about `rows`.
    ///
    /// `stats` is only used for the remote prompt; it is computed on demand
    /// when not supplied.
    pub fn generate(&self, rows: &[Row], schema: &[Column], stats: Option<&StatisticsMap>) -> Vec<Insight> {
        if let Some(remote) = self.remote {
            match self.generate_remote(remote, rows, schema, stats) {
                Ok(insights) => return insights,
                Err(e) => warn!("{} insight generation failed, using fallback: {}", remote.name(), e),
            }
        }
        fallback_insights(rows, schema, self.clock.now())
    }

    fn generate_remote(
        &self,
        remote: &dyn RemoteInsightProvider,
        rows: &[Row],
        schema: &[Column],
        stats: Option<&StatisticsMap>,
    ) -> Result<Vec<Insight>, RemoteError> {
        let computed;
        let stats = match stats {
            Some(s) => s,
            None => {
                computed = compute_statistics(rows, schema);
                &computed
            }
        };

        let content = remote.complete(&prompt::insights_request(rows, schema, stats))?;
        let reply = extract_json_object(&content)?;
        let seeds = reply.get("insights").map(parse_seeds).unwrap_or_default();
        if seeds.is_empty() {
            return Err(RemoteError::InvalidResponse("no usable insights in reply".to_string()));
        }
        debug!("{} returned {} usable insight(s)", remote.name(), seeds.len());
        Ok(materialize_seeds(seeds, self.clock.now()))
    }
}

// ============================================================================
// Deterministic fallback
// ============================================================================

/// Keyword-free, network-free insights. Identical inputs and `now` give
/// identical output.
pub fn fallback_insights(rows: &[Row], schema: &[Column], now: DateTime<Utc>) -> Vec<Insight> {
    let generators: [(u8, fn(&[Row], &[Column]) -> Option<InsightSeed>); 6] = [
        (1, summary),
        (2, trend),
        (3, data_quality),
        (4, boolean_distribution),
        (5, numeric_relationship),
        (6, prediction),
    ];

    let millis = now.timestamp_millis();
    let timestamp = iso_timestamp(now);

    generators
        .iter()
        .filter_map(|(slot, generate)| generate(rows, schema).map(|seed| (slot, seed)))
        .take(MAX_INSIGHTS)
        .map(|(slot, seed)| seed.into_insight(format!("insight-{millis}-{slot}"), &timestamp))
        .collect()
}

fn numeric_columns(schema: &[Column]) -> Vec<&Column> {
    schema.iter().filter(|c| c.kind.is_numeric()).collect()
}

fn count_kind(schema: &[Column], kind: ColumnType) -> usize {
    schema.iter().filter(|c| c.kind == kind).count()
}

fn summary(rows: &[Row], schema: &[Column]) -> Option<InsightSeed> {
    Some(InsightSeed::new(
        InsightKind::Summary,
        "Dataset Overview",
        format!(
            "Your dataset contains {} records across {} columns. The data includes {} numeric fields, \
             {} text fields, {} boolean fields, and {} date fields. This provides a rich foundation \
             for comprehensive analysis.",
            rows.len(),
            schema.len(),
            numeric_columns(schema).len(),
            count_kind(schema, ColumnType::String),
            count_kind(schema, ColumnType::Boolean),
            count_kind(schema, ColumnType::Date),
        ),
        0.95,
    ))
}

fn trend(rows: &[Row], schema: &[Column]) -> Option<InsightSeed> {
    let column = first_column(schema, |c| c.kind.is_numeric())?;
    let stats = column_statistics(rows, column);
    let numeric = stats.as_numeric().filter(|s| s.count > 0)?;

    let (min, max, avg) = (numeric.min, numeric.max, numeric.mean);
    let above_midpoint = avg > (min + max) / 2.0;
    let (tendency, suggestion) = if above_midpoint {
        ("Values tend to be higher than the midpoint", "positive skewness")
    } else {
        ("Values are distributed around the lower range", "potential concentration in lower values")
    };

    Some(InsightSeed::new(
        InsightKind::Trend,
        format!("{} Statistical Analysis", column.label),
        format!(
            "The {} field shows an average value of {:.2}, ranging from {} to {} (range: {}). \
             {}, suggesting {}.",
            column.label.to_lowercase(),
            avg,
            format_number(min),
            format_number(max),
            format_number(max - min),
            tendency,
            suggestion,
        ),
        0.82,
    ))
}

fn data_quality(rows: &[Row], schema: &[Column]) -> Option<InsightSeed> {
    let total = rows.len();
    let missing: Vec<(&Column, usize)> = schema
        .iter()
        .map(|c| (c, total - present_values(rows, &c.key).count()))
        .filter(|(_, n)| *n > 0)
        .collect();
    if missing.is_empty() {
        return None;
    }

    let significant: Vec<&str> = missing
        .iter()
        .filter(|(_, n)| *n as f64 / total as f64 * 100.0 > SIGNIFICANT_MISSING_PERCENT)
        .map(|(c, _)| c.label.as_str())
        .collect();
    let callout = if significant.is_empty() {
        String::new()
    } else {
        format!("Columns with significant missing data (>10%): {}. ", significant.join(", "))
    };

    Some(InsightSeed::new(
        InsightKind::Anomaly,
        "Data Quality Assessment",
        format!(
            "Found missing values in {} columns. {}Consider data cleaning strategies such as \
             imputation, removal, or flagging incomplete records for better analysis accuracy.",
            missing.len(),
            callout,
        ),
        0.88,
    ))
}

fn boolean_distribution(rows: &[Row], schema: &[Column]) -> Option<InsightSeed> {
    let column = first_column(schema, |c| c.kind.is_boolean())?;
    let stats = column_statistics(rows, column);
    let b = stats.as_boolean()?;

    let tp = b.true_percentage;
    let bias = if tp > 70.0 {
        "This indicates a strong positive bias"
    } else if tp < 30.0 {
        "This shows a strong negative bias"
    } else {
        "This represents a relatively balanced distribution"
    };

    Some(InsightSeed::new(
        InsightKind::Correlation,
        format!("{} Distribution Analysis", column.label),
        format!(
            "The {} field shows {:.1}% positive values ({} records) and {:.1}% negative values \
             ({} records). {} which may impact analysis outcomes.",
            column.label.to_lowercase(),
            tp,
            b.true_count,
            100.0 - tp,
            b.false_count,
            bias,
        ),
        0.75,
    ))
}

fn numeric_relationship(_rows: &[Row], schema: &[Column]) -> Option<InsightSeed> {
    let numeric = numeric_columns(schema);
    let [first, second, ..] = numeric.as_slice() else {
        return None;
    };

    Some(InsightSeed::new(
        InsightKind::Correlation,
        format!("Relationship Between {} and {}", first.label, second.label),
        format!(
            "Analysis of the relationship between {} and {} suggests potential correlations worth \
             investigating. Consider creating scatter plots or correlation matrices to identify \
             linear relationships, trends, or dependencies between these variables that could \
             inform business decisions.",
            first.label.to_lowercase(),
            second.label.to_lowercase(),
        ),
        0.65,
    ))
}

fn prediction(rows: &[Row], schema: &[Column]) -> Option<InsightSeed> {
    let numeric = numeric_columns(schema).len();
    if rows.len() <= 10 || numeric == 0 {
        return None;
    }

    Some(InsightSeed::new(
        InsightKind::Prediction,
        "Predictive Analysis Opportunities",
        format!(
            "With {} data points and {} numeric variables, this dataset is suitable for predictive \
             modeling. Consider implementing regression analysis, time series forecasting, or \
             machine learning models to predict future trends and identify key performance \
             indicators.",
            rows.len(),
            numeric,
        ),
        0.70,
    ))
}
