//! End-to-end query pipeline and the Result Assembler.
//!
//! interpret -> execute -> statistics -> insights -> assemble, strictly in
//! that order. A [`QueryEngine`] holds only injected capabilities (remote
//! provider, clock, row limit); nothing is shared between calls.

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::aggregate::{evaluate_aggregations, AggregateResult};
use crate::clock::{Clock, SystemClock};
use crate::execute::execute;
use crate::insights::{materialize_seeds, Insight, InsightGenerator};
use crate::interpreter::{InterpretationSource, Interpreter};
use crate::model::{Column, Row};
use crate::remote::RemoteInsightProvider;
use crate::stats::{compute_statistics, StatisticsMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub insights: Vec<Insight>,
    /// Rows matching the instruction, before any row limit.
    pub total_count: usize,
    pub execution_time_ms: u64,
    pub query: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<AggregateResult>,
}

/// Package a finished query. Pure: `executionTimeMs` is `finished - started`,
/// clamped at zero, and `totalCount` is the number of rows given.
pub fn assemble(
    rows: Vec<Row>,
    insights: Vec<Insight>,
    started: DateTime<Utc>,
    finished: DateTime<Utc>,
    query: &str,
    confidence: f64,
) -> QueryResult {
    let elapsed = (finished - started).num_milliseconds().max(0) as u64;
    QueryResult {
        total_count: rows.len(),
        rows,
        insights,
        execution_time_ms: elapsed,
        query: query.to_string(),
        confidence: confidence.clamp(0.0, 1.0),
        interpretation: None,
        aggregations: Vec::new(),
    }
}

pub struct QueryEngine {
    remote: Option<Box<dyn RemoteInsightProvider>>,
    clock: Box<dyn Clock>,
    max_rows: Option<usize>,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine {
    /// Offline engine on the system clock with no row limit.
    pub fn new() -> Self {
        Self { remote: None, clock: Box::new(SystemClock), max_rows: None }
    }

    pub fn with_remote(mut self, remote: Box<dyn RemoteInsightProvider>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Truncate returned rows to `limit`; `totalCount` still counts all matches.
    pub fn with_max_rows(mut self, limit: usize) -> Self {
        self.max_rows = Some(limit);
        self
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    fn remote(&self) -> Option<&dyn RemoteInsightProvider> {
        self.remote.as_deref()
    }

    /// Answer a natural-language query over `rows`.
    pub fn run(&self, query: &str, rows: &[Row], schema: &[Column]) -> QueryResult {
        let started = self.clock.now();

        let interpretation = Interpreter::new(self.remote()).interpret(query, rows, schema);
        let instruction = &interpretation.instruction;

        let mut matched = execute(rows, instruction);
        debug!("{} of {} rows matched", matched.len(), rows.len());

        let aggregations = evaluate_aggregations(&matched, schema, &instruction.aggregations);
        let stats = compute_statistics(&matched, schema);

        let insights = if !interpretation.seeds.is_empty() {
            materialize_seeds(interpretation.seeds.clone(), self.clock.now())
        } else {
            // A remote that just failed to interpret is not asked again
            let remote = match interpretation.source {
                InterpretationSource::Remote => self.remote(),
                InterpretationSource::Fallback => None,
            };
            InsightGenerator::new(remote, self.clock.as_ref()).generate(&matched, schema, Some(&stats))
        };

        let total = matched.len();
        if let Some(limit) = self.max_rows {
            matched.truncate(limit);
        }

        let mut result = assemble(
            matched,
            insights,
            started,
            self.clock.now(),
            query,
            interpretation.confidence,
        );
        result.total_count = total;
        result.interpretation = interpretation.interpretation;
        result.aggregations = aggregations;
        result
    }

    /// Insights-only entry point.
    pub fn insights(&self, rows: &[Row], schema: &[Column]) -> Vec<Insight> {
        let stats = compute_statistics(rows, schema);
        InsightGenerator::new(self.remote(), self.clock.as_ref()).generate(rows, schema, Some(&stats))
    }

    pub fn statistics(&self, rows: &[Row], schema: &[Column]) -> StatisticsMap {
        compute_statistics(rows, schema)
    }
}
