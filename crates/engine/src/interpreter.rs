//! Instruction Interpreter: natural-language query -> [`Instruction`].
//!
//! Two paths converge on the same output type:
//! - remote: prompt a [`RemoteInsightProvider`] and decode its JSON reply
//! - fallback: keyword heuristics, no I/O, never fails
//!
//! Any remote failure is logged and recovered through the fallback.

use log::{debug, warn};
use serde::Serialize;

use crate::insights::{parse_seeds, InsightSeed};
use crate::instruction::{Filter, Instruction, Sort};
use crate::model::{first_column, Column, Row};
use crate::prompt;
use crate::remote::{extract_json_object, RemoteError, RemoteInsightProvider};

/// Confidence reported for keyword-derived instructions.
pub const FALLBACK_CONFIDENCE: f64 = 0.75;
/// Confidence assumed when a remote reply omits one.
pub const DEFAULT_REMOTE_CONFIDENCE: f64 = 0.8;

const HIGH_WORDS: &[&str] = &["high", "top", "best", "maximum", "above"];
const LOW_WORDS: &[&str] = &["low", "bottom", "worst", "minimum", "below"];
const ACTIVE_WORDS: &[&str] = &["active", "enabled"];
const INACTIVE_WORDS: &[&str] = &["inactive", "disabled"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpretationSource {
    Remote,
    Fallback,
}

/// An instruction plus what the interpreter knows about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    pub instruction: Instruction,
    /// In [0, 1].
    pub confidence: f64,
    /// The model's restatement of the query, when it gave one.
    pub interpretation: Option<String>,
    /// Insights the model volunteered alongside the instruction.
    pub seeds: Vec<InsightSeed>,
    pub source: InterpretationSource,
}

impl Interpretation {
    fn fallback(instruction: Instruction) -> Self {
        Self {
            instruction,
            confidence: FALLBACK_CONFIDENCE,
            interpretation: None,
            seeds: Vec::new(),
            source: InterpretationSource::Fallback,
        }
    }
}

pub struct Interpreter<'a> {
    remote: Option<&'a dyn RemoteInsightProvider>,
}

impl<'a> Interpreter<'a> {
    pub fn new(remote: Option<&'a dyn RemoteInsightProvider>) -> Self {
        Self { remote }
    }

    /// Interpreter that never touches the network.
    pub fn offline() -> Self {
        Self { remote: None }
    }

    pub fn interpret(&self, query: &str, rows: &[Row], schema: &[Column]) -> Interpretation {
        let interpretation = match self.remote {
            Some(remote) if !query.trim().is_empty() => {
                match interpret_remote(remote, query, rows, schema) {
                    Ok(i) => i,
                    Err(e) => {
                        warn!("{} interpretation failed, using keyword fallback: {}", remote.name(), e);
                        Interpretation::fallback(fallback_instruction(query, schema))
                    }
                }
            }
            _ => Interpretation::fallback(fallback_instruction(query, schema)),
        };

        for key in interpretation.instruction.unknown_columns(schema) {
            warn!("instruction references unknown column '{}'", key);
        }
        debug!(
            "interpreted {:?} via {:?}: {} filter(s), sort={}, confidence {}",
            query,
            interpretation.source,
            interpretation.instruction.filters.len(),
            interpretation.instruction.sort.is_some(),
            interpretation.confidence
        );
        interpretation
    }
}

fn interpret_remote(
    remote: &dyn RemoteInsightProvider,
    query: &str,
    rows: &[Row],
    schema: &[Column],
) -> Result<Interpretation, RemoteError> {
    let content = remote.complete(&prompt::query_request(query, rows, schema))?;
    parse_interpretation(&content)
}

/// Decode a remote interpretation reply.
pub fn parse_interpretation(content: &str) -> Result<Interpretation, RemoteError> {
    let reply = extract_json_object(content)?;
    let instruction: Instruction = serde_json::from_value(reply.clone())
        .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

    let confidence = match reply.get("confidence").and_then(serde_json::Value::as_f64) {
        Some(c) if c != 0.0 && c.is_finite() => c.clamp(0.0, 1.0),
        _ => DEFAULT_REMOTE_CONFIDENCE,
    };

    Ok(Interpretation {
        instruction,
        confidence,
        interpretation: reply
            .get("interpretation")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        seeds: reply.get("insights").map(parse_seeds).unwrap_or_default(),
        source: InterpretationSource::Remote,
    })
}

/// Keyword heuristics over lowercase whitespace-separated tokens.
///
/// High words sort the first number/currency column descending, low words
/// ascending (low wins when both appear). Active/inactive words filter the
/// first boolean column to `true`/`false`.
pub fn fallback_instruction(query: &str, schema: &[Column]) -> Instruction {
    let lowered = query.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    let mentions = |words: &[&str]| tokens.iter().any(|t| words.contains(t));

    let mut instruction = Instruction::identity();

    if let Some(numeric) = first_column(schema, |c| c.kind.is_numeric()) {
        if mentions(HIGH_WORDS) {
            instruction.sort = Some(Sort::desc(numeric.key.clone()));
        }
        if mentions(LOW_WORDS) {
            instruction.sort = Some(Sort::asc(numeric.key.clone()));
        }
    }

    if let Some(flag) = first_column(schema, |c| c.kind.is_boolean()) {
        if mentions(ACTIVE_WORDS) {
            instruction.filters.push(Filter::equals(flag.key.clone(), true));
        }
        if mentions(INACTIVE_WORDS) {
            instruction.filters.push(Filter::equals(flag.key.clone(), false));
        }
    }

    instruction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::InsightKind;
    use crate::instruction::{FilterOperator, SortDirection};
    use crate::model::ColumnType;
    use crate::remote::CompletionRequest;
    use std::sync::Mutex;

    fn schema() -> Vec<Column> {
        vec![
            Column::new("name", "Name", ColumnType::String),
            Column::new("revenue", "Revenue", ColumnType::Currency),
            Column::new("score", "Score", ColumnType::Number),
            Column::new("active", "Active", ColumnType::Boolean),
        ]
    }

    struct Canned {
        reply: Result<String, RemoteError>,
        calls: Mutex<Vec<CompletionRequest>>,
    }

    impl Canned {
        fn new(reply: Result<&str, RemoteError>) -> Self {
            Self { reply: reply.map(str::to_string), calls: Mutex::new(Vec::new()) }
        }
    }

    impl RemoteInsightProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        fn complete(&self, request: &CompletionRequest) -> Result<String, RemoteError> {
            self.calls.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    #[test]
    fn top_sorts_first_numeric_descending() {
        let ins = fallback_instruction("Top performers", &schema());
        assert_eq!(ins.sort, Some(Sort::desc("revenue")));
        assert!(ins.filters.is_empty());
    }

    #[test]
    fn low_wins_over_high() {
        let ins = fallback_instruction("best and worst", &schema());
        assert_eq!(ins.sort.map(|s| s.direction), Some(SortDirection::Asc));
    }

    #[test]
    fn active_and_inactive_filters() {
        let ins = fallback_instruction("show active users", &schema());
        assert_eq!(ins.filters, vec![Filter::equals("active", true)]);

        let ins = fallback_instruction("disabled accounts", &schema());
        assert_eq!(ins.filters, vec![Filter::equals("active", false)]);

        let ins = fallback_instruction("active inactive", &schema());
        assert_eq!(ins.filters.len(), 2);
    }

    #[test]
    fn keywords_match_whole_tokens_only() {
        // "highlight" is not "high", "interactive" is not "active"
        assert!(fallback_instruction("highlight interactive rows", &schema()).is_identity());
        assert!(fallback_instruction("", &schema()).is_identity());
    }

    #[test]
    fn keywords_without_matching_columns_are_ignored() {
        let text_only = vec![Column::new("name", "Name", ColumnType::String)];
        assert!(fallback_instruction("top active", &text_only).is_identity());
    }

    #[test]
    fn offline_interpretation_uses_fallback_confidence() {
        let i = Interpreter::offline().interpret("top", &[], &schema());
        assert_eq!(i.source, InterpretationSource::Fallback);
        assert_eq!(i.confidence, FALLBACK_CONFIDENCE);
        assert!(i.seeds.is_empty());
    }

    #[test]
    fn remote_reply_is_decoded() {
        let remote = Canned::new(Ok(r#"```json
        {
          "interpretation": "high scorers",
          "filters": [{"column": "score", "operator": "greater_than", "value": 50}],
          "sorting": {"column": "score", "direction": "desc"},
          "insights": [
            {"type": "trend", "title": "Scores up", "description": "Rising.", "confidence": 0.9},
            {"type": "nonsense", "title": "x", "description": "y", "confidence": 0.1}
          ],
          "confidence": 0.92
        }
        ```"#));
        let i = Interpreter::new(Some(&remote)).interpret("high scorers", &[], &schema());

        assert_eq!(i.source, InterpretationSource::Remote);
        assert_eq!(i.confidence, 0.92);
        assert_eq!(i.interpretation.as_deref(), Some("high scorers"));
        assert_eq!(i.instruction.filters[0].operator, FilterOperator::GreaterThan);
        assert_eq!(i.instruction.sort, Some(Sort::desc("score")));
        assert_eq!(i.seeds.len(), 1);
        assert_eq!(i.seeds[0].kind, InsightKind::Trend);

        let calls = remote.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].max_tokens, prompt::QUERY_MAX_TOKENS);
    }

    #[test]
    fn missing_or_zero_confidence_defaults() {
        let i = parse_interpretation(r#"{"filters": []}"#).unwrap();
        assert_eq!(i.confidence, DEFAULT_REMOTE_CONFIDENCE);
        let i = parse_interpretation(r#"{"confidence": 0}"#).unwrap();
        assert_eq!(i.confidence, DEFAULT_REMOTE_CONFIDENCE);
        let i = parse_interpretation(r#"{"confidence": 7}"#).unwrap();
        assert_eq!(i.confidence, 1.0);
    }

    #[test]
    fn remote_failures_fall_back() {
        for reply in [
            Err(RemoteError::Network("connection refused".into())),
            Err(RemoteError::Http { status: 500, message: "boom".into() }),
            Ok("I cannot help with that"),
        ] {
            let remote = Canned::new(reply);
            let i = Interpreter::new(Some(&remote)).interpret("show active users", &[], &schema());
            assert_eq!(i.source, InterpretationSource::Fallback);
            assert_eq!(i.instruction.filters, vec![Filter::equals("active", true)]);
        }
    }

    #[test]
    fn blank_query_skips_remote() {
        let remote = Canned::new(Ok("{}"));
        let i = Interpreter::new(Some(&remote)).interpret("   ", &[], &schema());
        assert_eq!(i.source, InterpretationSource::Fallback);
        assert!(remote.calls.lock().unwrap().is_empty());
    }
}
