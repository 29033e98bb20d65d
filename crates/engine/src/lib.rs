//! `tabsight-engine` - tabular statistics, query execution and insights.
//!
//! Pure engine crate: receives rows and a schema, returns statistics,
//! filtered rows and insights. No CLI, filesystem or network dependencies;
//! the only outbound call goes through an injected [`RemoteInsightProvider`].

pub mod aggregate;
pub mod clock;
pub mod coerce;
pub mod execute;
pub mod insights;
pub mod instruction;
pub mod interpreter;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod remote;
pub mod stats;

pub use aggregate::{evaluate_aggregations, AggregateResult};
pub use clock::{Clock, FixedClock, SystemClock};
pub use execute::execute;
pub use insights::{fallback_insights, Insight, InsightGenerator, InsightKind, MAX_INSIGHTS};
pub use instruction::{AggregateFunction, Aggregation, Filter, FilterOperator, Instruction, Sort, SortDirection};
pub use interpreter::{fallback_instruction, Interpretation, InterpretationSource, Interpreter};
pub use model::{Column, ColumnType, Row, Value};
pub use pipeline::{assemble, QueryEngine, QueryResult};
pub use remote::{CompletionRequest, RemoteError, RemoteInsightProvider};
pub use stats::{compute_statistics, ColumnStatistics, StatisticsMap};
