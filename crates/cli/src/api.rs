//! Request handlers: body text in, status plus envelope out.
//!
//! Each handler validates the body with `tabsight_protocol`, runs the engine
//! and wraps the outcome. A panic inside the engine (or a remote provider)
//! becomes a 500 with the endpoint's fixed `details` text.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error};
use tabsight_config::ResolvedAIConfig;
use tabsight_engine::clock::{iso_timestamp, Clock};
use tabsight_engine::{QueryEngine, StatisticsMap};
use tabsight_protocol::{
    parse_insights_request, parse_query_request, Envelope, HealthReport, Response, Status,
    ValidationError, INSIGHTS_FAILURE_DETAILS, QUERY_FAILURE_DETAILS,
};

const QUERY_FAILED: &str = "Query processing failed";
const INSIGHTS_FAILED: &str = "Insight generation failed";

/// `POST /query` equivalent.
pub fn handle_query(engine: &QueryEngine, body: &str, clock: &dyn Clock) -> Response {
    let request = match parse_query_request(body) {
        Ok(request) => request,
        Err(e) => return reject(&e, clock),
    };
    debug!(
        "query request: {} rows, {} columns, query={:?}",
        request.data.len(),
        request.columns.len(),
        request.query_text()
    );

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        engine.run(request.query_text(), &request.data, &request.columns)
    }));

    match outcome {
        Ok(result) => Response {
            status: Status::Ok,
            body: Envelope::query(result, now(clock)),
        },
        Err(payload) => {
            let message = panic_message(payload.as_ref()).unwrap_or_else(|| QUERY_FAILED.to_string());
            error!("query failed: {}", message);
            Response {
                status: Status::InternalError,
                body: Envelope::failure(message, QUERY_FAILURE_DETAILS, now(clock)),
            }
        }
    }
}

/// `POST /insights` equivalent.
pub fn handle_insights(engine: &QueryEngine, body: &str, clock: &dyn Clock) -> Response {
    let request = match parse_insights_request(body) {
        Ok(request) => request,
        Err(e) => return reject(&e, clock),
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.insights(&request.data, &request.columns)));

    match outcome {
        Ok(insights) => Response {
            status: Status::Ok,
            body: Envelope::insights(&request, insights, now(clock)),
        },
        Err(payload) => {
            let message = panic_message(payload.as_ref()).unwrap_or_else(|| INSIGHTS_FAILED.to_string());
            error!("insight generation failed: {}", message);
            Response {
                status: Status::InternalError,
                body: Envelope::failure(message, INSIGHTS_FAILURE_DETAILS, now(clock)),
            }
        }
    }
}

/// Per-column statistics for an insights-shaped body (`{data, columns}`).
pub fn statistics(engine: &QueryEngine, body: &str) -> Result<StatisticsMap, ValidationError> {
    let request = parse_insights_request(body)?;
    Ok(engine.statistics(&request.data, &request.columns))
}

/// `GET /health` equivalent. Never includes the key itself.
pub fn health(config: &ResolvedAIConfig, clock: &dyn Clock) -> HealthReport {
    HealthReport::healthy(
        env!("CARGO_PKG_VERSION"),
        now(clock),
        config.provider_name(),
        config.api_key.is_some(),
    )
}

fn reject(error: &ValidationError, clock: &dyn Clock) -> Response {
    debug!("request rejected: {}", error);
    Response {
        status: Status::BadRequest,
        body: Envelope::rejected(error, now(clock)),
    }
}

fn now(clock: &dyn Clock) -> String {
    iso_timestamp(clock.now())
}

fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
}
