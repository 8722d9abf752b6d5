use chrono::Utc;
use log::error;
use serde::Serialize;
use serde_json::{json, Value};

use crate::dashboard::{self, DashboardQuery};
use crate::pipeline::IngestResponse;
use crate::AppState;

fn internal_error() -> Value {
    json!({"status": "error", "message": "internal error"})
}

fn rejected(message: String) -> Value {
    serde_json::to_value(IngestResponse::Rejected { message }).unwrap_or_else(|_| internal_error())
}

/// Serializes a view, tagging plain objects with `"status": "success"`.
fn success<T: Serialize>(view: &T) -> anyhow::Result<Value> {
    let mut value = serde_json::to_value(view)?;
    if let Value::Object(map) = &mut value {
        map.entry("status").or_insert_with(|| json!("success"));
    }
    Ok(value)
}

/// Handles one input line: a dashboard query when it carries a `query` key,
/// otherwise a sensor sample.
pub async fn handle_line(state: &AppState, line: &str) -> Value {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => return rejected(format!("malformed JSON: {err}")),
    };

    if value.get("query").is_some() {
        return handle_query(state, value).await;
    }

    let response = state.pipeline.handle_sample(&value, Utc::now()).await;
    serde_json::to_value(&response).unwrap_or_else(|err| {
        error!("failed to serialize ingest response: {err}");
        internal_error()
    })
}

async fn handle_query(state: &AppState, value: Value) -> Value {
    let query: DashboardQuery = match serde_json::from_value(value) {
        Ok(query) => query,
        Err(err) => return rejected(format!("unsupported query: {err}")),
    };

    let now = Utc::now();
    let result = match query {
        DashboardQuery::Realtime => dashboard::realtime(&state.db, now)
            .await
            .and_then(|view| success(&view)),
        DashboardQuery::History { hours, limit } => dashboard::history(&state.db, hours, limit, now)
            .await
            .and_then(|view| success(&view)),
        DashboardQuery::Totals => dashboard::totals(&state.db)
            .await
            .and_then(|view| success(&view)),
        DashboardQuery::Status => state
            .runtime_status()
            .await
            .and_then(|view| success(&view)),
        DashboardQuery::Sensors { limit, offset } => {
            dashboard::sensor_page(&state.db, limit, offset)
                .await
                .and_then(|view| success(&view))
        }
        DashboardQuery::Predictions { limit, offset } => {
            dashboard::prediction_page(&state.db, limit, offset)
                .await
                .and_then(|view| success(&view))
        }
    };

    result.unwrap_or_else(|err| {
        error!("dashboard query failed: {err:?}");
        internal_error()
    })
}
