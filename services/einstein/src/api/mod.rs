//! HTTP dispatch of orchestrator commands.
//!
//! `POST /v1/execute` takes `{"credentials": {...}, "command": "...",
//! "args": {...}}`, opens an orchestrator for the caller, runs the command
//! and closes it. An executed command always answers HTTP 200 with the
//! operation's status inside the envelope; requests that do not name a
//! valid command with valid arguments answer HTTP 400.

mod command;
mod health;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::orchestrator::Orchestrator;
use crate::response::Response;
use crate::state::AppState;

pub use bmi_wire::{Command, ExecuteRequest};
pub use command::dispatch;
pub use health::HealthResponse;

/// Create the router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .route("/v1/execute", post(execute))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn rejected(message: String) -> (StatusCode, Json<Value>) {
    warn!(message = %message, "Rejected request");
    (
        StatusCode::BAD_REQUEST,
        Json(Response::<()>::failure(400, message).into_json()),
    )
}

async fn execute(
    State(state): State<AppState>,
    body: Result<Json<ExecuteRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return rejected(rejection.body_text()),
    };
    let command = match request.parse_command() {
        Ok(command) => command,
        Err(e) => return rejected(format!("Invalid command {}: {e}", request.command)),
    };
    let credentials = request.credentials;

    let result = tokio::task::spawn_blocking(move || {
        let orch = match Orchestrator::open(
            state.provider(),
            state.policy(),
            state.settings().clone(),
            &credentials,
        ) {
            Ok(orch) => orch,
            Err(e) => {
                warn!(
                    command = command.name(),
                    project = %credentials.project,
                    error = %e,
                    "Failed to open orchestrator"
                );
                return Response::<()>::failure(e.status_code(), e.to_string()).into_json();
            }
        };

        let value = dispatch(&orch, &command);
        orch.close();
        value
    })
    .await;

    match result {
        Ok(value) => (StatusCode::OK, Json(value)),
        Err(e) => {
            error!(error = %e, "Command task failed");
            (
                StatusCode::OK,
                Json(Response::<()>::failure(500, "Internal error").into_json()),
            )
        }
    }
}
