//! # Run API
//!
//! Start, inspect, approve and cancel the review run, and stream its events.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{
    stream::{self, Stream},
    SinkExt, StreamExt,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use verdict_core::state::{Decision, RunSnapshot};
use verdict_core::workflow::{Coordinator, Document, EventEnvelope};

use super::{ApiResponse, AppState};
use crate::error::{ApiError, ErrorBody};

/// Quiet period after which the SSE stream sends a heartbeat comment
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartRunRequest {
    /// Name of the submitted concept document
    pub filename: String,
    /// Document text (markdown or plain text outline)
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartRunResponse {
    pub run_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunStatusResponse {
    /// Current stage, or "idle" before the first run
    pub stage: String,
    pub progress: u8,
    /// Whether a run is in progress
    pub active: bool,
    #[schema(value_type = Option<Object>)]
    pub run: Option<RunSnapshot>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApprovalRequest {
    /// approve / yes / y, or reject / no / n / deny
    pub decision: String,
    #[serde(default)]
    pub feedback: Option<String>,
}

pub fn run_routes() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_run))
        .route("/status", get(get_status))
        .route("/approve", post(submit_approval))
        .route("/cancel", post(cancel_run))
        .route("/events", get(run_events))
}

/// Start reviewing a document
#[utoipa::path(
    post,
    path = "/api/v1/run/start",
    tag = "run",
    request_body = StartRunRequest,
    responses(
        (status = 200, description = "Run started", body = StartRunResponse),
        (status = 400, description = "Missing filename", body = ErrorBody),
        (status = 409, description = "A run is already active", body = ErrorBody)
    )
)]
pub async fn start_run(
    State(state): State<AppState>,
    Json(req): Json<StartRunRequest>,
) -> Result<Json<StartRunResponse>, ApiError> {
    let filename = req.filename.trim();
    if filename.is_empty() {
        return Err(ApiError::BadRequest("filename is required".into()));
    }

    let run_id = state
        .coordinator
        .start_run(Document::new(filename, req.content))
        .await?;
    tracing::info!(%run_id, document = filename, "Review run started");

    Ok(Json(StartRunResponse {
        run_id: run_id.to_string(),
    }))
}

/// Current run snapshot
#[utoipa::path(
    get,
    path = "/api/v1/run/status",
    tag = "run",
    responses(
        (status = 200, description = "Current run status", body = RunStatusResponse)
    )
)]
pub async fn get_status(State(state): State<AppState>) -> Json<RunStatusResponse> {
    let response = match state.coordinator.snapshot().await {
        Some(run) => RunStatusResponse {
            stage: run.stage.to_string(),
            progress: run.progress,
            active: !run.stage.is_terminal(),
            run: Some(run),
        },
        None => RunStatusResponse {
            stage: "idle".to_string(),
            progress: 0,
            active: false,
            run: None,
        },
    };
    Json(response)
}

/// Submit the human decision
#[utoipa::path(
    post,
    path = "/api/v1/run/approve",
    tag = "run",
    request_body = ApprovalRequest,
    responses(
        (status = 200, description = "Decision recorded", body = ApiResponse),
        (status = 400, description = "Unrecognised decision", body = ErrorBody),
        (status = 404, description = "No run", body = ErrorBody),
        (status = 409, description = "Run is not awaiting approval", body = ErrorBody)
    )
)]
pub async fn submit_approval(
    State(state): State<AppState>,
    Json(req): Json<ApprovalRequest>,
) -> Result<Json<ApiResponse>, ApiError> {
    let decision = req
        .decision
        .parse::<Decision>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state
        .coordinator
        .submit_approval(decision, req.feedback)
        .await?;
    tracing::info!(%decision, "Approval decision submitted");

    Ok(Json(ApiResponse::ok(format!("Decision {} recorded", decision))))
}

/// Cancel the active run
#[utoipa::path(
    post,
    path = "/api/v1/run/cancel",
    tag = "run",
    responses(
        (status = 200, description = "Cancellation requested", body = ApiResponse),
        (status = 404, description = "No active run", body = ErrorBody),
        (status = 409, description = "Decision already recorded", body = ErrorBody)
    )
)]
pub async fn cancel_run(State(state): State<AppState>) -> Result<Json<ApiResponse>, ApiError> {
    state.coordinator.cancel_run().await?;
    Ok(Json(ApiResponse::ok("Cancellation requested")))
}

/// Server-sent workflow events with a heartbeat
#[utoipa::path(
    get,
    path = "/api/v1/run/events",
    tag = "run",
    responses(
        (status = 200, description = "Workflow event stream", content_type = "text/event-stream")
    )
)]
pub async fn run_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.coordinator.subscribe();

    let stream = stream::unfold(subscription, |mut subscription| async move {
        match tokio::time::timeout(HEARTBEAT_INTERVAL, subscription.recv()).await {
            Ok(Some(envelope)) => Some((Ok(sse_event(&envelope)), subscription)),
            // Bus gone
            Ok(None) => None,
            Err(_) => Some((Ok(Event::default().comment("heartbeat")), subscription)),
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn sse_event(envelope: &EventEnvelope) -> Event {
    Event::default()
        .id(envelope.seq.to_string())
        .event(envelope.event.kind())
        .json_data(envelope)
        .unwrap_or_else(|e| {
            tracing::warn!(seq = envelope.seq, error = %e, "Failed to encode event");
            Event::default().comment("unencodable event")
        })
}

/// WebSocket feed: current snapshot first, then every event
pub async fn run_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_socket(socket, state.coordinator))
}

async fn stream_socket(socket: WebSocket, coordinator: Arc<Coordinator>) {
    let (mut sender, mut receiver) = socket.split();
    // Subscribe before taking the snapshot so nothing falls in between
    let mut events = coordinator.subscribe();

    let hello = serde_json::json!({
        "type": "snapshot",
        "run": coordinator.snapshot().await,
    });
    if sender.send(Message::Text(hello.to_string())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            envelope = events.recv() => {
                let Some(envelope) = envelope else { break };
                let text = match serde_json::to_string(&envelope) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(seq = envelope.seq, error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Inbound messages carry no commands
                Some(Ok(_)) => {}
            }
        }
    }
    tracing::debug!(subscriber = ?events.id(), "WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use verdict_core::config::EngineConfig;
    use verdict_core::skills::default_collaborators;
    use verdict_core::state::RunResult;
    use verdict_core::workflow::Stage;
    use verdict_core::{ControlError, RunFailure};

    fn state() -> AppState {
        let config = EngineConfig::default();
        let collaborators = default_collaborators(&config);
        AppState::new(
            Arc::new(Coordinator::new(config, collaborators)),
            PathBuf::from("config.json"),
        )
    }

    fn start_request(filename: &str, content: &str) -> Json<StartRunRequest> {
        Json(StartRunRequest {
            filename: filename.into(),
            content: content.into(),
        })
    }

    #[tokio::test]
    async fn test_status_is_idle_before_first_run() {
        let Json(status) = get_status(State(state())).await;
        assert_eq!(status.stage, "idle");
        assert!(!status.active);
        assert!(status.run.is_none());
    }

    #[tokio::test]
    async fn test_start_requires_filename() {
        let result = start_run(State(state()), start_request("  ", "# Concept")).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_empty_document_fails_run() {
        let state = state();
        let Json(started) = start_run(State(state.clone()), start_request("empty.md", ""))
            .await
            .unwrap();

        let snapshot = state.coordinator.wait_for_terminal().await.unwrap();
        assert_eq!(snapshot.id.to_string(), started.run_id);
        assert_eq!(snapshot.stage, Stage::Failed);
        assert!(matches!(
            snapshot.result,
            Some(RunResult::Failed(RunFailure::ParseFailure(_)))
        ));

        let Json(status) = get_status(State(state.clone())).await;
        assert_eq!(status.stage, "failed");
        assert!(!status.active);

        // a finished run does not block the next one
        let again = start_run(State(state), start_request("empty.md", "")).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_approval_without_run() {
        let request = Json(ApprovalRequest {
            decision: "approve".into(),
            feedback: None,
        });
        let result = submit_approval(State(state()), request).await;
        assert!(matches!(
            result,
            Err(ApiError::Control(ControlError::NoActiveRun))
        ));
    }

    #[tokio::test]
    async fn test_unrecognised_decision_is_bad_request() {
        let request = Json(ApprovalRequest {
            decision: "maybe".into(),
            feedback: None,
        });
        let result = submit_approval(State(state()), request).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_cancel_without_run() {
        let result = cancel_run(State(state())).await;
        assert!(matches!(
            result,
            Err(ApiError::Control(ControlError::NoActiveRun))
        ));
    }
}
