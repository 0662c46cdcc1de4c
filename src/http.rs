//! HTTP surface (C7): the endpoint table of spec §6, backed by the job
//! queue (C2), the per-workflow event bus (C3), and the engine (C5). Built
//! on `axum`, grounded on the teacher's own `examples/demo7_axum_sse.rs`
//! for the SSE shape and on its `LadderError`-style structured error
//! reporting for `ApiError`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::channels::Channel;
use crate::config::{GraphConfig, GraphType, JobQueueConfig};
use crate::domain::{JobKind, JobStatus, Workflow, WorkflowStatus};
use crate::event_bus::WorkflowEventBus;
use crate::graphs_full::{build_thin_graph, full_graph_node_order, thin_graph_node_order};
use crate::jobs::JobStore;
use crate::message::Message;
use crate::nodes::support::keys;
use crate::state::VersionedState;
use crate::workflows::WorkflowStore;

/// Shared handler state: the three durable subsystems (C2/C3, plus the
/// in-process [`WorkflowStore`] standing in for the workflows table of C8)
/// and process-wide configuration.
#[derive(Clone)]
pub struct AppState {
    pub job_store: Arc<dyn JobStore>,
    pub workflow_store: Arc<dyn WorkflowStore>,
    pub event_bus: Arc<WorkflowEventBus>,
    pub job_queue: JobQueueConfig,
    pub graph: GraphConfig,
}

/// `{detail: string}` error body per spec §6, with the matching status code.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"detail": self.detail}))).into_response()
    }
}

impl From<crate::jobs::JobStoreError> for ApiError {
    fn from(err: crate::jobs::JobStoreError) -> Self {
        match err {
            crate::jobs::JobStoreError::NotFound { job_id } => {
                Self::not_found(format!("job not found: {job_id}"))
            }
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<crate::workflows::WorkflowStoreError> for ApiError {
    fn from(err: crate::workflows::WorkflowStoreError) -> Self {
        match err {
            crate::workflows::WorkflowStoreError::NotFound { workflow_id } => {
                Self::not_found(format!("workflow not found: {workflow_id}"))
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/chat", post(chat_sync))
        .route("/api/chat/async", post(chat_async))
        .route("/api/jobs/:job_id/status", get(job_status))
        .route("/api/streams/:decision_set_id", get(stream_events))
        .route("/api/decision-sets/:id/approve", post(approve))
        .route("/api/workflow/plan", get(workflow_plan))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"message": "weavegraph orchestrator is running"}))
}

#[derive(Deserialize)]
struct ChatMessageIn {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<ChatMessageIn>,
    thread_id: Option<String>,
}

fn last_user_text(messages: &[ChatMessageIn]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
}

#[derive(Serialize)]
struct ChatResponse {
    thread_id: String,
    messages: Vec<MessageOut>,
}

#[derive(Serialize)]
struct MessageOut {
    role: String,
    content: String,
}

impl From<&Message> for MessageOut {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role.clone(),
            content: m.content.clone(),
        }
    }
}

/// `POST /api/chat`: always runs the thin graph to completion in-process,
/// regardless of the configured [`GraphType`] — the full graph's HITL gates
/// make it fundamentally incompatible with a single blocking request.
async fn chat_sync(Json(req): Json<ChatRequest>) -> Result<Json<ChatResponse>, ApiError> {
    let prompt = last_user_text(&req.messages)
        .ok_or_else(|| ApiError::bad_request("messages must include at least one user message"))?;

    let app = build_thin_graph();
    let initial_state = VersionedState::new_with_user_message(prompt);
    let final_state = app
        .invoke(initial_state)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;

    let thread_id = req.thread_id.unwrap_or_else(|| Uuid::now_v7().to_string());
    let messages = final_state
        .messages
        .snapshot()
        .iter()
        .map(MessageOut::from)
        .collect();
    Ok(Json(ChatResponse { thread_id, messages }))
}

#[derive(Serialize)]
struct ChatAsyncResponse {
    decision_set_id: Uuid,
    thread_id: String,
    job_id: Uuid,
    status: JobStatus,
}

/// `POST /api/chat/async`: a `thread_id` naming an existing workflow
/// continues that workflow's job chain (a fresh [`JobKind::MlWorkflow`] job
/// against the same workflow id); otherwise a new [`Workflow`] is created.
async fn chat_async(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatAsyncResponse>, ApiError> {
    let prompt = last_user_text(&req.messages)
        .ok_or_else(|| ApiError::bad_request("messages must include at least one user message"))?;

    let existing = match &req.thread_id {
        Some(tid) => match Uuid::parse_str(tid) {
            Ok(id) => state.workflow_store.get(id).await.ok(),
            Err(_) => None,
        },
        None => None,
    };

    let workflow = match existing {
        Some(w) => w,
        None => {
            let project_id = Uuid::now_v7();
            let workflow = Workflow::new(project_id, prompt);
            state.workflow_store.create(workflow.clone()).await?;
            workflow
        }
    };

    let job_id = state
        .job_store
        .enqueue(
            workflow.id,
            JobKind::MlWorkflow,
            json!({"prompt": prompt}),
            0,
            state.job_queue.max_retries,
        )
        .await?;

    Ok(Json(ChatAsyncResponse {
        decision_set_id: workflow.id,
        thread_id: workflow.thread_id,
        job_id,
        status: JobStatus::Queued,
    }))
}

#[derive(Serialize)]
struct JobStatusResponse {
    job_id: Uuid,
    status: JobStatus,
    decision_set_id: Uuid,
    thread_id: String,
}

async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = state
        .job_store
        .get(job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job not found: {job_id}")))?;
    Ok(Json(JobStatusResponse {
        job_id: job.id,
        status: job.status,
        decision_set_id: job.workflow_id,
        thread_id: job.workflow_id.to_string(),
    }))
}

#[derive(Deserialize, Default)]
struct StreamQuery {
    #[serde(default)]
    replay: u8,
}

/// `GET /api/streams/{decision_set_id}`: the spec §6 event catalogue,
/// fanned out from the workflow's [`WorkflowEventBus`] topic plus a
/// fixed-interval heartbeat, mirroring the teacher's own
/// `demo7_axum_sse.rs` SSE handler shape.
async fn stream_events(
    State(state): State<AppState>,
    Path(decision_set_id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (backlog, mut receiver) = if query.replay == 1 {
        state.event_bus.subscribe(decision_set_id)
    } else {
        let (_, receiver) = state.event_bus.subscribe(decision_set_id);
        (Vec::new(), receiver)
    };
    let heartbeat_interval = state.event_bus.heartbeat_interval();

    let sse_stream = async_stream::stream! {
        for row in backlog {
            yield Ok(sse_event_for_row(&row));
        }

        let mut heartbeat = tokio::time::interval(heartbeat_interval);
        heartbeat.tick().await; // first tick fires immediately; consume it
        loop {
            tokio::select! {
                received = receiver.recv() => {
                    match received {
                        Ok(row) => yield Ok(sse_event_for_row(&row)),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            yield Ok(SseEvent::default()
                                .event("error")
                                .json_data(json!({"error": format!("stream lagged, {skipped} events dropped")}))
                                .expect("serialize lag notice"));
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = heartbeat.tick() => {
                    yield Ok(SseEvent::default().event("heartbeat").json_data(json!({})).expect("serialize heartbeat"));
                }
            }
        }
    };

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

fn sse_event_for_row(row: &crate::domain::WorkflowEventRow) -> SseEvent {
    let mut payload = row.payload.clone();
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("decision_set_id".to_string(), json!(row.workflow_id));
        obj.insert("timestamp".to_string(), json!(row.created_at));
    }
    SseEvent::default()
        .id(row.id.to_string())
        .event(row.kind.clone())
        .json_data(payload)
        .expect("serialize workflow event")
}

#[derive(Deserialize)]
struct ApproveRequest {
    decision: String,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    responses: Option<Value>,
}

#[derive(Serialize)]
struct ApproveResponse {
    job_id: Uuid,
    status: JobStatus,
}

/// `POST /api/decision-sets/{id}/approve`: enqueues a [`JobKind::Resume`]
/// job carrying the human's decision merged into the paused session's
/// `extra` channel. A `responses` body implies the workflow is paused at
/// `hitl_gate_input` (it expects `extra.responses`); its absence implies
/// `hitl_gate_final` (it expects `extra.final_approval`).
async fn approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<ApproveResponse>, ApiError> {
    if req.decision != "approved" && req.decision != "rejected" {
        return Err(ApiError::bad_request(
            "decision must be \"approved\" or \"rejected\"",
        ));
    }
    let workflow = state.workflow_store.get(id).await?;
    if workflow.status != WorkflowStatus::AwaitingHuman {
        return Err(ApiError::bad_request(format!(
            "workflow {id} is not awaiting human approval (status: {})",
            workflow.status
        )));
    }

    let extra = match req.responses {
        Some(responses) => json!({ (keys::RESPONSES): responses }),
        None => json!({
            (keys::FINAL_APPROVAL): {"decision": req.decision, "comment": req.comment},
        }),
    };

    let job_id = state
        .job_store
        .enqueue(
            id,
            JobKind::Resume,
            json!({"extra": extra}),
            10,
            state.job_queue.max_retries,
        )
        .await?;

    Ok(Json(ApproveResponse {
        job_id,
        status: JobStatus::Queued,
    }))
}

#[derive(Serialize)]
struct WorkflowPlanResponse {
    nodes: Vec<String>,
    graph_type: &'static str,
}

async fn workflow_plan(State(state): State<AppState>) -> Json<WorkflowPlanResponse> {
    let (nodes, graph_type) = match state.graph.graph_type {
        GraphType::Thin => (thin_graph_node_order(), "thin"),
        GraphType::Full => (full_graph_node_order(), "full"),
    };
    Json(WorkflowPlanResponse { nodes, graph_type })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_user_text_finds_most_recent_user_message() {
        let messages = vec![
            ChatMessageIn { role: "user".into(), content: "first".into() },
            ChatMessageIn { role: "assistant".into(), content: "reply".into() },
            ChatMessageIn { role: "user".into(), content: "second".into() },
        ];
        assert_eq!(last_user_text(&messages), Some("second"));
    }

    #[test]
    fn last_user_text_none_without_a_user_message() {
        let messages = vec![ChatMessageIn { role: "system".into(), content: "hi".into() }];
        assert_eq!(last_user_text(&messages), None);
    }
}
