//! Relational data model backing C2/C3/C5/C8: the rows that outlive any one
//! process, independent of the in-memory [`crate::state::VersionedState`]
//! a running engine step works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Container scoping a set of workflows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status of a single workflow run (a "decision-set").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Active,
    AwaitingHuman,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::AwaitingHuman => "awaiting-human",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One run of the workflow graph from initial input to terminal (spec §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub project_id: Uuid,
    /// The key under which C1 checkpoints this workflow; equal to `id`
    /// re-rendered as a string for readability across backends.
    pub thread_id: String,
    pub version: u64,
    pub original_prompt: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    #[must_use]
    pub fn new(project_id: Uuid, original_prompt: impl Into<String>) -> Self {
        let id = Uuid::now_v7();
        let now = Utc::now();
        Self {
            id,
            project_id,
            thread_id: id.to_string(),
            version: 0,
            original_prompt: original_prompt.into(),
            status: WorkflowStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance `status`, bumping the monotonic `version` counter. Per spec
    /// §3's invariant, `version` never decreases.
    pub fn transition(&mut self, status: WorkflowStatus) {
        self.status = status;
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

/// Kind of job a worker can claim (spec §3/§4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    MlWorkflow,
    Resume,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MlWorkflow => "ml_workflow",
            Self::Resume => "resume",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ml_workflow" => Ok(Self::MlWorkflow),
            "resume" => Ok(Self::Resume),
            other => Err(format!("unknown job kind: {other}")),
        }
    }
}

/// Lifecycle state of a job row (spec §4.2's state machine).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A unit of work bound to a workflow (spec §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub kind: JobKind,
    pub priority: i32,
    pub status: JobStatus,
    pub payload: Value,
    pub worker_id: Option<Uuid>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_run_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    #[must_use]
    pub fn new(
        workflow_id: Uuid,
        kind: JobKind,
        payload: Value,
        priority: i32,
        max_retries: u32,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_id,
            kind,
            priority,
            status: JobStatus::Queued,
            payload,
            worker_id: None,
            lease_expires_at: None,
            retry_count: 0,
            max_retries,
            next_run_at: Utc::now(),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Immutable audit record of something the engine or worker did (spec §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEventRow {
    pub id: i64,
    pub workflow_id: Uuid,
    pub kind: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// A workflow output (spec §3) — minimal, not central to core logic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub kind: String,
    pub external_uri: String,
    pub content_hash: String,
    pub size: u64,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}
