//! Workflow row storage (part of C8, split out here since it backs C6/C7
//! directly): tracks a [`Workflow`]'s status independent of whatever engine
//! session or checkpoint is currently driving it.
//!
//! Mirrors [`crate::jobs`]'s storage-agnostic-trait-plus-`InMemory`-impl
//! shape: `WorkflowStore` is the contract, `InMemoryWorkflowStore` backs
//! tests and ephemeral runs; a `sqlx`-backed implementation belongs beside
//! [`crate::jobs::postgres`] once C8's migrations land.

use miette::Diagnostic;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Workflow, WorkflowStatus};

#[derive(Debug, Error, Diagnostic)]
pub enum WorkflowStoreError {
    #[error("workflow not found: {workflow_id}")]
    #[diagnostic(code(weavegraph::workflows::not_found))]
    NotFound { workflow_id: Uuid },
}

pub type Result<T> = std::result::Result<T, WorkflowStoreError>;

#[async_trait::async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn create(&self, workflow: Workflow) -> Result<()>;
    async fn get(&self, workflow_id: Uuid) -> Result<Workflow>;
    async fn transition(&self, workflow_id: Uuid, status: WorkflowStatus) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryWorkflowStore {
    inner: Mutex<Vec<Workflow>>,
}

impl InMemoryWorkflowStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn create(&self, workflow: Workflow) -> Result<()> {
        self.inner.lock().await.push(workflow);
        Ok(())
    }

    async fn get(&self, workflow_id: Uuid) -> Result<Workflow> {
        self.inner
            .lock()
            .await
            .iter()
            .find(|w| w.id == workflow_id)
            .cloned()
            .ok_or(WorkflowStoreError::NotFound { workflow_id })
    }

    async fn transition(&self, workflow_id: Uuid, status: WorkflowStatus) -> Result<()> {
        let mut workflows = self.inner.lock().await;
        let workflow = workflows
            .iter_mut()
            .find(|w| w.id == workflow_id)
            .ok_or(WorkflowStoreError::NotFound { workflow_id })?;
        workflow.transition(status);
        Ok(())
    }
}
