use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use uuid::Uuid;

use weavegraph::config::{EventBusConfig, GraphType, JobQueueConfig};
use weavegraph::domain::{JobKind, Workflow, WorkflowStatus};
use weavegraph::event_bus::WorkflowEventBus;
use weavegraph::jobs::{InMemoryJobStore, JobStore};
use weavegraph::runtimes::CheckpointerType;
use weavegraph::worker::Worker;
use weavegraph::workflows::{InMemoryWorkflowStore, WorkflowStore};

fn fast_job_queue() -> JobQueueConfig {
    JobQueueConfig {
        lease_duration: Duration::from_millis(300),
        poll_backoff_min: Duration::from_millis(5),
        poll_backoff_cap: Duration::from_millis(20),
        reclaim_sweep_interval: Duration::from_secs(30),
        backoff_base: Duration::from_millis(10),
        backoff_cap: Duration::from_secs(1),
        max_retries: 2,
    }
}

#[tokio::test]
async fn worker_completes_an_ml_workflow_job_on_the_thin_graph() {
    let job_store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let workflow_store: Arc<dyn WorkflowStore> = Arc::new(InMemoryWorkflowStore::new());
    let event_bus = Arc::new(WorkflowEventBus::new(EventBusConfig {
        topic_history_capacity: 64,
        subscriber_buffer_capacity: 32,
        heartbeat_interval: Duration::from_secs(10),
    }));

    let workflow = Workflow::new(Uuid::now_v7(), "say hello");
    workflow_store.create(workflow.clone()).await.unwrap();
    job_store
        .enqueue(
            workflow.id,
            JobKind::MlWorkflow,
            json!({"prompt": "say hello"}),
            0,
            2,
        )
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = Worker::new(
        Arc::clone(&job_store),
        Arc::clone(&workflow_store),
        Arc::clone(&event_bus),
        fast_job_queue(),
        GraphType::Thin,
        CheckpointerType::InMemory,
        Duration::from_secs(5),
        shutdown_rx,
    );

    let handle = tokio::spawn(worker.run());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let reloaded = workflow_store.get(workflow.id).await.unwrap();
        if reloaded.status == WorkflowStatus::Completed {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "workflow never completed: status={:?}",
            reloaded.status
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}
