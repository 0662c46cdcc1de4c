use uuid::Uuid;
use weavegraph::domain::{Workflow, WorkflowStatus};
use weavegraph::workflows::{InMemoryWorkflowStore, WorkflowStore, WorkflowStoreError};

#[tokio::test]
async fn create_then_get_round_trips() {
    let store = InMemoryWorkflowStore::new();
    let workflow = Workflow::new(Uuid::now_v7(), "build me a thing");
    let id = workflow.id;

    store.create(workflow.clone()).await.unwrap();

    let loaded = store.get(id).await.unwrap();
    assert_eq!(loaded, workflow);
    assert_eq!(loaded.status, WorkflowStatus::Active);
}

#[tokio::test]
async fn get_unknown_workflow_returns_not_found() {
    let store = InMemoryWorkflowStore::new();
    let err = store.get(Uuid::now_v7()).await.unwrap_err();
    assert!(matches!(err, WorkflowStoreError::NotFound { .. }));
}

#[tokio::test]
async fn transition_advances_status_and_version() {
    let store = InMemoryWorkflowStore::new();
    let workflow = Workflow::new(Uuid::now_v7(), "prompt");
    let id = workflow.id;
    let initial_version = workflow.version;
    store.create(workflow).await.unwrap();

    store
        .transition(id, WorkflowStatus::AwaitingHuman)
        .await
        .unwrap();
    let paused = store.get(id).await.unwrap();
    assert_eq!(paused.status, WorkflowStatus::AwaitingHuman);
    assert_eq!(paused.version, initial_version + 1);

    store.transition(id, WorkflowStatus::Completed).await.unwrap();
    let done = store.get(id).await.unwrap();
    assert_eq!(done.status, WorkflowStatus::Completed);
    assert_eq!(done.version, initial_version + 2);
}

#[tokio::test]
async fn transition_unknown_workflow_returns_not_found() {
    let store = InMemoryWorkflowStore::new();
    let err = store
        .transition(Uuid::now_v7(), WorkflowStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowStoreError::NotFound { .. }));
}
