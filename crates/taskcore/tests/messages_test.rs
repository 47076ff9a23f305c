use serde_json::json;
use taskcore::{
    CompletionNotification, DispatchRequest, ExecutionStatus, FailureReason, InMemoryBroker,
    InboundMessage, Message, MessageError, MessagePublisher, MessageSubscriber, StatusUpdate,
    TaskExecution, TaskStatus, Value, WorkflowInstance, TASK_UPDATE_TOPIC,
};

#[test]
fn test_dispatch_message_is_classified_and_parsed() {
    let request = DispatchRequest::new("wf-1", "segmentation", "noop").with_argument("image", "alpine");
    let message = request.to_message().unwrap();

    assert_eq!(message.kind(), Some(InboundMessage::Dispatch));
    assert_eq!(message.correlation_id, request.correlation_id);

    let parsed = DispatchRequest::from_message(&message).unwrap();
    assert_eq!(parsed, request);
    assert_eq!(parsed.require_argument("image").unwrap().as_str(), Some("alpine"));
}

#[test]
fn test_dispatch_missing_runner_type_fails_validation() {
    let message = Message::new(
        "md.tasks.dispatch",
        "corr-1",
        json!({
            "workflow_instance_id": "wf-1",
            "task_id": "task-1",
            "execution_id": "exec-1",
            "correlation_id": "corr-1",
            "runner_type": "  "
        }),
    );

    assert_eq!(
        DispatchRequest::from_message(&message),
        Err(MessageError::MissingField("runner_type".to_string()))
    );
}

#[test]
fn test_malformed_body_still_yields_best_effort_identifiers() {
    let message = Message::new(
        "md.tasks.callback",
        "corr-9",
        json!({ "workflow_instance_id": "wf-9", "execution_id": 17 }),
    );

    assert!(matches!(
        CompletionNotification::from_message(&message),
        Err(MessageError::Malformed(_))
    ));

    let update = StatusUpdate::failed_from_raw(&message, FailureReason::InvalidMessage, "bad body");
    assert_eq!(update.workflow_instance_id, "wf-9");
    assert_eq!(update.task_id, "");
    assert_eq!(update.execution_id, "");
    assert_eq!(update.correlation_id, "corr-9");
    assert_eq!(update.status, TaskStatus::Failed);
    assert_eq!(update.message.as_deref(), Some("bad body"));
}

#[test]
fn test_unknown_message_type_has_no_kind() {
    let message = Message::new("md.export.request", "corr", json!({}));
    assert_eq!(message.kind(), None);
}

#[test]
fn test_only_accepted_is_non_terminal() {
    assert!(!TaskStatus::Accepted.is_terminal());
    for status in [
        TaskStatus::Succeeded,
        TaskStatus::Failed,
        TaskStatus::Canceled,
        TaskStatus::PartialFail,
    ] {
        assert!(status.is_terminal(), "{} should be terminal", status);
    }
}

#[test]
fn test_metadata_deserializes_from_plain_json() {
    let instance: WorkflowInstance = serde_json::from_value(json!({
        "id": "instance-1",
        "workflow_id": "wf",
        "payload_id": "payload",
        "bucket_id": "bucket",
        "tasks": [{
            "execution_id": "e1",
            "task_id": "T1",
            "status": "Succeeded",
            "metadata": { "Fred": "42", "count": 3, "flag": true }
        }]
    }))
    .unwrap();

    let task = instance.find_task("T1").unwrap();
    assert_eq!(task.metadata.get("Fred"), Some(&Value::String("42".to_string())));
    assert_eq!(task.metadata.get("count"), Some(&Value::Number(3.0)));
    assert_eq!(task.metadata.get("flag"), Some(&Value::Bool(true)));
    assert!(instance.find_task("T2").is_none());
}

#[test]
fn test_find_task_returns_first_match() {
    let instance = WorkflowInstance::new("wf", "payload")
        .with_task(TaskExecution::new("T1", TaskStatus::Succeeded).with_metadata("k", "first"))
        .with_task(TaskExecution::new("T1", TaskStatus::Failed).with_metadata("k", "second"));

    let task = instance.find_task("T1").unwrap();
    assert_eq!(task.metadata.get("k").and_then(|v| v.as_str()), Some("first"));
}

#[tokio::test]
async fn test_in_memory_broker_records_lifecycle() {
    let broker = InMemoryBroker::default();
    let mut records = broker.subscribe();

    let update = StatusUpdate::new("wf", "task", "exec", "corr", &ExecutionStatus::accepted());
    broker
        .publish(TASK_UPDATE_TOPIC, update.to_message().unwrap())
        .await
        .unwrap();

    let inbound = Message::new("md.tasks.dispatch", "corr", json!({}));
    broker.acknowledge(&inbound).unwrap();
    broker.reject(&inbound, true).unwrap();

    assert_eq!(broker.status_updates(TASK_UPDATE_TOPIC), vec![update.clone()]);
    assert!(broker.status_updates("md.tasks.custom").is_empty());
    assert_eq!(broker.acknowledged(), vec![inbound.message_id.clone()]);
    assert_eq!(broker.rejected(), vec![(inbound.message_id.clone(), true)]);
    assert!(records.recv().await.is_ok());

    broker
        .publish("md.tasks.custom", update.to_message().unwrap())
        .await
        .unwrap();
    assert_eq!(broker.status_updates("md.tasks.custom"), vec![update]);
}

#[tokio::test]
async fn test_in_memory_broker_publish_failure_and_redelivery() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let broker = InMemoryBroker::new(16).with_redelivery(tx);

    broker.set_fail_publishes(true);
    let update = StatusUpdate::new("wf", "task", "exec", "corr", &ExecutionStatus::succeeded());
    assert!(broker
        .publish(TASK_UPDATE_TOPIC, update.to_message().unwrap())
        .await
        .is_err());
    assert!(broker.status_updates(TASK_UPDATE_TOPIC).is_empty());

    let inbound = Message::new("md.tasks.dispatch", "corr", json!({}));
    broker.reject(&inbound, false).unwrap();
    assert!(rx.try_recv().is_err());

    broker.reject(&inbound, true).unwrap();
    let redelivered = rx.try_recv().unwrap();
    assert_eq!(redelivered.message_id, inbound.message_id);
}
