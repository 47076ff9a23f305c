use crate::{AdmissionControl, ManagerConfig, RunnerRegistry};
use futures::FutureExt;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use taskcore::{
    BrokerError, CompletionNotification, DispatchRequest, ExecutionStatus, FailureReason,
    InboundMessage, Message, MessagePublisher, MessageSubscriber, RunnerError, StatusUpdate,
    TaskRunner,
};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Lifecycle of the task manager service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Unknown,
    Running,
    Stopped,
    Cancelled,
}

/// Entry in the in-flight map
enum ExecutionSlot {
    /// Claimed by a dispatch whose runner has not returned from `execute` yet
    Starting,
    Running(Arc<dyn TaskRunner>),
}

/// Consumes dispatch and completion messages, runs tasks through pluggable
/// runners and publishes a status update for every accepted or terminal
/// transition.
pub struct TaskManager {
    config: ManagerConfig,
    registry: Arc<RunnerRegistry>,
    publisher: Arc<dyn MessagePublisher>,
    subscriber: Arc<dyn MessageSubscriber>,
    admission: AdmissionControl,
    active_executions: RwLock<HashMap<String, ExecutionSlot>>,
    queue: mpsc::UnboundedSender<Message>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    status: RwLock<ServiceStatus>,
    shutdown: CancellationToken,
}

impl TaskManager {
    pub fn new(
        config: ManagerConfig,
        registry: Arc<RunnerRegistry>,
        publisher: Arc<dyn MessagePublisher>,
        subscriber: Arc<dyn MessageSubscriber>,
    ) -> Self {
        let (queue, receiver) = mpsc::unbounded_channel();
        Self {
            admission: AdmissionControl::new(config.max_concurrent_jobs),
            config,
            registry,
            publisher,
            subscriber,
            active_executions: RwLock::new(HashMap::new()),
            queue,
            receiver: Mutex::new(Some(receiver)),
            status: RwLock::new(ServiceStatus::Unknown),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop when `token` is cancelled as well as on [`stop`](Self::stop)
    pub fn with_cancellation(mut self, token: &CancellationToken) -> Self {
        self.shutdown = token.child_token();
        self
    }

    pub fn service_name(&self) -> &'static str {
        "Task Manager"
    }

    /// Enqueue an inbound message for the consumer loop
    pub fn queue_task(&self, message: Message) -> Result<(), BrokerError> {
        self.queue
            .send(message)
            .map_err(|e| BrokerError::PublishFailed(format!("task queue closed: {}", e)))
    }

    /// Spawn the consumer loop
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.run().await })
    }

    /// Stop pulling new work. In-flight runner calls are not aborted.
    pub async fn stop(&self) {
        tracing::info!("{} is stopping", self.service_name());
        *self.status.write().await = ServiceStatus::Stopped;
        self.shutdown.cancel();
    }

    pub async fn status(&self) -> ServiceStatus {
        *self.status.read().await
    }

    /// Number of admission slots currently held
    pub fn active_jobs(&self) -> usize {
        self.admission.active()
    }

    /// Number of executions tracked for completion
    pub async fn in_flight(&self) -> usize {
        self.active_executions
            .read()
            .await
            .values()
            .filter(|slot| matches!(slot, ExecutionSlot::Running(_)))
            .count()
    }

    /// Whether `execution_id` is claimed or awaiting completion
    pub async fn is_tracking(&self, execution_id: &str) -> bool {
        self.active_executions.read().await.contains_key(execution_id)
    }

    /// Consumer loop. Runs until the service is cancelled or the queue closes.
    pub async fn run(&self) {
        let Some(mut receiver) = self.receiver.lock().await.take() else {
            tracing::error!("{} consumer loop is already running", self.service_name());
            return;
        };

        *self.status.write().await = ServiceStatus::Running;
        tracing::info!(
            "{} is running (max concurrent jobs {}, queue capacity {})",
            self.service_name(),
            self.config.max_concurrent_jobs,
            self.config
                .queue_capacity
                .map_or_else(|| "unset".to_string(), |capacity| capacity.to_string())
        );

        loop {
            let message = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                message = receiver.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            let message_id = message.message_id.clone();
            let correlation_id = message.correlation_id.clone();
            if AssertUnwindSafe(self.handle_message(message))
                .catch_unwind()
                .await
                .is_err()
            {
                tracing::error!(
                    "Error processing message {} (correlation {}): handler panicked",
                    message_id,
                    correlation_id
                );
            }
        }

        let mut status = self.status.write().await;
        if *status != ServiceStatus::Stopped {
            *status = ServiceStatus::Cancelled;
        }
        tracing::info!("{} consumer loop exited", self.service_name());
    }

    /// Process one inbound message to completion
    pub async fn handle_message(&self, message: Message) {
        let span = tracing::info_span!(
            "message",
            message_type = %message.message_type,
            message_id = %message.message_id,
            correlation_id = %message.correlation_id,
        );

        async {
            match message.kind() {
                Some(InboundMessage::Dispatch) => self.handle_dispatch(&message).await,
                Some(InboundMessage::Completion) => self.handle_completion(&message).await,
                None => {
                    tracing::warn!("Unsupported message type: {}", message.message_type);
                    self.reject(&message, true);
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn handle_dispatch(&self, message: &Message) {
        let request = match DispatchRequest::from_message(message) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Invalid dispatch message received: {}", e);
                let update = StatusUpdate::failed_from_raw(message, FailureReason::InvalidMessage, e.to_string());
                self.fail_message(message, update).await;
                return;
            }
        };

        // Claimed under the write lock so concurrent deliveries of the same
        // execution cannot both reach the runner.
        match self.active_executions.write().await.entry(request.execution_id.clone()) {
            Entry::Occupied(_) => {
                // The first dispatch owns this execution's status updates, so
                // the duplicate is settled without publishing one.
                tracing::warn!(
                    "Execution {} is already in flight, dropping duplicate dispatch without a status update",
                    request.execution_id
                );
                self.acknowledge(message);
                return;
            }
            Entry::Vacant(entry) => {
                entry.insert(ExecutionSlot::Starting);
            }
        }

        if !self.admission.try_reserve() {
            tracing::info!(
                "No resource available for execution {} ({} of {} slots in use)",
                request.execution_id,
                self.admission.active(),
                self.admission.max()
            );
            self.abandon_claim(&request.execution_id).await;
            self.reject(message, true);
            return;
        }

        let runner: Arc<dyn TaskRunner> = match self.registry.create_runner(&request) {
            Ok(runner) => Arc::from(runner),
            Err(e) => {
                tracing::error!("Unsupported runner '{}': {}", request.runner_type, e);
                self.abandon_claim(&request.execution_id).await;
                self.admission.release();
                let status = ExecutionStatus::failed(FailureReason::UnsupportedRunner, e.to_string());
                self.fail_message(message, status_update(&request, &status)).await;
                return;
            }
        };

        let outcome = AssertUnwindSafe(runner.execute())
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(RunnerError::ExecutionFailed("runner panicked".to_string())));

        let status = match outcome {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("Error executing task {} ({}): {}", request.task_id, request.execution_id, e);
                self.abandon_claim(&request.execution_id).await;
                self.admission.release();
                let status = ExecutionStatus::failed(FailureReason::RunnerError, e.to_string());
                self.fail_message(message, status_update(&request, &status)).await;
                return;
            }
        };

        self.acknowledge(message);

        // The slot stays reserved until the completion for this execution
        // arrives, whatever status the runner returned.
        self.active_executions
            .write()
            .await
            .insert(request.execution_id.clone(), ExecutionSlot::Running(runner));

        self.publish_update(status_update(&request, &status)).await;
    }

    async fn handle_completion(&self, message: &Message) {
        let notification = match CompletionNotification::from_message(message) {
            Ok(notification) => notification,
            Err(e) => {
                tracing::warn!("Invalid completion message received: {}", e);
                let update = StatusUpdate::failed_from_raw(message, FailureReason::InvalidMessage, e.to_string());
                self.fail_message(message, update).await;
                return;
            }
        };

        let runner = {
            let mut executions = self.active_executions.write().await;
            match executions.get(&notification.execution_id) {
                Some(ExecutionSlot::Running(_)) => match executions.remove(&notification.execution_id) {
                    Some(ExecutionSlot::Running(runner)) => Some(runner),
                    _ => None,
                },
                _ => None,
            }
        };
        let Some(runner) = runner else {
            tracing::info!("No active executor with execution id {}", notification.execution_id);
            self.acknowledge(message);
            return;
        };

        let status = AssertUnwindSafe(runner.get_status(&notification.identity))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(RunnerError::StatusFailed("runner panicked".to_string())))
            .unwrap_or_else(|e| {
                tracing::error!("Failed to get status of execution {}: {}", notification.execution_id, e);
                ExecutionStatus::failed(FailureReason::RunnerError, e.to_string())
            });

        if !status.status.is_terminal() {
            tracing::debug!(
                "Execution {} reported {} on completion",
                notification.execution_id,
                status.status
            );
        }
        self.admission.release();

        self.publish_update(StatusUpdate::new(
            notification.workflow_instance_id,
            notification.task_id,
            notification.execution_id,
            notification.correlation_id,
            &status,
        ))
        .await;

        self.acknowledge(message);
    }

    /// Drop a `Starting` claim after the dispatch failed before registration
    async fn abandon_claim(&self, execution_id: &str) {
        let mut executions = self.active_executions.write().await;
        if matches!(executions.get(execution_id), Some(ExecutionSlot::Starting)) {
            executions.remove(execution_id);
        }
    }

    /// Reject without requeue and publish a failed status update
    async fn fail_message(&self, message: &Message, update: StatusUpdate) {
        self.reject(message, false);
        self.publish_update(update).await;
    }

    async fn publish_update(&self, update: StatusUpdate) {
        let topic = self.config.task_update_topic.as_str();
        let message = match update.to_message() {
            Ok(message) => message.with_application_id(self.config.application_id.clone()),
            Err(e) => {
                tracing::error!("Failed to serialize status update: {}", e);
                return;
            }
        };

        tracing::debug!(
            "Sending task update message to {} ({} {:?})",
            topic,
            update.status,
            update.reason
        );
        match self.publisher.publish(topic, message).await {
            Ok(()) => tracing::debug!("Task update message sent to {}", topic),
            Err(e) => tracing::error!("Error sending message to {}: {}", topic, e),
        }
    }

    fn acknowledge(&self, message: &Message) {
        if let Err(e) = self.subscriber.acknowledge(message) {
            tracing::error!("Error acknowledging message {}: {}", message.message_id, e);
        }
    }

    fn reject(&self, message: &Message, requeue: bool) {
        if let Err(e) = self.subscriber.reject(message, requeue) {
            tracing::error!("Error rejecting message {}: {}", message.message_id, e);
        }
    }
}

fn status_update(request: &DispatchRequest, status: &ExecutionStatus) -> StatusUpdate {
    StatusUpdate::new(
        request.workflow_instance_id.clone(),
        request.task_id.clone(),
        request.execution_id.clone(),
        request.correlation_id.clone(),
        status,
    )
}
