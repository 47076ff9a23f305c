use crate::{BrokerError, Message, StatusUpdate};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};

/// Outbound side of the message transport
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, topic: &str, message: Message) -> Result<(), BrokerError>;
}

/// Delivery decisions for inbound messages.
///
/// Each message is settled exactly once, either acknowledged or rejected.
pub trait MessageSubscriber: Send + Sync {
    fn acknowledge(&self, message: &Message) -> Result<(), BrokerError>;

    fn reject(&self, message: &Message, requeue: bool) -> Result<(), BrokerError>;
}

/// Everything that happened on an [`InMemoryBroker`]
#[derive(Debug, Clone)]
pub enum BrokerRecord {
    Published { topic: String, message: Message },
    Acknowledged { message_id: String },
    Rejected { message_id: String, requeue: bool },
}

/// Process-local broker that records publishes and delivery decisions.
///
/// Used by the CLI and by tests; requeued messages can optionally be handed
/// back to a redelivery channel.
pub struct InMemoryBroker {
    sender: broadcast::Sender<BrokerRecord>,
    records: Mutex<Vec<BrokerRecord>>,
    redelivery: Option<mpsc::UnboundedSender<Message>>,
    fail_publishes: AtomicBool,
}

impl InMemoryBroker {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            records: Mutex::new(Vec::new()),
            redelivery: None,
            fail_publishes: AtomicBool::new(false),
        }
    }

    /// Send messages rejected with `requeue = true` back through `redelivery`
    pub fn with_redelivery(mut self, redelivery: mpsc::UnboundedSender<Message>) -> Self {
        self.redelivery = Some(redelivery);
        self
    }

    /// Make every subsequent publish fail, to exercise best-effort publishing
    pub fn set_fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BrokerRecord> {
        self.sender.subscribe()
    }

    pub fn records(&self) -> Vec<BrokerRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Messages published to `topic`, in publish order
    pub fn published(&self, topic: &str) -> Vec<Message> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                BrokerRecord::Published { topic: t, message } if t == topic => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Status updates published to `topic`
    pub fn status_updates(&self, topic: &str) -> Vec<StatusUpdate> {
        self.published(topic)
            .iter()
            .filter_map(|message| message.body_as::<StatusUpdate>().ok())
            .collect()
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                BrokerRecord::Acknowledged { message_id } => Some(message_id),
                _ => None,
            })
            .collect()
    }

    /// `(message_id, requeue)` for every rejection
    pub fn rejected(&self) -> Vec<(String, bool)> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                BrokerRecord::Rejected { message_id, requeue } => Some((message_id, requeue)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, record: BrokerRecord) {
        let _ = self.sender.send(record.clone());
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    async fn publish(&self, topic: &str, message: Message) -> Result<(), BrokerError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(BrokerError::PublishFailed(format!(
                "publishing to {} is disabled",
                topic
            )));
        }
        self.record(BrokerRecord::Published {
            topic: topic.to_string(),
            message,
        });
        Ok(())
    }
}

impl MessageSubscriber for InMemoryBroker {
    fn acknowledge(&self, message: &Message) -> Result<(), BrokerError> {
        self.record(BrokerRecord::Acknowledged {
            message_id: message.message_id.clone(),
        });
        Ok(())
    }

    fn reject(&self, message: &Message, requeue: bool) -> Result<(), BrokerError> {
        self.record(BrokerRecord::Rejected {
            message_id: message.message_id.clone(),
            requeue,
        });
        if requeue {
            if let Some(redelivery) = &self.redelivery {
                redelivery
                    .send(message.clone())
                    .map_err(|e| BrokerError::PublishFailed(format!("redelivery closed: {}", e)))?;
            }
        }
        Ok(())
    }
}
