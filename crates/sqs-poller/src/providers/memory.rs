//! In-memory queue provider for tests and development.
//!
//! Queues live in process memory and are addressed by `memory://{name}` URLs.
//! The provider follows the observable SQS behaviour a consumer relies on:
//! - Received messages stay in flight until deleted or their visibility
//!   timeout lapses, after which they are delivered again
//! - Receives long-poll up to `wait_time_seconds` for a message to arrive
//! - Batch calls report unknown receipt handles per entry instead of failing

use crate::client::*;
use crate::error::QueueError;
use crate::message::{Message, MessageAttributeValue};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// URL scheme of queues held by [`InMemoryProvider`]
pub const URL_SCHEME: &str = "memory://";

/// Visibility timeout used when neither the queue nor the receive sets one
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_BATCH_ENTRIES: usize = 10;
const MAX_RECEIVE_MESSAGES: u32 = 10;

// ============================================================================
// Internal Storage Structures
// ============================================================================

#[derive(Default)]
struct QueueStorage {
    queues: HashMap<String, InMemoryQueue>,
}

impl QueueStorage {
    fn queue_mut(&mut self, queue_url: &str) -> Result<&mut InMemoryQueue, QueueError> {
        self.queues
            .get_mut(queue_url)
            .ok_or_else(|| QueueError::QueueNotFound {
                message: format!("The specified queue does not exist: {}", queue_url),
            })
    }
}

struct InMemoryQueue {
    /// Visible or delayed messages in send order
    messages: VecDeque<StoredMessage>,
    /// Received messages keyed by receipt handle
    in_flight: HashMap<String, InFlightMessage>,
    visibility_timeout: Duration,
    notify: Arc<Notify>,
}

impl InMemoryQueue {
    fn new(attributes: Option<&HashMap<String, String>>) -> Self {
        let visibility_timeout = attributes
            .and_then(|a| a.get("VisibilityTimeout"))
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT);

        Self {
            messages: VecDeque::new(),
            in_flight: HashMap::new(),
            visibility_timeout,
            notify: Arc::new(Notify::new()),
        }
    }

    fn enqueue(&mut self, message: StoredMessage) {
        self.messages.push_back(message);
        self.notify.notify_waiters();
    }

    /// Return lapsed in-flight messages to the front of the queue
    fn release_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, m)| m.visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in expired {
            if let Some(in_flight) = self.in_flight.remove(&receipt) {
                self.messages.push_front(in_flight.message);
            }
        }
    }

    /// Move up to `max` visible messages in flight
    fn take_visible(&mut self, max: usize, visibility: Duration, now: Instant) -> Vec<Message> {
        self.release_expired(now);

        let mut taken = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.messages.len());

        while let Some(mut stored) = self.messages.pop_front() {
            if taken.len() < max && stored.available_at <= now {
                stored.receive_count += 1;
                let receipt_handle = uuid::Uuid::new_v4().to_string();
                taken.push((stored.clone(), receipt_handle.clone()));
                self.in_flight.insert(
                    receipt_handle,
                    InFlightMessage {
                        message: stored,
                        visible_at: now + visibility,
                    },
                );
            } else {
                remaining.push_back(stored);
            }
        }
        self.messages = remaining;

        taken
            .into_iter()
            .map(|(stored, receipt)| stored.to_message(receipt))
            .collect()
    }

    /// Earliest instant a currently hidden message becomes receivable
    fn next_available(&self) -> Option<Instant> {
        self.messages
            .iter()
            .map(|m| m.available_at)
            .chain(self.in_flight.values().map(|m| m.visible_at))
            .min()
    }
}

#[derive(Clone)]
struct StoredMessage {
    message_id: String,
    body: String,
    message_attributes: HashMap<String, MessageAttributeValue>,
    sent_timestamp: u128,
    receive_count: u32,
    available_at: Instant,
}

impl StoredMessage {
    fn new(
        body: String,
        delay_seconds: Option<u32>,
        message_attributes: Option<HashMap<String, MessageAttributeValue>>,
    ) -> Self {
        let sent_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            body,
            message_attributes: message_attributes.unwrap_or_default(),
            sent_timestamp,
            receive_count: 0,
            available_at: Instant::now() + Duration::from_secs(delay_seconds.unwrap_or(0).into()),
        }
    }

    fn to_message(&self, receipt_handle: String) -> Message {
        let mut message = Message::new(&self.message_id, receipt_handle, &self.body);
        message.attributes.insert(
            "ApproximateReceiveCount".to_string(),
            self.receive_count.to_string(),
        );
        message
            .attributes
            .insert("SentTimestamp".to_string(), self.sent_timestamp.to_string());
        message.message_attributes = self.message_attributes.clone();
        message
    }
}

struct InFlightMessage {
    message: StoredMessage,
    visible_at: Instant,
}

/// Keep only the attributes a receive asked for; `All` and `.*` select all
fn select<V>(map: &mut HashMap<String, V>, requested: Option<&Vec<String>>) {
    let requested = requested.map(Vec::as_slice).unwrap_or_default();
    if requested.iter().any(|n| n == "All" || n == ".*") {
        return;
    }
    map.retain(|name, _| requested.iter().any(|n| n == name));
}

fn batch_error(id: &str, code: &str, message: String) -> BatchResultError {
    BatchResultError {
        id: id.to_string(),
        code: code.to_string(),
        message: Some(message),
        sender_fault: true,
    }
}

/// Reject batch shapes SQS rejects as a whole
fn check_batch<'a>(ids: impl Iterator<Item = &'a str>) -> Result<(), QueueError> {
    let ids: Vec<&str> = ids.collect();
    if ids.is_empty() {
        return Err(QueueError::Provider {
            code: "EmptyBatchRequest".to_string(),
            message: "There should be at least one entry in the request".to_string(),
        });
    }
    if ids.len() > MAX_BATCH_ENTRIES {
        return Err(QueueError::Provider {
            code: "TooManyEntriesInBatchRequest".to_string(),
            message: format!("Maximum number of entries per request are {}", MAX_BATCH_ENTRIES),
        });
    }
    let distinct: HashSet<&str> = ids.iter().copied().collect();
    if distinct.len() != ids.len() {
        return Err(QueueError::Provider {
            code: "BatchEntryIdsNotDistinct".to_string(),
            message: "Two or more batch entries in the request have the same Id".to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// In-memory queue provider.
///
/// Clones share the same storage, so a producer and a consumer built from
/// one provider see the same queues.
#[derive(Clone, Default)]
pub struct InMemoryProvider {
    storage: Arc<RwLock<QueueStorage>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL under which a queue called `name` is addressed
    pub fn queue_url(name: &str) -> String {
        format!("{}{}", URL_SCHEME, name)
    }

    /// Number of messages waiting to be received, delayed ones included
    pub fn visible_count(&self, queue_url: &str) -> Result<usize, QueueError> {
        Ok(self.write()?.queue_mut(queue_url)?.messages.len())
    }

    /// Number of received messages not yet deleted
    pub fn in_flight_count(&self, queue_url: &str) -> Result<usize, QueueError> {
        Ok(self.write()?.queue_mut(queue_url)?.in_flight.len())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, QueueStorage>, QueueError> {
        self.storage.write().map_err(|e| QueueError::Provider {
            code: "InternalError".to_string(),
            message: format!("Queue storage lock poisoned: {}", e),
        })
    }

    fn enqueue(
        &self,
        queue_url: &str,
        body: String,
        delay_seconds: Option<u32>,
        message_attributes: Option<HashMap<String, MessageAttributeValue>>,
    ) -> Result<String, QueueError> {
        let mut storage = self.write()?;
        let queue = storage.queue_mut(queue_url)?;

        let stored = StoredMessage::new(body, delay_seconds, message_attributes);
        let message_id = stored.message_id.clone();
        queue.enqueue(stored);

        Ok(message_id)
    }
}

#[async_trait]
impl QueueProvider for InMemoryProvider {
    async fn create_queue(
        &self,
        request: CreateQueueRequest,
    ) -> Result<CreateQueueOutput, QueueError> {
        let queue_url = Self::queue_url(&request.queue_name);

        let mut storage = self.write()?;
        storage
            .queues
            .entry(queue_url.clone())
            .or_insert_with(|| InMemoryQueue::new(request.attributes.as_ref()));

        debug!(queue_url = %queue_url, "In-memory queue ready");
        Ok(CreateQueueOutput { queue_url })
    }

    async fn receive_message(
        &self,
        request: ReceiveMessageRequest,
    ) -> Result<ReceiveMessageOutput, QueueError> {
        if !(1..=MAX_RECEIVE_MESSAGES).contains(&request.max_number_of_messages) {
            return Err(QueueError::Provider {
                code: "InvalidParameterValue".to_string(),
                message: format!(
                    "Value {} for parameter MaxNumberOfMessages is invalid. Must be between 1 and {}",
                    request.max_number_of_messages, MAX_RECEIVE_MESSAGES
                ),
            });
        }

        let deadline = Instant::now() + Duration::from_secs(request.wait_time_seconds.into());
        let max = request.max_number_of_messages as usize;

        loop {
            let notify = self.write()?.queue_mut(&request.queue_url)?.notify.clone();
            let notified = notify.notified();

            let (wake_at, messages) = {
                let mut storage = self.write()?;
                let queue = storage.queue_mut(&request.queue_url)?;
                let visibility = request
                    .visibility_timeout
                    .map(|s| Duration::from_secs(s.into()))
                    .unwrap_or(queue.visibility_timeout);

                let messages = queue.take_visible(max, visibility, Instant::now());
                let wake_at = queue
                    .next_available()
                    .map_or(deadline, |at| at.min(deadline));
                (wake_at, messages)
            };

            if !messages.is_empty() || Instant::now() >= deadline {
                let messages: Vec<Message> = messages
                    .into_iter()
                    .map(|mut m| {
                        select(&mut m.attributes, request.attribute_names.as_ref());
                        select(
                            &mut m.message_attributes,
                            request.message_attribute_names.as_ref(),
                        );
                        m
                    })
                    .collect();

                return Ok(ReceiveMessageOutput {
                    messages: (!messages.is_empty()).then_some(messages),
                    request_id: Some(uuid::Uuid::new_v4().to_string()),
                });
            }

            // `notified` was registered before the check, so no send is missed
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn delete_message(&self, request: DeleteMessageRequest) -> Result<(), QueueError> {
        let mut storage = self.write()?;
        let queue = storage.queue_mut(&request.queue_url)?;

        match queue.in_flight.remove(&request.receipt_handle) {
            Some(_) => Ok(()),
            None => Err(QueueError::MessageNotFound {
                message: format!(
                    "The receipt handle \"{}\" is not valid",
                    request.receipt_handle
                ),
            }),
        }
    }

    async fn delete_message_batch(
        &self,
        request: DeleteMessageBatchRequest,
    ) -> Result<DeleteMessageBatchOutput, QueueError> {
        check_batch(request.entries.iter().map(|e| e.id.as_str()))?;

        let mut storage = self.write()?;
        let queue = storage.queue_mut(&request.queue_url)?;

        let mut output = DeleteMessageBatchOutput::default();
        for entry in request.entries {
            if queue.in_flight.remove(&entry.receipt_handle).is_some() {
                output.successful.push(DeleteBatchResultEntry { id: entry.id });
            } else {
                output.failed.push(batch_error(
                    &entry.id,
                    "ReceiptHandleIsInvalid",
                    format!("The receipt handle \"{}\" is not valid", entry.receipt_handle),
                ));
            }
        }

        Ok(output)
    }

    async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<SendMessageOutput, QueueError> {
        let message_id = self.enqueue(
            &request.queue_url,
            request.message_body,
            request.delay_seconds,
            request.message_attributes,
        )?;

        Ok(SendMessageOutput {
            message_id,
            ..Default::default()
        })
    }

    async fn send_message_batch(
        &self,
        request: SendMessageBatchRequest,
    ) -> Result<SendMessageBatchOutput, QueueError> {
        check_batch(request.entries.iter().map(|e| e.id.as_str()))?;

        let mut output = SendMessageBatchOutput::default();
        for entry in request.entries {
            if entry.message_body.is_empty() {
                output.failed.push(batch_error(
                    &entry.id,
                    "MissingParameter",
                    "The request must contain the parameter MessageBody".to_string(),
                ));
                continue;
            }

            let message_id = self.enqueue(
                &request.queue_url,
                entry.message_body,
                entry.delay_seconds,
                entry.message_attributes,
            )?;
            output.successful.push(SendBatchResultEntry {
                id: entry.id,
                message_id,
                md5_of_message_body: None,
                sequence_number: None,
            });
        }

        Ok(output)
    }
}

impl std::fmt::Debug for InMemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queues = self
            .storage
            .read()
            .map(|s| s.queues.len())
            .unwrap_or_default();
        f.debug_struct("InMemoryProvider")
            .field("queues", &queues)
            .finish()
    }
}
