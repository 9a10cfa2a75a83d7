//! Operation provider interface and the request/response shapes it accepts.
//!
//! A [`QueueProvider`] is the remote side of the queue: it exposes the six
//! primitives the facade is built on and nothing else. Requests handed to a
//! provider have already been normalized and validated, so implementations
//! translate them to the wire without applying defaults of their own.

use crate::error::QueueError;
use crate::message::{Message, MessageAttributeValue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Interface implemented by queue backends (SQS over HTTP, in-memory, ...)
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Create a queue, returning its URL
    async fn create_queue(
        &self,
        request: CreateQueueRequest,
    ) -> Result<CreateQueueOutput, QueueError>;

    /// Receive up to `max_number_of_messages`, long-polling for `wait_time_seconds`
    async fn receive_message(
        &self,
        request: ReceiveMessageRequest,
    ) -> Result<ReceiveMessageOutput, QueueError>;

    /// Delete a single message by receipt handle
    async fn delete_message(&self, request: DeleteMessageRequest) -> Result<(), QueueError>;

    /// Delete several messages; per-entry failures are reported, not raised
    async fn delete_message_batch(
        &self,
        request: DeleteMessageBatchRequest,
    ) -> Result<DeleteMessageBatchOutput, QueueError>;

    /// Send a single message
    async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<SendMessageOutput, QueueError>;

    /// Send several messages; per-entry failures are reported, not raised
    async fn send_message_batch(
        &self,
        request: SendMessageBatchRequest,
    ) -> Result<SendMessageBatchOutput, QueueError>;
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateQueueRequest {
    pub queue_name: String,
    pub attributes: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveMessageRequest {
    pub queue_url: String,
    pub attribute_names: Option<Vec<String>>,
    pub max_number_of_messages: u32,
    pub message_attribute_names: Option<Vec<String>>,
    pub visibility_timeout: Option<u32>,
    pub wait_time_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMessageRequest {
    pub queue_url: String,
    pub receipt_handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEntry {
    pub id: String,
    pub receipt_handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMessageBatchRequest {
    pub queue_url: String,
    pub entries: Vec<DeleteEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub queue_url: String,
    pub message_body: String,
    pub delay_seconds: Option<u32>,
    pub message_attributes: Option<HashMap<String, MessageAttributeValue>>,
    pub message_deduplication_id: Option<String>,
    pub message_group_id: Option<String>,
    pub message_system_attributes: Option<HashMap<String, MessageAttributeValue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEntry {
    pub id: String,
    pub message_body: String,
    pub delay_seconds: Option<u32>,
    pub message_attributes: Option<HashMap<String, MessageAttributeValue>>,
    pub message_deduplication_id: Option<String>,
    pub message_group_id: Option<String>,
    pub message_system_attributes: Option<HashMap<String, MessageAttributeValue>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageBatchRequest {
    pub queue_url: String,
    pub entries: Vec<SendEntry>,
}

// ============================================================================
// Outputs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateQueueOutput {
    pub queue_url: String,
}

/// Raw receive result; `messages` is `None` when the response carried no
/// message collection at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveMessageOutput {
    pub messages: Option<Vec<Message>>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageOutput {
    pub message_id: String,
    pub md5_of_message_body: Option<String>,
    pub sequence_number: Option<String>,
}

/// A failed entry within a batch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResultError {
    pub id: String,
    pub code: String,
    pub message: Option<String>,
    pub sender_fault: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteBatchResultEntry {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMessageBatchOutput {
    pub successful: Vec<DeleteBatchResultEntry>,
    pub failed: Vec<BatchResultError>,
}

impl DeleteMessageBatchOutput {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBatchResultEntry {
    pub id: String,
    pub message_id: String,
    pub md5_of_message_body: Option<String>,
    pub sequence_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageBatchOutput {
    pub successful: Vec<SendBatchResultEntry>,
    pub failed: Vec<BatchResultError>,
}

impl SendMessageBatchOutput {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
