//! Parameter normalization.
//!
//! Each function here merges per-call parameters over the bound
//! [`QueueConfig`] and produces the exact request a [`QueueProvider`] expects.
//! Every accepted field is enumerated explicitly; defaults are applied here and
//! nowhere else, and missing required fields fail before any remote call.
//!
//! [`QueueProvider`]: crate::client::QueueProvider

use crate::client::{
    CreateQueueRequest, DeleteEntry, DeleteMessageBatchRequest, DeleteMessageRequest,
    ReceiveMessageRequest, SendEntry, SendMessageBatchRequest, SendMessageRequest,
};
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::message::{Batch, Message, MessageAttributeValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Long-poll wait applied when neither the call nor the config sets one
pub const DEFAULT_WAIT_TIME_SECONDS: u32 = 20;

/// Messages requested per pull when consuming whole batches
pub const DEFAULT_BATCH_MAX_MESSAGES: u32 = 10;

/// Messages requested per pull when consuming single messages
pub const DEFAULT_SINGLE_MAX_MESSAGES: u32 = 1;

/// Consumption mode, which decides the default receive size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveMode {
    Batches,
    Messages,
}

impl ReceiveMode {
    pub fn default_max_messages(self) -> u32 {
        match self {
            Self::Batches => DEFAULT_BATCH_MAX_MESSAGES,
            Self::Messages => DEFAULT_SINGLE_MAX_MESSAGES,
        }
    }
}

// ============================================================================
// Per-call parameters
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateQueueParams {
    pub queue_name: Option<String>,
    pub attributes: Option<HashMap<String, String>>,
}

impl CreateQueueParams {
    pub fn named(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: Some(queue_name.into()),
            attributes: None,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveParams {
    pub queue_url: Option<String>,
    pub attribute_names: Option<Vec<String>>,
    pub max_number_of_messages: Option<u32>,
    pub message_attribute_names: Option<Vec<String>>,
    pub visibility_timeout: Option<u32>,
    pub wait_time_seconds: Option<u32>,
}

impl ReceiveParams {
    pub fn with_max_number_of_messages(mut self, max: u32) -> Self {
        self.max_number_of_messages = Some(max);
        self
    }

    pub fn with_wait_time_seconds(mut self, seconds: u32) -> Self {
        self.wait_time_seconds = Some(seconds);
        self
    }

    pub fn with_visibility_timeout(mut self, seconds: u32) -> Self {
        self.visibility_timeout = Some(seconds);
        self
    }

    pub fn with_attribute_names(mut self, names: Vec<String>) -> Self {
        self.attribute_names = Some(names);
        self
    }

    pub fn with_message_attribute_names(mut self, names: Vec<String>) -> Self {
        self.message_attribute_names = Some(names);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteParams {
    pub queue_url: Option<String>,
    pub receipt_handle: Option<String>,
}

impl DeleteParams {
    pub fn receipt(receipt_handle: impl Into<String>) -> Self {
        Self {
            queue_url: None,
            receipt_handle: Some(receipt_handle.into()),
        }
    }
}

impl From<&Message> for DeleteParams {
    fn from(message: &Message) -> Self {
        Self::receipt(message.receipt_handle.clone())
    }
}

impl From<Message> for DeleteParams {
    fn from(message: Message) -> Self {
        Self::receipt(message.receipt_handle)
    }
}

/// One entry of a batch delete before identity resolution.
///
/// `id` is authoritative; `message_id` is only consulted when `id` is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEntryInput {
    pub id: Option<String>,
    pub message_id: Option<String>,
    pub receipt_handle: Option<String>,
}

impl DeleteEntryInput {
    pub fn new(id: impl Into<String>, receipt_handle: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            message_id: None,
            receipt_handle: Some(receipt_handle.into()),
        }
    }
}

impl From<&Message> for DeleteEntryInput {
    fn from(message: &Message) -> Self {
        Self {
            id: None,
            message_id: Some(message.message_id.clone()),
            receipt_handle: Some(message.receipt_handle.clone()),
        }
    }
}

impl From<Message> for DeleteEntryInput {
    fn from(message: Message) -> Self {
        Self {
            id: None,
            message_id: Some(message.message_id),
            receipt_handle: Some(message.receipt_handle),
        }
    }
}

/// Where batch delete entries come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteSource {
    Entries(Vec<DeleteEntryInput>),
    Messages(Vec<Message>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteBatchParams {
    pub queue_url: Option<String>,
    pub source: DeleteSource,
}

/// Batch delete input: a bare entry list, or a full parameter set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteBatchInput {
    Entries(Vec<DeleteEntryInput>),
    Params(DeleteBatchParams),
}

impl From<Vec<DeleteEntryInput>> for DeleteBatchInput {
    fn from(entries: Vec<DeleteEntryInput>) -> Self {
        Self::Entries(entries)
    }
}

impl From<DeleteBatchParams> for DeleteBatchInput {
    fn from(params: DeleteBatchParams) -> Self {
        Self::Params(params)
    }
}

impl From<Vec<Message>> for DeleteBatchInput {
    fn from(messages: Vec<Message>) -> Self {
        Self::Params(DeleteBatchParams {
            queue_url: None,
            source: DeleteSource::Messages(messages),
        })
    }
}

impl From<&[Message]> for DeleteBatchInput {
    fn from(messages: &[Message]) -> Self {
        Self::from(messages.to_vec())
    }
}

impl From<Batch> for DeleteBatchInput {
    fn from(batch: Batch) -> Self {
        Self::from(batch.messages)
    }
}

impl From<&Batch> for DeleteBatchInput {
    fn from(batch: &Batch) -> Self {
        Self::from(batch.messages.as_slice())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendParams {
    pub queue_url: Option<String>,
    pub message_body: Option<String>,
    pub delay_seconds: Option<u32>,
    pub message_attributes: Option<HashMap<String, MessageAttributeValue>>,
    pub message_deduplication_id: Option<String>,
    pub message_group_id: Option<String>,
    pub message_system_attributes: Option<HashMap<String, MessageAttributeValue>>,
}

impl SendParams {
    pub fn new(message_body: impl Into<String>) -> Self {
        Self {
            message_body: Some(message_body.into()),
            ..Default::default()
        }
    }

    /// Serialize `value` as the JSON message body
    pub fn json<T: Serialize>(value: &T) -> Result<Self, QueueError> {
        let body = serde_json::to_string(value).map_err(crate::error::SerializationError::Json)?;
        Ok(Self::new(body))
    }

    pub fn with_queue_url(mut self, queue_url: impl Into<String>) -> Self {
        self.queue_url = Some(queue_url.into());
        self
    }

    pub fn with_delay_seconds(mut self, seconds: u32) -> Self {
        self.delay_seconds = Some(seconds);
        self
    }

    pub fn with_message_attribute(
        mut self,
        name: impl Into<String>,
        value: MessageAttributeValue,
    ) -> Self {
        self.message_attributes
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value);
        self
    }

    pub fn with_message_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.message_group_id = Some(group_id.into());
        self
    }

    pub fn with_message_deduplication_id(mut self, dedup_id: impl Into<String>) -> Self {
        self.message_deduplication_id = Some(dedup_id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEntryInput {
    pub id: Option<String>,
    pub message_body: Option<String>,
    pub delay_seconds: Option<u32>,
    pub message_attributes: Option<HashMap<String, MessageAttributeValue>>,
    pub message_deduplication_id: Option<String>,
    pub message_group_id: Option<String>,
    pub message_system_attributes: Option<HashMap<String, MessageAttributeValue>>,
}

impl SendEntryInput {
    pub fn new(id: impl Into<String>, message_body: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            message_body: Some(message_body.into()),
            ..Default::default()
        }
    }

    pub fn with_delay_seconds(mut self, seconds: u32) -> Self {
        self.delay_seconds = Some(seconds);
        self
    }

    pub fn with_message_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.message_group_id = Some(group_id.into());
        self
    }

    pub fn with_message_deduplication_id(mut self, dedup_id: impl Into<String>) -> Self {
        self.message_deduplication_id = Some(dedup_id.into());
        self
    }

    pub fn with_message_attribute(
        mut self,
        name: impl Into<String>,
        value: MessageAttributeValue,
    ) -> Self {
        self.message_attributes
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBatchParams {
    pub queue_url: Option<String>,
    pub entries: Vec<SendEntryInput>,
}

/// Batch send input: a bare entry list, or a full parameter set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendBatchInput {
    Entries(Vec<SendEntryInput>),
    Params(SendBatchParams),
}

impl From<Vec<SendEntryInput>> for SendBatchInput {
    fn from(entries: Vec<SendEntryInput>) -> Self {
        Self::Entries(entries)
    }
}

impl From<SendBatchParams> for SendBatchInput {
    fn from(params: SendBatchParams) -> Self {
        Self::Params(params)
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Take a required string field, treating an empty value as missing
fn require(value: Option<String>, field: impl Into<String>) -> Result<String, QueueError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(QueueError::required(field)),
    }
}

fn queue_url(config: &QueueConfig, call: Option<String>) -> Result<String, QueueError> {
    require(call.or_else(|| config.queue_url.clone()), "QueueUrl")
}

pub fn create_queue_request(
    config: &QueueConfig,
    params: CreateQueueParams,
) -> Result<CreateQueueRequest, QueueError> {
    Ok(CreateQueueRequest {
        queue_name: require(
            params.queue_name.or_else(|| config.queue_name.clone()),
            "QueueName",
        )?,
        attributes: params.attributes.or_else(|| config.attributes.clone()),
    })
}

pub fn receive_message_request(
    config: &QueueConfig,
    params: ReceiveParams,
    mode: ReceiveMode,
) -> Result<ReceiveMessageRequest, QueueError> {
    let base = &config.receive;

    Ok(ReceiveMessageRequest {
        queue_url: queue_url(config, params.queue_url)?,
        attribute_names: params
            .attribute_names
            .or_else(|| base.attribute_names.clone()),
        // Zero means "not set" and takes the mode default
        max_number_of_messages: params
            .max_number_of_messages
            .filter(|&n| n > 0)
            .or(base.max_number_of_messages.filter(|&n| n > 0))
            .unwrap_or_else(|| mode.default_max_messages()),
        message_attribute_names: params
            .message_attribute_names
            .or_else(|| base.message_attribute_names.clone()),
        visibility_timeout: params.visibility_timeout.or(base.visibility_timeout),
        wait_time_seconds: params
            .wait_time_seconds
            .or(base.wait_time_seconds)
            .unwrap_or(DEFAULT_WAIT_TIME_SECONDS),
    })
}

pub fn delete_message_request(
    config: &QueueConfig,
    params: DeleteParams,
) -> Result<DeleteMessageRequest, QueueError> {
    Ok(DeleteMessageRequest {
        queue_url: queue_url(config, params.queue_url)?,
        receipt_handle: require(params.receipt_handle, "ReceiptHandle")?,
    })
}

fn delete_entry(index: usize, entry: DeleteEntryInput) -> Result<DeleteEntry, QueueError> {
    let id = entry
        .id
        .filter(|id| !id.is_empty())
        .or(entry.message_id);

    Ok(DeleteEntry {
        id: require(id, format!("Entries[{}].Id", index))?,
        receipt_handle: require(
            entry.receipt_handle,
            format!("Entries[{}].ReceiptHandle", index),
        )?,
    })
}

pub fn delete_message_batch_request(
    config: &QueueConfig,
    input: DeleteBatchInput,
) -> Result<DeleteMessageBatchRequest, QueueError> {
    let (call_url, entries) = match input {
        DeleteBatchInput::Entries(entries) => (None, entries),
        DeleteBatchInput::Params(params) => {
            let entries = match params.source {
                DeleteSource::Entries(entries) => entries,
                DeleteSource::Messages(messages) => {
                    messages.into_iter().map(DeleteEntryInput::from).collect()
                }
            };
            (params.queue_url, entries)
        }
    };

    Ok(DeleteMessageBatchRequest {
        queue_url: queue_url(config, call_url)?,
        entries: entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| delete_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?,
    })
}

pub fn send_message_request(
    config: &QueueConfig,
    params: SendParams,
) -> Result<SendMessageRequest, QueueError> {
    let base = &config.send;

    Ok(SendMessageRequest {
        queue_url: queue_url(config, params.queue_url)?,
        message_body: require(params.message_body, "MessageBody")?,
        delay_seconds: params.delay_seconds.or(base.delay_seconds),
        message_attributes: params
            .message_attributes
            .or_else(|| base.message_attributes.clone()),
        message_deduplication_id: params
            .message_deduplication_id
            .or_else(|| base.message_deduplication_id.clone()),
        message_group_id: params
            .message_group_id
            .or_else(|| base.message_group_id.clone()),
        message_system_attributes: params
            .message_system_attributes
            .or_else(|| base.message_system_attributes.clone()),
    })
}

fn send_entry(index: usize, entry: SendEntryInput) -> Result<SendEntry, QueueError> {
    Ok(SendEntry {
        id: require(entry.id, format!("Entries[{}].Id", index))?,
        message_body: require(entry.message_body, format!("Entries[{}].MessageBody", index))?,
        delay_seconds: entry.delay_seconds,
        message_attributes: entry.message_attributes,
        message_deduplication_id: entry.message_deduplication_id,
        message_group_id: entry.message_group_id,
        message_system_attributes: entry.message_system_attributes,
    })
}

pub fn send_message_batch_request(
    config: &QueueConfig,
    input: SendBatchInput,
) -> Result<SendMessageBatchRequest, QueueError> {
    let (call_url, entries) = match input {
        SendBatchInput::Entries(entries) => (None, entries),
        SendBatchInput::Params(params) => (params.queue_url, params.entries),
    };

    Ok(SendMessageBatchRequest {
        queue_url: queue_url(config, call_url)?,
        entries: entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| send_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?,
    })
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
