//! # SQS Poller
//!
//! A thin facade over an SQS-style message queue that turns long-polling into
//! asynchronous streams.
//!
//! This library provides:
//! - A [`Queue`] handle binding one configuration to every operation
//! - Per-call parameter merging over that configuration
//! - An infinite, lazy stream of received batches, heartbeats included
//! - A flattened stream of individual messages
//! - Single and batch send/delete helpers
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Received messages, batches and attribute values
//! - [`config`] - Handle configuration and environment loading
//! - [`client`] - The provider trait and its request/response types
//! - [`normalize`] - Per-call parameter types and request building
//! - [`poll`] - The poll iterator and its batch and message views
//! - [`providers`] - SQS HTTP and in-memory providers

pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod normalize;
pub mod poll;
pub mod providers;
pub mod queue;

#[cfg(test)]
mod test_support;

pub use client::{
    BatchResultError, CreateQueueOutput, DeleteMessageBatchOutput, QueueProvider,
    ReceiveMessageOutput, SendMessageBatchOutput, SendMessageOutput,
};
pub use config::{Credentials, QueueConfig, ReceiveOptions, SendOptions};
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use message::{Batch, Message, MessageAttributeValue};
pub use normalize::{
    CreateQueueParams, DeleteBatchInput, DeleteBatchParams, DeleteEntryInput, DeleteParams,
    ReceiveParams, SendBatchInput, SendBatchParams, SendEntryInput, SendParams,
};
pub use poll::{BatchStream, MessageStream};
pub use providers::{InMemoryProvider, SqsHttpProvider};
pub use queue::Queue;
