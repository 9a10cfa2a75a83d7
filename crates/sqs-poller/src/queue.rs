//! The [`Queue`] facade.

use crate::client::{
    CreateQueueOutput, DeleteMessageBatchOutput, QueueProvider, SendMessageBatchOutput,
    SendMessageOutput,
};
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::normalize::{
    self, CreateQueueParams, DeleteBatchInput, DeleteParams, ReceiveParams, SendBatchInput,
    SendParams,
};
use crate::poll::{self, BatchStream, MessageStream};
use crate::providers::SqsHttpProvider;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A handle binding one [`QueueConfig`] and one provider to every operation.
///
/// Each call merges its own parameters over the bound configuration; the
/// configuration itself only changes when [`Queue::create`] records the URL of
/// the queue it created.
///
/// ```no_run
/// use futures::TryStreamExt;
/// use sqs_poller::{Queue, QueueConfig, ReceiveParams, SendParams};
///
/// # async fn example() -> Result<(), sqs_poller::QueueError> {
/// let queue = Queue::new(
///     QueueConfig::default()
///         .with_region("us-east-1")
///         .with_queue_url("https://sqs.us-east-1.amazonaws.com/123456789012/orders"),
/// )?;
///
/// queue.send_message(SendParams::new("hello")).await?;
///
/// let mut batches = queue.receive_batches(ReceiveParams::default())?;
/// while let Some(batch) = batches.try_next().await? {
///     for message in &batch {
///         println!("{}", message.body);
///     }
///     if !batch.is_empty() {
///         queue.delete_batch(&batch).await?;
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Queue {
    provider: Arc<dyn QueueProvider>,
    config: QueueConfig,
}

impl Queue {
    /// Bind `config`, building an SQS HTTP provider from it
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        let provider = SqsHttpProvider::from_config(&config)?;
        Ok(Self::with_provider(config, Arc::new(provider)))
    }

    /// Bind `config` to an existing provider
    pub fn with_provider(config: QueueConfig, provider: Arc<dyn QueueProvider>) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn queue_url(&self) -> Option<&str> {
        self.config.queue_url.as_deref()
    }

    pub fn provider(&self) -> &Arc<dyn QueueProvider> {
        &self.provider
    }

    /// Create the queue and bind its URL to this handle for later calls
    pub async fn create(
        &mut self,
        params: CreateQueueParams,
    ) -> Result<CreateQueueOutput, QueueError> {
        let request = normalize::create_queue_request(&self.config, params)?;
        debug!(request = ?request, "createQueue params");

        let output = self.provider.create_queue(request).await?;
        debug!(result = ?output, "createQueue result");

        info!(queue_url = %output.queue_url, "Queue created");
        self.config.queue_url = Some(output.queue_url.clone());

        Ok(output)
    }

    /// Infinite stream of batches, up to 10 messages each by default
    pub fn receive_batches(&self, params: ReceiveParams) -> Result<BatchStream, QueueError> {
        poll::receive_batches(self.provider.clone(), &self.config, params)
    }

    /// Infinite stream of single messages, one receive per message by default
    pub fn receive_messages(&self, params: ReceiveParams) -> Result<MessageStream, QueueError> {
        poll::receive_messages(self.provider.clone(), &self.config, params)
    }

    /// Delete several messages at once.
    ///
    /// Accepts a received [`Batch`](crate::Batch), a list of messages or a list
    /// of explicit entries. Entries the provider rejects are reported in
    /// [`DeleteMessageBatchOutput::failed`].
    pub async fn delete_batch(
        &self,
        input: impl Into<DeleteBatchInput>,
    ) -> Result<DeleteMessageBatchOutput, QueueError> {
        let request = normalize::delete_message_batch_request(&self.config, input.into())?;
        debug!(request = ?request, "deleteMessageBatch params");

        let output = self.provider.delete_message_batch(request).await?;
        debug!(result = ?output, "deleteMessageBatch result");

        Ok(output)
    }

    pub async fn delete_message(&self, params: impl Into<DeleteParams>) -> Result<(), QueueError> {
        let request = normalize::delete_message_request(&self.config, params.into())?;
        debug!(request = ?request, "deleteMessage params");

        self.provider.delete_message(request).await?;
        debug!("deleteMessage result: ok");

        Ok(())
    }

    /// Send several messages at once; rejected entries are reported in
    /// [`SendMessageBatchOutput::failed`].
    pub async fn send_batch(
        &self,
        input: impl Into<SendBatchInput>,
    ) -> Result<SendMessageBatchOutput, QueueError> {
        let request = normalize::send_message_batch_request(&self.config, input.into())?;
        debug!(request = ?request, "sendMessageBatch params");

        let output = self.provider.send_message_batch(request).await?;
        debug!(result = ?output, "sendMessageBatch result");

        Ok(output)
    }

    pub async fn send_message(&self, params: SendParams) -> Result<SendMessageOutput, QueueError> {
        let request = normalize::send_message_request(&self.config, params)?;
        debug!(request = ?request, "sendMessage params");

        let output = self.provider.send_message(request).await?;
        debug!(result = ?output, "sendMessage result");

        Ok(output)
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("config", &self.config)
            .field("provider", &"<dyn QueueProvider>")
            .finish()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
