//! Long-polling iteration over a queue.
//!
//! [`poll`] is the single producer: an unbounded, lazy stream that issues one
//! receive call per pull and yields every response as a [`Batch`], empty
//! responses included. It never ends on its own. A provider error is yielded
//! once and terminates the stream; polling resumes only by building a new
//! stream. Dropping the stream is the only way to cancel it.
//!
//! The two views sit on top of it: [`receive_batches`] passes batches through
//! unchanged, [`receive_messages`] flattens them into single messages.

use crate::client::{QueueProvider, ReceiveMessageRequest};
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::message::{Batch, Message};
use crate::normalize::{receive_message_request, ReceiveMode, ReceiveParams};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

/// Infinite stream of received batches
pub type BatchStream = BoxStream<'static, Result<Batch, QueueError>>;

/// Infinite stream of received messages
pub type MessageStream = BoxStream<'static, Result<Message, QueueError>>;

/// Repeatedly receive with `request`, yielding one batch per call.
pub fn poll(provider: Arc<dyn QueueProvider>, request: ReceiveMessageRequest) -> BatchStream {
    stream::try_unfold((provider, request), |(provider, request)| async move {
        debug!(
            queue_url = %request.queue_url,
            max_number_of_messages = request.max_number_of_messages,
            wait_time_seconds = request.wait_time_seconds,
            visibility_timeout = ?request.visibility_timeout,
            "receiveMessage params"
        );

        let output = provider.receive_message(request.clone()).await?;
        let batch = Batch {
            messages: output.messages.unwrap_or_default(),
            request_id: output.request_id,
        };

        debug!(
            message_count = batch.len(),
            request_id = ?batch.request_id,
            "receiveMessage result"
        );

        Ok::<_, QueueError>(Some((batch, (provider, request))))
    })
    .boxed()
}

/// Batch view: up to 10 messages per pull unless overridden.
pub fn receive_batches(
    provider: Arc<dyn QueueProvider>,
    config: &QueueConfig,
    params: ReceiveParams,
) -> Result<BatchStream, QueueError> {
    let request = receive_message_request(config, params, ReceiveMode::Batches)?;
    Ok(poll(provider, request))
}

/// Message view: one message per pull unless overridden, each batch
/// flattened in order before the next pull.
pub fn receive_messages(
    provider: Arc<dyn QueueProvider>,
    config: &QueueConfig,
    params: ReceiveParams,
) -> Result<MessageStream, QueueError> {
    let request = receive_message_request(config, params, ReceiveMode::Messages)?;
    Ok(flatten(poll(provider, request)))
}

fn flatten(batches: BatchStream) -> MessageStream {
    batches
        .map_ok(|batch| stream::iter(batch.messages.into_iter().map(Ok::<_, QueueError>)))
        .try_flatten()
        .boxed()
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
