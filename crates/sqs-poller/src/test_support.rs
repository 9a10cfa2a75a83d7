//! Recording provider used by unit tests.

use crate::client::*;
use crate::error::QueueError;
use crate::message::Message;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A call observed by [`MockProvider`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateQueue(CreateQueueRequest),
    Receive(ReceiveMessageRequest),
    Delete(DeleteMessageRequest),
    DeleteBatch(DeleteMessageBatchRequest),
    Send(SendMessageRequest),
    SendBatch(SendMessageBatchRequest),
}

/// Provider that records every request and replays scripted receive results.
///
/// Once the script is exhausted, receives return a response with no message
/// collection at all.
#[derive(Default)]
pub struct MockProvider {
    calls: Mutex<Vec<Call>>,
    receives: Mutex<VecDeque<Result<ReceiveMessageOutput, QueueError>>>,
    created_url: Mutex<Option<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_created_url(self, url: &str) -> Self {
        *self.created_url.lock().unwrap() = Some(url.to_string());
        self
    }

    /// Queue a receive response holding `count` messages
    pub fn push_batch(&self, prefix: &str, count: usize) {
        let messages = (0..count)
            .map(|i| {
                Message::new(
                    format!("{}-{}", prefix, i),
                    format!("receipt-{}-{}", prefix, i),
                    format!("body-{}-{}", prefix, i),
                )
            })
            .collect();

        self.push_receive(Ok(ReceiveMessageOutput {
            messages: Some(messages),
            request_id: None,
        }));
    }

    pub fn push_receive(&self, result: Result<ReceiveMessageOutput, QueueError>) {
        self.receives.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn receive_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Receive(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl QueueProvider for MockProvider {
    async fn create_queue(
        &self,
        request: CreateQueueRequest,
    ) -> Result<CreateQueueOutput, QueueError> {
        let queue_url = self
            .created_url
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| format!("mock://{}", request.queue_name));
        self.record(Call::CreateQueue(request));
        Ok(CreateQueueOutput { queue_url })
    }

    async fn receive_message(
        &self,
        request: ReceiveMessageRequest,
    ) -> Result<ReceiveMessageOutput, QueueError> {
        self.record(Call::Receive(request));
        self.receives
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ReceiveMessageOutput::default()))
    }

    async fn delete_message(&self, request: DeleteMessageRequest) -> Result<(), QueueError> {
        self.record(Call::Delete(request));
        Ok(())
    }

    async fn delete_message_batch(
        &self,
        request: DeleteMessageBatchRequest,
    ) -> Result<DeleteMessageBatchOutput, QueueError> {
        let successful = request
            .entries
            .iter()
            .map(|e| DeleteBatchResultEntry { id: e.id.clone() })
            .collect();
        self.record(Call::DeleteBatch(request));
        Ok(DeleteMessageBatchOutput {
            successful,
            failed: Vec::new(),
        })
    }

    async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<SendMessageOutput, QueueError> {
        self.record(Call::Send(request));
        Ok(SendMessageOutput {
            message_id: "sent-1".to_string(),
            ..Default::default()
        })
    }

    async fn send_message_batch(
        &self,
        request: SendMessageBatchRequest,
    ) -> Result<SendMessageBatchOutput, QueueError> {
        let successful = request
            .entries
            .iter()
            .map(|e| SendBatchResultEntry {
                id: e.id.clone(),
                message_id: format!("sent-{}", e.id),
                md5_of_message_body: None,
                sequence_number: None,
            })
            .collect();
        self.record(Call::SendBatch(request));
        Ok(SendMessageBatchOutput {
            successful,
            failed: Vec::new(),
        })
    }
}
