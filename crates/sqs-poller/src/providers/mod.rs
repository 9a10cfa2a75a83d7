//! Queue provider implementations.
//!
//! This module contains the concrete implementations of [`QueueProvider`]:
//! the SQS Query API over HTTP and a process-local in-memory queue.
//!
//! [`QueueProvider`]: crate::client::QueueProvider

pub mod aws;
pub mod memory;

pub use aws::{AwsError, SqsHttpProvider};
pub use memory::InMemoryProvider;
