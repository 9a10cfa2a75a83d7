//! # SQS Poller CLI
//!
//! Command-line interface over the [`sqs_poller::Queue`] facade.
//!
//! This module provides CLI commands for:
//! - Creating a queue and printing its URL
//! - Sending messages one at a time or as a batch
//! - Consuming the message or batch stream, deleting what was consumed
//!
//! Connection settings come from `SQS_*` environment variables and can be
//! overridden per invocation with the global flags.

use clap::{Parser, Subcommand};
use futures::{StreamExt, TryStreamExt};
use sqs_poller::{
    ConfigurationError, CreateQueueParams, Queue, QueueConfig, QueueError, ReceiveParams,
    SendEntryInput, SendParams,
};
use std::io::Write;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// sqs-poller - long-polling consumer and producer for SQS queues
#[derive(Parser, Debug)]
#[command(name = "sqs-poller")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Send to and consume from SQS queues")]
#[command(
    long_about = "Send to and consume from SQS queues. Consumers long-poll forever unless --limit is given"
)]
pub struct Cli {
    /// AWS region of the queue
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Named profile in the shared credentials file
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Endpoint override, e.g. a local SQS emulator
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// URL of the queue to operate on
    #[arg(long, global = true)]
    pub queue_url: Option<String>,

    /// Name of the queue to create
    #[arg(long, global = true)]
    pub queue_name: Option<String>,

    /// Close connections after each request
    #[arg(long, global = true)]
    pub no_keep_alive: bool,

    /// Logging level
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Create the queue named by --queue-name and print its URL
    Create,

    /// Send messages `MessageBody{i}` one at a time
    Send {
        /// Number of messages to send
        #[arg(short, long, default_value = "10")]
        count: u32,
    },

    /// Send one batch of entries `MessageId{i}` / `MessageBody{i}`
    SendBatch {
        /// Number of entries in the batch
        #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=10))]
        count: u32,
    },

    /// Print and delete messages one by one
    Consume {
        #[command(flatten)]
        receive: ReceiveArgs,
    },

    /// Print and delete whole batches, empty polls included
    ConsumeBatches {
        #[command(flatten)]
        receive: ReceiveArgs,
    },
}

/// Receive settings shared by the consume commands
#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveArgs {
    /// Stop after this many messages (or batches); runs forever otherwise
    #[arg(long)]
    pub limit: Option<usize>,

    /// Maximum messages per receive call
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_messages: Option<u32>,

    /// Long-poll wait per receive call, in seconds
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub wait_time_seconds: Option<u32>,

    /// Visibility timeout applied to received messages, in seconds
    #[arg(long)]
    pub visibility_timeout: Option<u32>,
}

impl ReceiveArgs {
    fn params(&self) -> ReceiveParams {
        ReceiveParams {
            max_number_of_messages: self.max_messages,
            wait_time_seconds: self.wait_time_seconds,
            visibility_timeout: self.visibility_timeout,
            attribute_names: Some(vec!["All".to_string()]),
            message_attribute_names: Some(vec!["All".to_string()]),
            ..Default::default()
        }
    }
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Logging initialization failed: {message}")]
    Logging { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let config = load_configuration(&cli, QueueConfig::from_env()?);
    let mut queue = Queue::new(config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute_command(cli.command, &mut queue, &mut out).await
}

/// Install the tracing subscriber; logs go to stderr, results to stdout
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "sqs_poller={level},sqs_poller_cli={level}",
            level = cli.log_level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

/// Apply the global flags over the environment configuration
pub fn load_configuration(cli: &Cli, mut config: QueueConfig) -> QueueConfig {
    if let Some(region) = &cli.region {
        config = config.with_region(region);
    }
    if let Some(profile) = &cli.profile {
        config = config.with_profile(profile);
    }
    if let Some(endpoint) = &cli.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if let Some(queue_url) = &cli.queue_url {
        config = config.with_queue_url(queue_url);
    }
    if let Some(queue_name) = &cli.queue_name {
        config = config.with_queue_name(queue_name);
    }
    if cli.no_keep_alive {
        config = config.with_keep_alive(false);
    }
    config
}

/// Run one command against `queue`, writing results to `out`
pub async fn execute_command<W: Write>(
    command: Commands,
    queue: &mut Queue,
    out: &mut W,
) -> Result<(), CliError> {
    match command {
        Commands::Create => execute_create_command(queue, out).await,
        Commands::Send { count } => execute_send_command(queue, count, out).await,
        Commands::SendBatch { count } => execute_send_batch_command(queue, count, out).await,
        Commands::Consume { receive } => execute_consume_command(queue, &receive, out).await,
        Commands::ConsumeBatches { receive } => {
            execute_consume_batches_command(queue, &receive, out).await
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn execute_create_command<W: Write>(queue: &mut Queue, out: &mut W) -> Result<(), CliError> {
    if queue.config().queue_name.is_none() {
        return Err(CliError::InvalidArgument {
            arg: "--queue-name".to_string(),
            message: "a queue name is required to create a queue".to_string(),
        });
    }

    let output = queue.create(CreateQueueParams::default()).await?;
    writeln!(out, "{}", output.queue_url)?;
    Ok(())
}

async fn execute_send_command<W: Write>(
    queue: &Queue,
    count: u32,
    out: &mut W,
) -> Result<(), CliError> {
    info!(count = count, "Sending messages");

    for i in 0..count {
        let output = queue
            .send_message(SendParams::new(format!("MessageBody{}", i)))
            .await?;
        writeln!(out, "{}", output.message_id)?;
    }

    Ok(())
}

async fn execute_send_batch_command<W: Write>(
    queue: &Queue,
    count: u32,
    out: &mut W,
) -> Result<(), CliError> {
    info!(count = count, "Sending batch");

    let entries: Vec<SendEntryInput> = (0..count)
        .map(|i| SendEntryInput::new(format!("MessageId{}", i), format!("MessageBody{}", i)))
        .collect();

    let output = queue.send_batch(entries).await?;
    for failure in &output.failed {
        warn!(id = %failure.id, code = %failure.code, "Batch entry rejected");
    }

    writeln!(out, "{}", serde_json::to_string(&output)?)?;
    Ok(())
}

async fn execute_consume_command<W: Write>(
    queue: &Queue,
    args: &ReceiveArgs,
    out: &mut W,
) -> Result<(), CliError> {
    info!(limit = ?args.limit, "Consuming messages");

    let messages = queue.receive_messages(args.params())?;
    let mut messages = match args.limit {
        Some(limit) => messages.take(limit).boxed(),
        None => messages,
    };

    let mut consumed = 0usize;
    while let Some(message) = messages.try_next().await? {
        writeln!(out, "{}", serde_json::to_string(&message)?)?;
        queue.delete_message(&message).await?;
        consumed += 1;
    }

    info!(consumed = consumed, "Consumption finished");
    Ok(())
}

async fn execute_consume_batches_command<W: Write>(
    queue: &Queue,
    args: &ReceiveArgs,
    out: &mut W,
) -> Result<(), CliError> {
    info!(limit = ?args.limit, "Consuming batches");

    let batches = queue.receive_batches(args.params())?;
    let mut batches = match args.limit {
        Some(limit) => batches.take(limit).boxed(),
        None => batches,
    };

    while let Some(batch) = batches.try_next().await? {
        writeln!(out, "{}", serde_json::to_string(&batch)?)?;
        if batch.is_empty() {
            continue;
        }

        let output = queue.delete_batch(&batch).await?;
        for failure in &output.failed {
            warn!(id = %failure.id, code = %failure.code, "Delete rejected");
        }
    }

    Ok(())
}
