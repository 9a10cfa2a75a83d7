use sqs_poller_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!("CLI error: {}", e);
        eprintln!("Error: {}", e);

        // Exit with appropriate code based on error type
        let exit_code = match e {
            sqs_poller_cli::CliError::Configuration(_) => 1,
            sqs_poller_cli::CliError::Queue(_) => 2,
            sqs_poller_cli::CliError::InvalidArgument { .. } => 3,
            sqs_poller_cli::CliError::Logging { .. } => 4,
            sqs_poller_cli::CliError::Io(_) => 5,
            sqs_poller_cli::CliError::Output(_) => 6,
        };

        std::process::exit(exit_code);
    }
}
