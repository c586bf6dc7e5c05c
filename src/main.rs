mod cli;
mod config;
mod engines;
mod error;
mod output;
mod workflow;

use cli::Cli;
use engines::ChromiumEngine;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging; stdout is reserved for the success line
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "html2pdf=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let request = match Cli::parse_args().into_request() {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    let input = request.input.clone();
    let output = request.output.clone();

    match workflow::run(request, Arc::new(ChromiumEngine::new())).await {
        Ok(()) => {
            println!(
                "Successfully converted '{}' to '{}'",
                input.display(),
                output.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            if e.is_conversion_failure() {
                eprintln!("Error converting HTML to PDF: {}", e);
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::from(e.exit_code())
        }
    }
}
