// SPDX-License-Identifier: MIT

//! runner - safe command runner CLI.

mod cli;
mod error;
mod runner;

use clap::Parser;

use cli::Cli;
use error::RunnerError;
use runner::Runner;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        let code = e.downcast_ref::<RunnerError>().map_or(scr_core::ExitCode::Internal, RunnerError::exit_code);
        let msg = format_error(&e);
        if !msg.is_empty() {
            eprintln!("Error: {}", msg);
        }
        std::process::exit(code.code());
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let _guard = scr_logging::init(scr_logging::LoggingConfig {
        log_level: cli.log_level.clone(),
        log_file: cli.log_file.clone(),
        slack_webhook_url: scr_logging::slack_webhook_from_env(),
        quiet: cli.quiet,
    })?;

    Runner::new(cli).run().await.map_err(anyhow::Error::from)
}

/// Formats an anyhow error, deduplicating the chain.
///
/// If the top-level `Display` already contains every source error's text,
/// the "Caused by" chain is redundant (common when `thiserror` variants use
/// `#[error(transparent)]` with `#[from]`) and is skipped.
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();

    let chain_redundant = err.chain().skip(1).all(|cause| top.contains(&cause.to_string()));
    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}
