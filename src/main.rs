/// Main entry point for the orderbook replica
///
/// This serves as a thin wrapper that delegates to the interfaces layer.
/// The actual application logic is implemented in `interfaces::cli`.

use clap::Parser;
use lob_mirror::interfaces::cli::{self, CliConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = CliConfig::parse();
    cli::init_logging(&config.log_level);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .thread_name("lob-lane")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli::run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "lob-mirror exited with error");
            ExitCode::FAILURE
        }
    }
}
