use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod replay;
mod sim;

const DEMO_TICKS: u64 = 600;

fn main() -> ExitCode {
    init_tracing();
    info!("=== Tilerealm Startup ===");

    let paths = match engine::resolve_asset_paths() {
        Ok(paths) => paths,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    match sim::run_demo(&paths, DEMO_TICKS) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                exits_taken = summary.exits_taken,
                exits_failed = summary.exits_failed,
                sounds = summary.sounds,
                "demo_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "demo_failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
