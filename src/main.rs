// Standard library
use std::error::Error;
use std::process::ExitCode;

// 3rd party crates
use clap::Parser;
use tracing::{error, info};

// Project imports
use ratelimit_decay::server::settings::{Args, Settings};
use ratelimit_decay::{server, Registry};

/// Serves rate-limited work over HTTP.
///
/// `/sync` waits for a permit before doing its work, `/async` rejects
/// the request with `429` when no permit is available. The limiter
/// strategy, its burst size and its window come from the command line,
/// an optional configuration file and `RATELIMIT_*` variables.
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let settings = match Settings::load(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    server::init_logging(&settings.log_level);
    info!(?settings, "Settings have been loaded.");

    if let Err(e) = run(settings).await {
        error!("Application error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete.");
    ExitCode::SUCCESS
}

async fn run(settings: Settings) -> Result<(), Box<dyn Error>> {
    let registry = Registry::default();
    info!(
        strategies = ?registry.names().collect::<Vec<_>>(),
        "rate limiter strategies available"
    );

    let state = server::build_state(&registry, &settings)?;
    let served = server::serve(&settings, state.clone()).await;

    // Already done on Ctrl+C; covers serve failing before that.
    state.destroy();
    served?;
    Ok(())
}
