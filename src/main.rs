use chaosforge::cli::{execute_command, Cli};
use chaosforge::config::load_config;
use chaosforge::error::ChaosError;
use chaosforge::logging::{init_logging, LogOptions};
use clap::Parser;
use tracing::{debug, error, trace};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(2);
        }
    };

    let options = LogOptions {
        verbosity: cli.verbose,
        json: cli.log_json || config.logging.json,
        level: config.logging.level.clone(),
    };
    if let Err(e) = init_logging(&options) {
        eprintln!("Error: {e}");
        std::process::exit(2);
    }

    debug!("chaosforge started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    match execute_command(cli.command, config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {}", e);
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<ChaosError>()
                .map(ChaosError::exit_code)
                .unwrap_or(1);
            std::process::exit(code);
        }
    }
}
