use clap::Parser;

use lineage::app::{handle_fatal_error, init_logging_to, AppConfig, LogDestination};
use lineage::cli::{execute_command, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let app = match AppConfig::new(verbose) {
        Ok(app) => app,
        Err(e) => handle_fatal_error(e, verbose),
    };
    let app = match cli.directory {
        Some(dir) => app.with_working_dir(dir),
        None => app,
    };
    let destination = match &cli.command {
        Commands::Run { .. } => LogDestination::for_tracked_run(&app),
        _ => LogDestination::Stderr,
    };
    init_logging_to(&app, destination);

    match execute_command(cli.command, &app).await {
        Ok(code) => std::process::exit(code),
        Err(e) => handle_fatal_error(e, verbose),
    }
}
