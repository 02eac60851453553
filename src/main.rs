use clap::Parser;
use marvin_mirror::cli::commands::Cli;
use marvin_mirror::cli::handlers;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `MVM_LOG=marvin_mirror=debug`.
const LOG_ENV: &str = "MVM_LOG";

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
