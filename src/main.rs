use clap::Parser;
use laddersim::cli::{Cli, run};
use tracing_subscriber::EnvFilter;

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("laddersim=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> std::process::ExitCode {
    setup_logging();
    run(Cli::parse())
}
