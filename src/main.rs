mod app_config;
mod cli;
mod commands;
mod config;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("unimail=debug")
    } else {
        EnvFilter::try_from_env("UNIMAIL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // stdout carries the envelope only.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    let env = commands::dispatch(&cli).await;
    output::print_envelope(&env);

    if !env.ok {
        std::process::exit(1);
    }
}
