mod cli;
mod commit;
mod config;
mod detector;
mod document;
mod error;
mod harness;
mod ingest;
mod output;
mod store;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting benchkeeper");
    match cli.execute().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}
