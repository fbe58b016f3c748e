mod app;
mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use exn::ResultExt;
use inkvault_config::Config;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::ErrorKind;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = async {
        let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
        commands::run(config, cli.command).await
    }
    .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

/// `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
