use clap::Parser;
use std::process::Termination;
use sysexits::ExitCode;
use voldriver::cmd::{self, Cli};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    if let Err(e) = cli.logger.init() {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::Config.into();
    }

    match cmd::run(cli.cmd).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => e.report(),
    }
}
