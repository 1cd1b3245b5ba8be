//! `action-gateway` binary.

// std
use std::process::ExitCode;
// crates.io
use action_gateway::{
	cli::{self, Cli},
	obs,
};
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	obs::install_subscriber(&cli.log_level);

	match cli::run(cli.command).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!(code = e.code(), error = %e, "Command failed.");

			ExitCode::FAILURE
		},
	}
}
