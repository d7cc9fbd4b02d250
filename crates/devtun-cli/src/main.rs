// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `devtun`: keep exactly one AWS IoT secure tunnel per device and connect to
//! it through `localproxy`.

mod args;
mod commands;
mod logging;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::CommandFactory;
use console::style;
use devtun_config::DevtunConfig;
use tracing::debug;

use crate::args::Cli;

fn load_config(cli: &Cli) -> Result<DevtunConfig> {
	devtun_config::load_config_with_cli(cli.overrides()).context("failed to load configuration")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	let cli = Cli::parse_args(std::env::args_os());

	let Some(action) = cli.action() else {
		if let Err(e) = Cli::command().print_help() {
			eprintln!("{} {e}", style("error:").red().bold());
		}
		return ExitCode::SUCCESS;
	};

	let config = match load_config(&cli) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("{} {e:#}", style("error:").red().bold());
			return ExitCode::FAILURE;
		}
	};

	logging::init_tracing(&config.logging);
	debug!(device = %action.device(), region = %config.aws.region, "starting");

	ExitCode::from(commands::run(&action, &config, cli.show_tokens).await)
}
