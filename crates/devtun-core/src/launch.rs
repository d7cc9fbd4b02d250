// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Running `localproxy` as the source client of a tunnel.

use std::ffi::OsStr;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info, instrument};

use crate::error::LaunchError;
use crate::token::AccessToken;
use crate::tunnel::ServiceBinding;

pub const DEFAULT_EXECUTABLE: &str = "localproxy";

/// Environment variable `localproxy` reads the access token from.
pub const ACCESS_TOKEN_ENV: &str = "AWSIOT_TUNNEL_ACCESS_TOKEN";

/// Locate the forwarding executable.
///
/// A name with a directory component is used as given. A bare name is looked
/// up in `search_path` (normally `$PATH`), falling back to `./<name>`. On
/// unix only files with an execute bit count as a match.
pub fn resolve_executable(name: &Path, search_path: Option<&OsStr>) -> PathBuf {
	if name.components().count() > 1 {
		return name.to_path_buf();
	}

	if let Some(search_path) = search_path {
		for dir in std::env::split_paths(search_path) {
			for candidate in candidate_names(name) {
				let path = dir.join(&candidate);
				if is_executable(&path) {
					return path;
				}
			}
		}
	}

	Path::new(".").join(name)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
	use std::os::unix::fs::PermissionsExt;

	path
		.metadata()
		.map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
		.unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
	path.is_file()
}

#[cfg(windows)]
fn candidate_names(name: &Path) -> Vec<PathBuf> {
	if name.extension().is_some() {
		vec![name.to_path_buf()]
	} else {
		vec![name.with_extension("exe"), name.to_path_buf()]
	}
}

#[cfg(not(windows))]
fn candidate_names(name: &Path) -> Vec<PathBuf> {
	vec![name.to_path_buf()]
}

/// Everything about a `localproxy` invocation except the token.
#[derive(Debug, Clone)]
pub struct ProxySettings {
	pub executable: PathBuf,
	pub region: String,
	pub bindings: Vec<ServiceBinding>,
	pub bind_address: IpAddr,
	pub cert_dir: PathBuf,
	/// Hand the token over in [`ACCESS_TOKEN_ENV`] instead of `-t`.
	pub token_via_env: bool,
}

impl ProxySettings {
	pub fn command(&self, token: &AccessToken) -> LocalProxyCommand {
		LocalProxyCommand {
			settings: self.clone(),
			token: token.clone(),
		}
	}
}

/// A fully specified `localproxy` command line.
///
/// `Display` renders the command with the token redacted.
#[derive(Debug, Clone)]
pub struct LocalProxyCommand {
	settings: ProxySettings,
	token: AccessToken,
}

impl LocalProxyCommand {
	pub fn program(&self) -> &Path {
		&self.settings.executable
	}

	/// Argument vector, with the raw token when it is passed by argument.
	pub fn args(&self) -> Vec<String> {
		self.render_args(self.token.expose())
	}

	/// Environment the process needs on top of the inherited one.
	pub fn envs(&self) -> Vec<(&'static str, &str)> {
		if self.settings.token_via_env {
			vec![(ACCESS_TOKEN_ENV, self.token.expose())]
		} else {
			Vec::new()
		}
	}

	pub fn to_command(&self) -> Command {
		let mut cmd = Command::new(self.program());
		cmd.args(self.args());
		cmd.envs(self.envs());
		cmd.stdin(Stdio::inherit());
		cmd.stdout(Stdio::inherit());
		cmd.stderr(Stdio::inherit());
		cmd
	}

	fn render_args(&self, token: &str) -> Vec<String> {
		let services = self
			.settings
			.bindings
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join(",");

		let mut args = vec![
			"-r".to_string(),
			self.settings.region.clone(),
			"-s".to_string(),
			services,
			"-b".to_string(),
			self.settings.bind_address.to_string(),
			"-c".to_string(),
			self.settings.cert_dir.display().to_string(),
		];
		if !self.settings.token_via_env {
			args.push("-t".to_string());
			args.push(token.to_string());
		}
		args
	}
}

impl fmt::Display for LocalProxyCommand {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.program().display())?;
		for arg in self.render_args(crate::token::REDACTED) {
			write!(f, " {arg}")?;
		}
		Ok(())
	}
}

/// Runs a command to completion in the foreground.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
	/// Exit code of the finished process; `None` if it was killed by a signal.
	async fn run(&self, command: &LocalProxyCommand) -> std::io::Result<Option<i32>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
	async fn run(&self, command: &LocalProxyCommand) -> std::io::Result<Option<i32>> {
		let status = command.to_command().status().await?;
		Ok(status.code())
	}
}

/// Starts the forwarding process for a source token.
#[async_trait]
pub trait ProxyLauncher: Send + Sync {
	async fn launch(&self, token: &AccessToken) -> Result<(), LaunchError>;
}

pub struct LocalProxyLauncher<R = TokioProcessRunner> {
	settings: ProxySettings,
	runner: R,
}

impl LocalProxyLauncher<TokioProcessRunner> {
	pub fn new(settings: ProxySettings) -> Self {
		Self::with_runner(settings, TokioProcessRunner)
	}
}

impl<R: ProcessRunner> LocalProxyLauncher<R> {
	pub fn with_runner(settings: ProxySettings, runner: R) -> Self {
		Self { settings, runner }
	}

	pub fn settings(&self) -> &ProxySettings {
		&self.settings
	}
}

#[async_trait]
impl<R: ProcessRunner> ProxyLauncher for LocalProxyLauncher<R> {
	#[instrument(skip_all, fields(program = %self.settings.executable.display()))]
	async fn launch(&self, token: &AccessToken) -> Result<(), LaunchError> {
		let command = self.settings.command(token);
		info!(command = %command, "running local proxy");

		let code = self
			.runner
			.run(&command)
			.await
			.map_err(|source| LaunchError::Spawn {
				program: command.program().display().to_string(),
				source,
			})?;

		match code {
			Some(0) => {
				info!("local proxy exited");
				Ok(())
			}
			code => {
				error!(exit_code = ?code, "failed to execute local proxy");
				Err(LaunchError::NonZeroExit { code })
			}
		}
	}
}
