// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: files, environment, CLI, defaults.

use std::path::PathBuf;

use tracing::{debug, trace, warn};

use crate::layer::ConfigLayer;
use crate::paths::PathsConfig;
use crate::ConfigError;

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	SystemFile = 20,
	UserFile = 30,
	ExplicitFile = 40,
	Environment = 50,
	Cli = 60,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	/// Name for logging
	fn name(&self) -> &'static str;

	fn precedence(&self) -> Precedence;

	/// Any error aborts loading; a source with nothing to say returns an
	/// empty layer.
	fn load(&self) -> Result<ConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		// Defaults are filled in when the runtime config is built.
		Ok(ConfigLayer::default())
	}
}

/// File-based configuration source (TOML).
///
/// A missing system or user file is skipped. A file that exists must parse.
pub struct FileSource {
	path: PathBuf,
	precedence: Precedence,
	name: &'static str,
	required: bool,
}

impl FileSource {
	/// System config: /etc/devtun/config.toml
	pub fn system(paths: &PathsConfig) -> Self {
		Self {
			path: paths.system_config_file.clone(),
			precedence: Precedence::SystemFile,
			name: "system-config",
			required: false,
		}
	}

	/// User config: ~/.config/devtun/config.toml
	pub fn user(paths: &PathsConfig) -> Self {
		Self {
			path: paths.user_config_file.clone(),
			precedence: Precedence::UserFile,
			name: "user-config",
			required: false,
		}
	}

	/// File passed with `--config`; it must exist and parse.
	pub fn explicit(path: PathBuf) -> Self {
		Self {
			path,
			precedence: Precedence::ExplicitFile,
			name: "explicit-config",
			required: true,
		}
	}
}

impl ConfigSource for FileSource {
	fn name(&self) -> &'static str {
		self.name
	}
	fn precedence(&self) -> Precedence {
		self.precedence
	}
	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		if !self.path.exists() {
			if self.required {
				return Err(ConfigError::FileNotFound(self.path.clone()));
			}
			debug!(path = %self.path.display(), source = self.name, "config file not found, skipping");
			return Ok(ConfigLayer::default());
		}

		debug!(path = %self.path.display(), source = self.name, "loading config file");

		let content = std::fs::read_to_string(&self.path)?;
		let layer: ConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!(source = self.name, "parsed config layer");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Recognised variables are `DEVTUN_<FIELD>`; unknown `DEVTUN_` variables
/// are ignored.
pub struct EnvSource {
	vars: Vec<(String, String)>,
}

impl EnvSource {
	/// Snapshot of the process environment.
	pub fn from_process() -> Self {
		Self::from_vars(std::env::vars())
	}

	pub fn from_vars<I, K, V>(vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: vars
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.filter(|(k, _)| k.starts_with("DEVTUN_"))
				.collect(),
		}
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading environment variables");
		let mut layer = ConfigLayer::default();

		for (key, value) in &self.vars {
			let value = value.trim().to_string();
			if value.is_empty() {
				continue;
			}

			trace!(key = %key, "processing env var");

			match key.as_str() {
				"DEVTUN_PROFILE" => layer.aws_mut().profile = Some(value),
				"DEVTUN_REGION" => layer.aws_mut().region = Some(value),
				"DEVTUN_LOCALPROXY" => layer.proxy_mut().executable = Some(PathBuf::from(value)),
				"DEVTUN_BIND_ADDRESS" => layer.proxy_mut().bind_address = Some(value),
				"DEVTUN_CERT_DIR" => layer.proxy_mut().cert_dir = Some(PathBuf::from(value)),
				"DEVTUN_SSH_PORT" => layer.proxy_mut().ssh_port = parse_port(key, &value),
				"DEVTUN_GORT_PORT" => layer.proxy_mut().gort_port = parse_port(key, &value),
				"DEVTUN_LOG_LEVEL" => layer.logging_mut().level = Some(value),
				"DEVTUN_LOG_FORMAT" => layer.logging_mut().format = Some(value),
				_ => {}
			}
		}

		Ok(layer)
	}
}

fn parse_port(key: &str, value: &str) -> Option<u16> {
	match value.parse() {
		Ok(port) => Some(port),
		Err(_) => {
			warn!(key = %key, value = %value, "ignoring port that is not a number");
			None
		}
	}
}

/// CLI argument overrides.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
	pub profile: Option<String>,
	pub region: Option<String>,
	pub ssh_port: Option<u16>,
	pub gort_port: Option<u16>,
	pub localproxy: Option<PathBuf>,
	pub log_level: Option<String>,
	pub log_format: Option<String>,
	pub config_file: Option<PathBuf>,
}

/// CLI override source.
pub struct CliSource {
	overrides: CliOverrides,
}

impl CliSource {
	pub fn new(overrides: CliOverrides) -> Self {
		Self { overrides }
	}
}

impl ConfigSource for CliSource {
	fn name(&self) -> &'static str {
		"cli"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Cli
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading CLI overrides");
		let mut layer = ConfigLayer::default();
		let o = &self.overrides;

		if o.profile.is_some() || o.region.is_some() {
			let aws = layer.aws_mut();
			aws.profile = o.profile.clone();
			aws.region = o.region.clone();
		}
		if o.ssh_port.is_some() || o.gort_port.is_some() || o.localproxy.is_some() {
			let proxy = layer.proxy_mut();
			proxy.ssh_port = o.ssh_port;
			proxy.gort_port = o.gort_port;
			proxy.executable = o.localproxy.clone();
		}
		if o.log_level.is_some() || o.log_format.is_some() {
			let logging = layer.logging_mut();
			logging.level = o.log_level.clone();
			logging.format = o.log_format.clone();
		}

		Ok(layer)
	}
}
