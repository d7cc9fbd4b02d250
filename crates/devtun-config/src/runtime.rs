// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime configuration types with resolved defaults.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;

use devtun_core::{ServiceBinding, DEFAULT_EXECUTABLE};

use crate::layer::*;
use crate::paths::PathsConfig;
use crate::ConfigError;

pub const DEFAULT_REGION: &str = "eu-west-1";
pub const DEFAULT_CERT_DIR: &str = "certs";

/// The final, validated configuration for devtun.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevtunConfig {
	pub aws: AwsConfig,
	pub proxy: ProxyConfig,
	pub logging: LoggingConfig,
	pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsConfig {
	/// Named credential profile; `None` uses the default credential chain.
	pub profile: Option<String>,
	/// Always lowercase.
	pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
	/// Bare names are looked up on `PATH` when the proxy is launched.
	pub executable: PathBuf,
	pub bind_address: IpAddr,
	pub cert_dir: PathBuf,
	pub ssh_port: u16,
	pub gort_port: u16,
	pub token_via_env: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoggingConfig {
	pub level: LogLevel,
	pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
	Error,
	Warn,
	#[default]
	Info,
	Debug,
	Trace,
}

impl LogLevel {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Error => "error",
			Self::Warn => "warn",
			Self::Info => "info",
			Self::Debug => "debug",
			Self::Trace => "trace",
		}
	}
}

impl fmt::Display for LogLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for LogLevel {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"error" => Ok(Self::Error),
			"warn" | "warning" => Ok(Self::Warn),
			"info" => Ok(Self::Info),
			"debug" => Ok(Self::Debug),
			"trace" => Ok(Self::Trace),
			other => Err(ConfigError::invalid_value(
				"logging.level",
				format!("unknown level '{other}' (expected error, warn, info, debug or trace)"),
			)),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
	#[default]
	Pretty,
	Compact,
	Json,
}

impl FromStr for LogFormat {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"pretty" => Ok(Self::Pretty),
			"compact" => Ok(Self::Compact),
			"json" => Ok(Self::Json),
			other => Err(ConfigError::invalid_value(
				"logging.format",
				format!("unknown format '{other}' (expected pretty, compact or json)"),
			)),
		}
	}
}

impl Default for AwsConfig {
	fn default() -> Self {
		Self {
			profile: None,
			region: DEFAULT_REGION.to_string(),
		}
	}
}

impl Default for ProxyConfig {
	fn default() -> Self {
		Self {
			executable: PathBuf::from(DEFAULT_EXECUTABLE),
			bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
			cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
			ssh_port: ServiceBinding::DEFAULT_SSH_PORT,
			gort_port: ServiceBinding::DEFAULT_GORT_PORT,
			token_via_env: false,
		}
	}
}

impl DevtunConfig {
	/// Build runtime config from a merged layer and paths.
	pub fn from_layer(layer: ConfigLayer, paths: PathsConfig) -> Result<Self, ConfigError> {
		Ok(Self {
			aws: build_aws_config(layer.aws),
			proxy: build_proxy_config(layer.proxy)?,
			logging: build_logging_config(layer.logging)?,
			paths,
		})
	}
}

fn build_aws_config(layer: Option<AwsLayer>) -> AwsConfig {
	let layer = layer.unwrap_or_default();
	AwsConfig {
		profile: layer.profile.filter(|p| !p.trim().is_empty()),
		region: layer
			.region
			.map(|r| r.trim().to_lowercase())
			.unwrap_or_else(|| DEFAULT_REGION.to_string()),
	}
}

fn build_proxy_config(layer: Option<ProxyLayer>) -> Result<ProxyConfig, ConfigError> {
	let layer = layer.unwrap_or_default();
	let defaults = ProxyConfig::default();

	let bind_address = match layer.bind_address {
		Some(addr) => addr.trim().parse().map_err(|_| {
			ConfigError::invalid_value("proxy.bind_address", format!("'{addr}' is not an IP address"))
		})?,
		None => defaults.bind_address,
	};

	Ok(ProxyConfig {
		executable: layer.executable.unwrap_or(defaults.executable),
		bind_address,
		cert_dir: layer.cert_dir.unwrap_or(defaults.cert_dir),
		ssh_port: layer.ssh_port.unwrap_or(defaults.ssh_port),
		gort_port: layer.gort_port.unwrap_or(defaults.gort_port),
		token_via_env: layer.token_via_env.unwrap_or(defaults.token_via_env),
	})
}

fn build_logging_config(layer: Option<LoggingLayer>) -> Result<LoggingConfig, ConfigError> {
	let layer = layer.unwrap_or_default();
	Ok(LoggingConfig {
		level: layer.level.as_deref().map(str::parse::<LogLevel>).transpose()?.unwrap_or_default(),
		format: layer.format.as_deref().map(str::parse::<LogFormat>).transpose()?.unwrap_or_default(),
	})
}
