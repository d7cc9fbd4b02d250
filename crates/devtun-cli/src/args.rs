// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Command-line surface.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use devtun_config::CliOverrides;
use devtun_core::DeviceId;

/// Single-dash flags longer than one character, and the long flag each one
/// stands for.
const LEGACY_FLAGS: &[(&str, &str)] = &[
	("-ro", "--rotate-device-tokens"),
	("-con", "--connect-device"),
	("-sp", "--ssh-port"),
	("-gp", "--gort-port"),
];

#[derive(Debug, Parser)]
#[command(
	name = "devtun",
	version,
	about = "Open, rotate and connect to AWS IoT secure tunnels for field devices",
	long_about = None
)]
#[command(group(ArgGroup::new("action").args(["create", "status", "rotate", "connect"])))]
pub struct Cli {
	/// Open a tunnel for DEVICE unless one already exists
	#[arg(
		short = 'c',
		long = "create-device-tunnel",
		alias = "create_device_tunnel",
		value_name = "DEVICE"
	)]
	pub create: Option<DeviceId>,

	/// Report the tunnel state of DEVICE, deleting closed tunnels
	#[arg(
		short = 'g',
		long = "get-device-tunnel-status",
		alias = "get_device_tunnel_status",
		value_name = "DEVICE"
	)]
	pub status: Option<DeviceId>,

	/// Rotate the access tokens of the open tunnel of DEVICE [short: -ro]
	#[arg(
		long = "rotate-device-tokens",
		alias = "rotate_device_tokens",
		value_name = "DEVICE"
	)]
	pub rotate: Option<DeviceId>,

	/// Make sure DEVICE has an open tunnel and run localproxy against it [short: -con]
	#[arg(long = "connect-device", alias = "connect_device", value_name = "DEVICE")]
	pub connect: Option<DeviceId>,

	/// Named AWS credential profile
	#[arg(short = 'p', long)]
	pub profile: Option<String>,

	/// AWS region [default: eu-west-1]
	#[arg(short = 'r', long)]
	pub region: Option<String>,

	/// Local port for SSH [default: 2222] [short: -sp]
	#[arg(
		long = "ssh-port",
		alias = "ssh_port",
		value_name = "PORT",
		value_parser = clap::value_parser!(u16).range(1..)
	)]
	pub ssh_port: Option<u16>,

	/// Local port for GORT [default: 5555] [short: -gp]
	#[arg(
		long = "gort-port",
		alias = "gort_port",
		value_name = "PORT",
		value_parser = clap::value_parser!(u16).range(1..)
	)]
	pub gort_port: Option<u16>,

	/// Extra config file, applied over the system and user files
	#[arg(long, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Path to the localproxy executable
	#[arg(long, value_name = "PATH")]
	pub localproxy: Option<PathBuf>,

	/// Log level (error, warn, info, debug, trace)
	#[arg(long, value_name = "LEVEL")]
	pub log_level: Option<String>,

	/// Write logs as JSON
	#[arg(long)]
	pub json_logs: bool,

	/// Print minted access tokens in plain text
	#[arg(long)]
	pub show_tokens: bool,
}

/// The one thing an invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
	Create(DeviceId),
	Status(DeviceId),
	Rotate(DeviceId),
	Connect(DeviceId),
}

impl Action {
	pub fn device(&self) -> &DeviceId {
		match self {
			Action::Create(d) | Action::Status(d) | Action::Rotate(d) | Action::Connect(d) => d,
		}
	}
}

impl Cli {
	/// Parse `args` after rewriting the legacy multi-character short flags.
	pub fn parse_args<I, T>(args: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<OsString>,
	{
		Self::parse_from(expand_legacy_flags(args))
	}

	pub fn action(&self) -> Option<Action> {
		if let Some(device) = &self.create {
			Some(Action::Create(device.clone()))
		} else if let Some(device) = &self.status {
			Some(Action::Status(device.clone()))
		} else if let Some(device) = &self.rotate {
			Some(Action::Rotate(device.clone()))
		} else {
			self.connect.clone().map(Action::Connect)
		}
	}

	pub fn overrides(&self) -> CliOverrides {
		CliOverrides {
			profile: self.profile.clone(),
			region: self.region.clone(),
			ssh_port: self.ssh_port,
			gort_port: self.gort_port,
			localproxy: self.localproxy.clone(),
			log_level: self.log_level.clone(),
			log_format: self.json_logs.then(|| "json".to_string()),
			config_file: self.config.clone(),
		}
	}
}

/// Rewrite `-ro`, `-con`, `-sp` and `-gp` (also `-sp=2222`) to their long
/// forms. Arguments after `--` are left alone.
pub fn expand_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
	I: IntoIterator<Item = T>,
	T: Into<OsString>,
{
	let mut out = Vec::new();
	let mut passthrough = false;

	for arg in args.into_iter().map(Into::into) {
		if passthrough {
			out.push(arg);
			continue;
		}
		let Some(text) = arg.to_str() else {
			out.push(arg);
			continue;
		};
		if text == "--" {
			passthrough = true;
			out.push(arg);
			continue;
		}
		out.push(rewrite_flag(text).map(OsString::from).unwrap_or(arg));
	}

	out
}

fn rewrite_flag(arg: &str) -> Option<String> {
	LEGACY_FLAGS.iter().find_map(|(short, long)| {
		if arg == *short {
			Some(long.to_string())
		} else {
			arg
				.strip_prefix(short)
				.and_then(|rest| rest.strip_prefix('='))
				.map(|value| format!("{long}={value}"))
		}
	})
}
