// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::device::DeviceId;
use crate::tunnel::TunnelId;

/// Failure of a single backend call.
#[derive(Error, Debug)]
pub enum BackendError {
	#[error("authentication failed: {hint}")]
	Auth { hint: String },

	#[error("{operation} failed: {message}")]
	Service {
		operation: &'static str,
		message: String,
	},

	#[error("{operation} response is missing {field}")]
	MissingField {
		operation: &'static str,
		field: &'static str,
	},

	#[error("invalid request: {0}")]
	InvalidRequest(String),
}

impl BackendError {
	pub fn service(operation: &'static str, message: impl Into<String>) -> Self {
		Self::Service {
			operation,
			message: message.into(),
		}
	}
}

#[derive(Error, Debug)]
pub enum ReconcileError {
	#[error(
		"device {device} has {}; only one open tunnel is allowed",
		describe_open(.open)
	)]
	Inconsistent { device: DeviceId, open: Vec<TunnelId> },

	#[error("no source token was obtained for device {device}")]
	NoSourceToken { device: DeviceId },

	#[error(transparent)]
	Backend(#[from] BackendError),
}

#[derive(Error, Debug)]
pub enum LaunchError {
	#[error("failed to start {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("localproxy exited with {}", describe_code(.code))]
	NonZeroExit { code: Option<i32> },
}

impl LaunchError {
	/// Exit code this program should terminate with.
	pub fn exit_code(&self) -> i32 {
		match self {
			LaunchError::NonZeroExit { code: Some(code) } if *code != 0 => *code,
			_ => 1,
		}
	}
}

#[derive(Error, Debug)]
pub enum ConnectError {
	#[error(transparent)]
	Reconcile(#[from] ReconcileError),

	#[error(transparent)]
	Launch(#[from] LaunchError),
}

fn describe_open(ids: &[TunnelId]) -> String {
	let joined = ids
		.iter()
		.map(TunnelId::as_str)
		.collect::<Vec<_>>()
		.join(", ");
	format!("{} open tunnels ({joined})", ids.len())
}

fn describe_code(code: &Option<i32>) -> String {
	match code {
		Some(code) => format!("exit code {code}"),
		None => "no exit code (terminated by signal)".to_string(),
	}
}
