// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use devtun_config::{LogFormat, LogLevel, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const OWN_TARGETS: &[&str] = &["devtun", "devtun_core", "devtun_aws", "devtun_config"];

/// Directives used when `RUST_LOG` is unset: `level` for our crates and
/// `warn` for everything else.
fn default_directives(level: LogLevel) -> String {
	let mut directives = String::from("warn");
	for target in OWN_TARGETS {
		directives.push_str(&format!(",{target}={level}"));
	}
	directives
}

/// Install the global subscriber. Logs go to stderr so stdout carries only
/// command output and the proxy's own output.
pub fn init_tracing(logging: &LoggingConfig) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(default_directives(logging.level)));

	match logging.format {
		LogFormat::Json => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().json().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Compact => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().compact().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Pretty => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().with_writer(std::io::stderr))
				.init();
		}
	}
}
