// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for devtun.
//!
//! Settings are merged from built-in defaults, `/etc/devtun/config.toml`,
//! the user's XDG config file, an optional `--config` file, `DEVTUN_*`
//! environment variables and command-line flags, in that order.

pub mod error;
pub mod layer;
pub mod paths;
pub mod registry;
pub mod runtime;
pub mod sources;
pub mod validation;

pub use error::ConfigError;
pub use layer::ConfigLayer;
pub use paths::PathsConfig;
pub use registry::ConfigRegistry;
pub use runtime::{AwsConfig, DevtunConfig, LogFormat, LogLevel, LoggingConfig, ProxyConfig};
pub use sources::{CliOverrides, ConfigSource, Precedence};

/// Load configuration from every source, with `cli` on top.
pub fn load_config_with_cli(cli: CliOverrides) -> Result<DevtunConfig, ConfigError> {
	let paths = paths::resolve_xdg_paths()?;

	let mut registry = ConfigRegistry::new();
	registry.register(Box::new(sources::DefaultsSource));
	registry.register(Box::new(sources::FileSource::system(&paths)));
	registry.register(Box::new(sources::FileSource::user(&paths)));
	if let Some(path) = cli.config_file.clone() {
		registry.register(Box::new(sources::FileSource::explicit(path)));
	}
	registry.register(Box::new(sources::EnvSource::from_process()));
	registry.register(Box::new(sources::CliSource::new(cli)));

	registry.load(paths)
}
