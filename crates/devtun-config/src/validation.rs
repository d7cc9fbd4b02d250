// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration validation rules.

use crate::runtime::DevtunConfig;
use crate::ConfigError;

/// Validate the configuration.
pub fn validate_config(config: &DevtunConfig) -> Result<(), ConfigError> {
	validate_aws(config)?;
	validate_proxy(config)?;

	Ok(())
}

fn validate_aws(config: &DevtunConfig) -> Result<(), ConfigError> {
	if config.aws.region.trim().is_empty() {
		return Err(ConfigError::invalid_value("aws.region", "cannot be empty"));
	}

	Ok(())
}

fn validate_proxy(config: &DevtunConfig) -> Result<(), ConfigError> {
	let proxy = &config.proxy;

	if proxy.ssh_port == 0 {
		return Err(ConfigError::invalid_value("proxy.ssh_port", "must be between 1 and 65535"));
	}
	if proxy.gort_port == 0 {
		return Err(ConfigError::invalid_value("proxy.gort_port", "must be between 1 and 65535"));
	}
	if proxy.ssh_port == proxy.gort_port {
		return Err(ConfigError::invalid_value(
			"proxy.gort_port",
			format!("must differ from proxy.ssh_port ({})", proxy.ssh_port),
		));
	}
	if proxy.executable.as_os_str().is_empty() {
		return Err(ConfigError::invalid_value("proxy.executable", "cannot be empty"));
	}
	if proxy.cert_dir.as_os_str().is_empty() {
		return Err(ConfigError::invalid_value("proxy.cert_dir", "cannot be empty"));
	}

	Ok(())
}
