// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! XDG Base Directory compliant path resolution.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::ConfigError;

const SYSTEM_CONFIG_FILE: &str = "/etc/devtun/config.toml";

/// Resolved config file locations for devtun.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathsConfig {
	/// User config file: ~/.config/devtun/config.toml
	pub user_config_file: PathBuf,
	/// System config file: /etc/devtun/config.toml
	pub system_config_file: PathBuf,
}

impl Default for PathsConfig {
	fn default() -> Self {
		Self {
			user_config_file: PathBuf::from("~/.config/devtun/config.toml"),
			system_config_file: PathBuf::from(SYSTEM_CONFIG_FILE),
		}
	}
}

/// Resolve paths from `XDG_CONFIG_HOME`, falling back to `~/.config`.
pub fn resolve_xdg_paths() -> Result<PathsConfig, ConfigError> {
	resolve_paths_from(std::env::var_os("XDG_CONFIG_HOME"), dirs::home_dir())
}

pub(crate) fn resolve_paths_from(
	config_home: Option<OsString>,
	home: Option<PathBuf>,
) -> Result<PathsConfig, ConfigError> {
	let config_home = match config_home.filter(|v| !v.is_empty()) {
		Some(dir) => PathBuf::from(dir),
		None => home.ok_or(ConfigError::HomeDirNotFound)?.join(".config"),
	};

	tracing::debug!(config_home = %config_home.display(), "resolved XDG paths");

	Ok(PathsConfig {
		user_config_file: config_home.join("devtun/config.toml"),
		system_config_file: PathBuf::from(SYSTEM_CONFIG_FILE),
	})
}
