// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration registry - manages sources and merges layers.

use tracing::{debug, info};

use crate::layer::ConfigLayer;
use crate::paths::PathsConfig;
use crate::runtime::DevtunConfig;
use crate::sources::ConfigSource;
use crate::validation::validate_config;
use crate::ConfigError;

/// Registry that manages configuration sources and merges them.
#[derive(Default)]
pub struct ConfigRegistry {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, source: Box<dyn ConfigSource>) {
		debug!(source = source.name(), precedence = ?source.precedence(), "registering config source");
		self.sources.push(source);
	}

	/// Load configuration from all sources, merge, and validate.
	///
	/// Sources are merged lowest precedence first. The first source that
	/// fails aborts the load, so a broken file is never silently ignored.
	pub fn load(&self, paths: PathsConfig) -> Result<DevtunConfig, ConfigError> {
		let mut sorted_sources: Vec<_> = self.sources.iter().collect();
		sorted_sources.sort_by_key(|s| s.precedence());

		let mut merged = ConfigLayer::default();
		for source in &sorted_sources {
			let layer = source.load()?;
			debug!(source = source.name(), "merging config layer");
			merged.merge(layer);
		}

		let config = DevtunConfig::from_layer(merged, paths)?;
		validate_config(&config)?;

		debug!(
			region = %config.aws.region,
			profile = ?config.aws.profile,
			ssh_port = config.proxy.ssh_port,
			gort_port = config.proxy.gort_port,
			"configuration loaded"
		);
		info!(source_count = sorted_sources.len(), "configuration loaded from sources");

		Ok(config)
	}

	pub fn source_count(&self) -> usize {
		self.sources.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sources::{CliOverrides, CliSource, DefaultsSource, EnvSource, FileSource, Precedence};
	use std::path::PathBuf;

	struct RegionSource {
		precedence: Precedence,
		region: &'static str,
	}

	impl ConfigSource for RegionSource {
		fn name(&self) -> &'static str {
			"region"
		}
		fn precedence(&self) -> Precedence {
			self.precedence
		}
		fn load(&self) -> Result<ConfigLayer, ConfigError> {
			let mut layer = ConfigLayer::default();
			layer.aws_mut().region = Some(self.region.to_string());
			Ok(layer)
		}
	}

	fn paths_in(dir: &std::path::Path) -> PathsConfig {
		PathsConfig {
			user_config_file: dir.join("user.toml"),
			system_config_file: dir.join("system.toml"),
		}
	}

	#[test]
	fn test_registry_loads_with_defaults() {
		let mut registry = ConfigRegistry::new();
		registry.register(Box::new(DefaultsSource));
		assert_eq!(registry.source_count(), 1);

		let config = registry.load(PathsConfig::default()).unwrap();
		assert_eq!(config.aws.region, "eu-west-1");
	}

	#[test]
	fn test_precedence_merge_order() {
		let mut registry = ConfigRegistry::new();

		// Registered out of order; the registry sorts.
		registry.register(Box::new(RegionSource {
			precedence: Precedence::Cli,
			region: "us-east-1",
		}));
		registry.register(Box::new(RegionSource {
			precedence: Precedence::UserFile,
			region: "eu-central-1",
		}));

		let config = registry.load(PathsConfig::default()).unwrap();
		assert_eq!(config.aws.region, "us-east-1");
	}

	#[test]
	fn test_full_stack() {
		let dir = tempfile::tempdir().unwrap();
		let paths = paths_in(dir.path());
		std::fs::write(
			&paths.system_config_file,
			"[aws]\nprofile = \"system\"\n[proxy]\ncert_dir = \"/etc/devtun/certs\"\n",
		)
		.unwrap();
		std::fs::write(
			&paths.user_config_file,
			"[aws]\nprofile = \"iotmgmt_prod\"\n[proxy]\nssh_port = 2022\n",
		)
		.unwrap();
		let explicit = dir.path().join("explicit.toml");
		std::fs::write(&explicit, "[proxy]\ngort_port = 5600\nssh_port = 2100\n").unwrap();

		let mut registry = ConfigRegistry::new();
		registry.register(Box::new(DefaultsSource));
		registry.register(Box::new(FileSource::system(&paths)));
		registry.register(Box::new(FileSource::user(&paths)));
		registry.register(Box::new(FileSource::explicit(explicit)));
		registry.register(Box::new(EnvSource::from_vars([("DEVTUN_GORT_PORT", "5700")])));
		registry.register(Box::new(CliSource::new(CliOverrides {
			region: Some("US-WEST-2".to_string()),
			..Default::default()
		})));

		let config = registry.load(paths).unwrap();
		assert_eq!(config.aws.profile.as_deref(), Some("iotmgmt_prod"));
		assert_eq!(config.aws.region, "us-west-2");
		assert_eq!(config.proxy.cert_dir, PathBuf::from("/etc/devtun/certs"));
		assert_eq!(config.proxy.ssh_port, 2100);
		assert_eq!(config.proxy.gort_port, 5700);
	}

	#[test]
	fn test_broken_user_file_fails() {
		let dir = tempfile::tempdir().unwrap();
		let paths = paths_in(dir.path());
		std::fs::write(&paths.user_config_file, "this is not toml").unwrap();

		let mut registry = ConfigRegistry::new();
		registry.register(Box::new(FileSource::user(&paths)));

		assert!(matches!(
			registry.load(paths),
			Err(ConfigError::TomlParse { .. })
		));
	}

	#[test]
	fn test_mistyped_key_in_user_file_fails() {
		let dir = tempfile::tempdir().unwrap();
		let paths = paths_in(dir.path());
		std::fs::write(
			&paths.user_config_file,
			"[aws]\nprofile = \"iotmgmt_prod\"\nregion = \"us-east-1\"\n[proxy]\nssh_prot = 2022\n",
		)
		.unwrap();

		let mut registry = ConfigRegistry::new();
		registry.register(Box::new(DefaultsSource));
		registry.register(Box::new(FileSource::user(&paths)));

		let err = registry.load(paths.clone()).unwrap_err();
		match &err {
			ConfigError::TomlParse { path, .. } => assert_eq!(path, &paths.user_config_file),
			other => panic!("expected a parse error, got {other:?}"),
		}
		assert!(err.to_string().contains("ssh_prot"));
	}

	#[test]
	fn test_missing_user_and_system_files_are_skipped() {
		let dir = tempfile::tempdir().unwrap();
		let paths = paths_in(dir.path());

		let mut registry = ConfigRegistry::new();
		registry.register(Box::new(FileSource::system(&paths)));
		registry.register(Box::new(FileSource::user(&paths)));

		let config = registry.load(paths).unwrap();
		assert_eq!(config.proxy.ssh_port, 2222);
	}

	#[test]
	fn test_missing_explicit_file_fails() {
		let mut registry = ConfigRegistry::new();
		registry.register(Box::new(FileSource::explicit(PathBuf::from(
			"/nonexistent/devtun.toml",
		))));

		assert!(matches!(
			registry.load(PathsConfig::default()),
			Err(ConfigError::FileNotFound(_))
		));
	}

	#[test]
	fn test_invalid_result_fails_validation() {
		let mut registry = ConfigRegistry::new();
		registry.register(Box::new(CliSource::new(CliOverrides {
			ssh_port: Some(4000),
			gort_port: Some(4000),
			..Default::default()
		})));

		assert!(matches!(
			registry.load(PathsConfig::default()),
			Err(ConfigError::InvalidValue { .. })
		));
	}
}
