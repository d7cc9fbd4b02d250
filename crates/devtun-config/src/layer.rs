// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration layer for merging from multiple sources.

use serde::Deserialize;
use std::path::PathBuf;

/// Partial configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
	#[serde(default)]
	pub aws: Option<AwsLayer>,
	#[serde(default)]
	pub proxy: Option<ProxyLayer>,
	#[serde(default)]
	pub logging: Option<LoggingLayer>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsLayer {
	#[serde(default)]
	pub profile: Option<String>,
	#[serde(default)]
	pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyLayer {
	#[serde(default)]
	pub executable: Option<PathBuf>,
	#[serde(default)]
	pub bind_address: Option<String>,
	#[serde(default)]
	pub cert_dir: Option<PathBuf>,
	#[serde(default)]
	pub ssh_port: Option<u16>,
	#[serde(default)]
	pub gort_port: Option<u16>,
	#[serde(default)]
	pub token_via_env: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub format: Option<String>,
}

impl ConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ConfigLayer) {
		merge_option(&mut self.aws, other.aws, AwsLayer::merge);
		merge_option(&mut self.proxy, other.proxy, ProxyLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingLayer::merge);
	}

	pub fn aws_mut(&mut self) -> &mut AwsLayer {
		self.aws.get_or_insert_with(AwsLayer::default)
	}

	pub fn proxy_mut(&mut self) -> &mut ProxyLayer {
		self.proxy.get_or_insert_with(ProxyLayer::default)
	}

	pub fn logging_mut(&mut self) -> &mut LoggingLayer {
		self.logging.get_or_insert_with(LoggingLayer::default)
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

fn overwrite<T>(target: &mut Option<T>, source: Option<T>) {
	if source.is_some() {
		*target = source;
	}
}

impl AwsLayer {
	fn merge(&mut self, other: AwsLayer) {
		overwrite(&mut self.profile, other.profile);
		overwrite(&mut self.region, other.region);
	}
}

impl ProxyLayer {
	fn merge(&mut self, other: ProxyLayer) {
		overwrite(&mut self.executable, other.executable);
		overwrite(&mut self.bind_address, other.bind_address);
		overwrite(&mut self.cert_dir, other.cert_dir);
		overwrite(&mut self.ssh_port, other.ssh_port);
		overwrite(&mut self.gort_port, other.gort_port);
		overwrite(&mut self.token_via_env, other.token_via_env);
	}
}

impl LoggingLayer {
	fn merge(&mut self, other: LoggingLayer) {
		overwrite(&mut self.level, other.level);
		overwrite(&mut self.format, other.format);
	}
}
