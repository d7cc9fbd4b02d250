// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceIdError {
	#[error("device id cannot be empty")]
	Empty,
}

/// Identifier of a device (an IoT thing name).
///
/// Always stored upper-cased so every backend lookup for one logical device
/// uses the same spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
	pub fn new(raw: &str) -> Result<Self, DeviceIdError> {
		let trimmed = raw.trim();
		if trimmed.is_empty() {
			return Err(DeviceIdError::Empty);
		}
		Ok(Self(trimmed.to_uppercase()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl FromStr for DeviceId {
	type Err = DeviceIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

impl fmt::Display for DeviceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for DeviceId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
