// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tunnel access tokens.
//!
//! An [`AccessToken`] authorizes one client edge of a tunnel. Tokens are
//! minted by the backend on open or rotate and handed straight to the
//! forwarding process, so they:
//!
//! - never appear in logs (redacted `Debug`/`Display`)
//! - are zeroized from memory on drop
//! - require an explicit [`AccessToken::expose`] call to read
//!
//! ```
//! use devtun_core::AccessToken;
//!
//! let token = AccessToken::new("AQGAAXi...");
//! assert_eq!(format!("{token}"), "[REDACTED]");
//! assert_eq!(token.expose(), "AQGAAXi...");
//! ```

use std::fmt;
use zeroize::Zeroize;

/// The redaction placeholder used in all output.
pub const REDACTED: &str = "[REDACTED]";

#[derive(Zeroize)]
#[zeroize(drop)]
pub struct AccessToken {
	inner: String,
}

impl AccessToken {
	pub fn new(value: impl Into<String>) -> Self {
		Self {
			inner: value.into(),
		}
	}

	/// Read the raw token.
	///
	/// Only the launcher and explicit `--show-tokens` output should call this.
	pub fn expose(&self) -> &str {
		&self.inner
	}
}

impl Clone for AccessToken {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl PartialEq for AccessToken {
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl Eq for AccessToken {}

impl fmt::Debug for AccessToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("AccessToken").field(&REDACTED).finish()
	}
}

impl fmt::Display for AccessToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

/// Source and destination tokens minted together by open or rotate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
	pub source: AccessToken,
	pub destination: AccessToken,
}

impl TokenPair {
	pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
		Self {
			source: AccessToken::new(source),
			destination: AccessToken::new(destination),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn debug_is_redacted() {
		let token = AccessToken::new("super-secret-token");
		let output = format!("{token:?}");
		assert!(!output.contains("super-secret-token"));
		assert!(output.contains(REDACTED));
	}

	#[test]
	fn pair_debug_hides_both_tokens() {
		let pair = TokenPair::new("src-secret", "dst-secret");
		let output = format!("{pair:?}");
		assert!(!output.contains("src-secret"));
		assert!(!output.contains("dst-secret"));
	}

	#[test]
	fn expose_returns_inner_value() {
		let pair = TokenPair::new("src", "dst");
		assert_eq!(pair.source.expose(), "src");
		assert_eq!(pair.destination.expose(), "dst");
	}
}
