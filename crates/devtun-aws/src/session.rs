// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_iotsecuretunneling::Client;
use devtun_core::BackendError;
use tracing::{debug, error, info, instrument};

use crate::backend::{auth_hint, AwsTunnelBackend};

/// Region and credential profile shared by every backend call of one run.
#[derive(Debug, Clone)]
pub struct AwsSession {
	client: Client,
	region: String,
	profile: Option<String>,
}

impl AwsSession {
	/// Load the SDK configuration for `profile` and `region`.
	///
	/// Credentials are resolved once up front. A failure is logged and the
	/// session is returned anyway; later backend calls then fail on their own.
	#[instrument(skip_all, fields(region = %region, profile = ?profile))]
	pub async fn establish(profile: Option<&str>, region: &str) -> Self {
		let mut loader =
			aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
		if let Some(profile) = profile {
			loader = loader.profile_name(profile);
		}
		let config = loader.load().await;

		match check_credentials(&config, profile).await {
			Ok(()) => info!("AWS session established"),
			Err(e) => error!(error = %e, "failed to establish AWS session"),
		}

		Self {
			client: Client::new(&config),
			region: region.to_string(),
			profile: profile.map(str::to_string),
		}
	}

	pub fn client(&self) -> &Client {
		&self.client
	}

	pub fn region(&self) -> &str {
		&self.region
	}

	pub fn profile(&self) -> Option<&str> {
		self.profile.as_deref()
	}

	pub fn backend(&self) -> AwsTunnelBackend {
		AwsTunnelBackend::new(self.client.clone(), self.profile.clone())
	}
}

async fn check_credentials(config: &SdkConfig, profile: Option<&str>) -> Result<(), BackendError> {
	let Some(provider) = config.credentials_provider() else {
		return Err(BackendError::Auth {
			hint: format!("no credentials provider is configured; {}", auth_hint(profile)),
		});
	};

	provider
		.provide_credentials()
		.await
		.map_err(|e| BackendError::Auth {
			hint: format!("{e}; {}", auth_hint(profile)),
		})?;
	debug!("resolved AWS credentials");
	Ok(())
}
