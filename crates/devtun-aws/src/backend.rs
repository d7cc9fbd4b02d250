// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use aws_sdk_iotsecuretunneling::error::{DisplayErrorContext, SdkError};
use aws_sdk_iotsecuretunneling::types as aws;
use aws_sdk_iotsecuretunneling::Client;
use devtun_core::{
	BackendError, ClientMode, DestinationConfig, DeviceId, OpenedTunnel, TokenPair, TunnelBackend,
	TunnelId, TunnelStatus, TunnelSummary,
};
use tracing::{debug, instrument, warn};

pub struct AwsTunnelBackend {
	client: Client,
	profile: Option<String>,
}

impl AwsTunnelBackend {
	pub fn new(client: Client, profile: Option<String>) -> Self {
		Self { client, profile }
	}

	fn sdk_error<E>(&self, operation: &'static str, err: SdkError<E>) -> BackendError
	where
		E: std::error::Error + Send + Sync + 'static,
	{
		let detail = DisplayErrorContext(&err).to_string();
		match err {
			SdkError::DispatchFailure(_) => BackendError::Auth {
				hint: format!(
					"{operation} could not be dispatched ({detail}); {}",
					auth_hint(self.profile.as_deref())
				),
			},
			_ => BackendError::service(operation, detail),
		}
	}
}

/// Suggestion printed with authentication failures.
pub(crate) fn auth_hint(profile: Option<&str>) -> String {
	match profile {
		Some(profile) => format!("if the SSO session expired run `aws sso login --profile {profile}`"),
		None => "if the SSO session expired run `aws sso login`".to_string(),
	}
}

fn status_from_aws(status: &aws::TunnelStatus) -> Option<TunnelStatus> {
	match status {
		aws::TunnelStatus::Open => Some(TunnelStatus::Open),
		aws::TunnelStatus::Closed => Some(TunnelStatus::Closed),
		_ => None,
	}
}

fn client_mode_to_aws(mode: ClientMode) -> aws::ClientMode {
	match mode {
		ClientMode::Source => aws::ClientMode::Source,
		ClientMode::Destination => aws::ClientMode::Destination,
		ClientMode::All => aws::ClientMode::All,
	}
}

fn destination_to_aws(destination: &DestinationConfig) -> Result<aws::DestinationConfig, BackendError> {
	let mut builder = aws::DestinationConfig::builder().thing_name(destination.device.as_str());
	for service in &destination.services {
		builder = builder.services(service.name());
	}
	builder
		.build()
		.map_err(|e| BackendError::InvalidRequest(e.to_string()))
}

fn required<'a>(
	value: Option<&'a str>,
	operation: &'static str,
	field: &'static str,
) -> Result<&'a str, BackendError> {
	value.ok_or(BackendError::MissingField { operation, field })
}

#[async_trait]
impl TunnelBackend for AwsTunnelBackend {
	#[instrument(skip_all, fields(device = %device))]
	async fn list_tunnels(&self, device: &DeviceId) -> Result<Vec<TunnelSummary>, BackendError> {
		let mut summaries = Vec::new();
		let mut next_token: Option<String> = None;

		loop {
			let output = self
				.client
				.list_tunnels()
				.thing_name(device.as_str())
				.set_next_token(next_token.take())
				.send()
				.await
				.map_err(|e| self.sdk_error("ListTunnels", e))?;

			for summary in output.tunnel_summaries.unwrap_or_default() {
				let Some(tunnel_id) = summary.tunnel_id else {
					warn!("skipping tunnel summary without an id");
					continue;
				};
				summaries.push(TunnelSummary {
					tunnel_id: TunnelId::new(tunnel_id),
					status: summary.status.as_ref().and_then(status_from_aws),
				});
			}

			match output.next_token {
				Some(token) if !token.is_empty() => next_token = Some(token),
				_ => break,
			}
		}

		debug!(count = summaries.len(), "listed tunnels");
		Ok(summaries)
	}

	#[instrument(skip_all, fields(device = %destination.device))]
	async fn open_tunnel(
		&self,
		destination: &DestinationConfig,
	) -> Result<OpenedTunnel, BackendError> {
		const OP: &str = "OpenTunnel";

		let output = self
			.client
			.open_tunnel()
			.destination_config(destination_to_aws(destination)?)
			.send()
			.await
			.map_err(|e| self.sdk_error(OP, e))?;

		Ok(OpenedTunnel {
			tunnel_id: TunnelId::new(required(output.tunnel_id(), OP, "tunnelId")?),
			tokens: TokenPair::new(
				required(output.source_access_token(), OP, "sourceAccessToken")?,
				required(output.destination_access_token(), OP, "destinationAccessToken")?,
			),
		})
	}

	#[instrument(skip_all, fields(tunnel_id = %tunnel_id, client_mode = ?client_mode))]
	async fn rotate_access_tokens(
		&self,
		tunnel_id: &TunnelId,
		client_mode: ClientMode,
		destination: &DestinationConfig,
	) -> Result<TokenPair, BackendError> {
		const OP: &str = "RotateTunnelAccessToken";

		let output = self
			.client
			.rotate_tunnel_access_token()
			.tunnel_id(tunnel_id.as_str())
			.client_mode(client_mode_to_aws(client_mode))
			.destination_config(destination_to_aws(destination)?)
			.send()
			.await
			.map_err(|e| self.sdk_error(OP, e))?;

		Ok(TokenPair::new(
			required(output.source_access_token(), OP, "sourceAccessToken")?,
			required(output.destination_access_token(), OP, "destinationAccessToken")?,
		))
	}

	#[instrument(skip_all, fields(tunnel_id = %tunnel_id, delete = delete))]
	async fn close_tunnel(&self, tunnel_id: &TunnelId, delete: bool) -> Result<(), BackendError> {
		self
			.client
			.close_tunnel()
			.tunnel_id(tunnel_id.as_str())
			.delete(delete)
			.send()
			.await
			.map_err(|e| self.sdk_error("CloseTunnel", e))?;
		Ok(())
	}
}
