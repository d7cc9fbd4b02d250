// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::device::DeviceId;
use crate::error::BackendError;
use crate::token::TokenPair;
use crate::tunnel::{ClientMode, DestinationConfig, OpenedTunnel, TunnelId, TunnelSummary};

/// Remote tunnel-management operations.
///
/// Implementations own transport, authentication and pagination; every call
/// either succeeds or returns a [`BackendError`]. No retries are expected.
#[async_trait]
pub trait TunnelBackend: Send + Sync {
	/// Every tunnel recorded for `device`, whatever its status.
	async fn list_tunnels(&self, device: &DeviceId) -> Result<Vec<TunnelSummary>, BackendError>;

	async fn open_tunnel(
		&self,
		destination: &DestinationConfig,
	) -> Result<OpenedTunnel, BackendError>;

	/// Mint a fresh token pair for an open tunnel, invalidating the old one.
	async fn rotate_access_tokens(
		&self,
		tunnel_id: &TunnelId,
		client_mode: ClientMode,
		destination: &DestinationConfig,
	) -> Result<TokenPair, BackendError>;

	/// Close the tunnel; with `delete` the record is removed as well.
	async fn close_tunnel(&self, tunnel_id: &TunnelId, delete: bool) -> Result<(), BackendError>;
}
