// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use crate::device::DeviceId;
use crate::token::TokenPair;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TunnelId(String);

impl TunnelId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TunnelId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Status the backend reports for a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelStatus {
	Open,
	Closed,
}

impl fmt::Display for TunnelStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TunnelStatus::Open => f.write_str("OPEN"),
			TunnelStatus::Closed => f.write_str("CLOSED"),
		}
	}
}

/// One entry of a tunnel listing. `status` is `None` when the backend
/// omitted it or reported a value this tool does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSummary {
	pub tunnel_id: TunnelId,
	pub status: Option<TunnelStatus>,
}

impl TunnelSummary {
	pub fn new(tunnel_id: impl Into<String>, status: Option<TunnelStatus>) -> Self {
		Self {
			tunnel_id: TunnelId::new(tunnel_id),
			status,
		}
	}

	pub fn open(tunnel_id: impl Into<String>) -> Self {
		Self::new(tunnel_id, Some(TunnelStatus::Open))
	}

	pub fn closed(tunnel_id: impl Into<String>) -> Self {
		Self::new(tunnel_id, Some(TunnelStatus::Closed))
	}
}

/// Reconciled state of a device's tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelState {
	NoTunnel,
	Open(TunnelId),
	Closed(TunnelId),
}

impl TunnelState {
	pub fn tunnel_id(&self) -> Option<&TunnelId> {
		match self {
			TunnelState::NoTunnel => None,
			TunnelState::Open(id) | TunnelState::Closed(id) => Some(id),
		}
	}

	pub fn is_open(&self) -> bool {
		matches!(self, TunnelState::Open(_))
	}
}

impl fmt::Display for TunnelState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TunnelState::NoTunnel => f.write_str("NO TUNNEL"),
			TunnelState::Open(_) => f.write_str("OPEN"),
			TunnelState::Closed(_) => f.write_str("CLOSED"),
		}
	}
}

/// Services forwarded through every tunnel this tool opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
	Ssh,
	Gort,
}

impl Service {
	/// Order in which services are registered on the destination.
	pub const ALL: [Service; 2] = [Service::Gort, Service::Ssh];

	pub fn name(self) -> &'static str {
		match self {
			Service::Ssh => "SSH",
			Service::Gort => "GORT",
		}
	}
}

impl fmt::Display for Service {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A service mapped to a local port by `localproxy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceBinding {
	pub service: Service,
	pub port: u16,
}

impl ServiceBinding {
	pub const DEFAULT_SSH_PORT: u16 = 2222;
	pub const DEFAULT_GORT_PORT: u16 = 5555;

	pub fn new(service: Service, port: u16) -> Self {
		Self { service, port }
	}
}

impl fmt::Display for ServiceBinding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}={}", self.service, self.port)
	}
}

/// Which client edges a token rotation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
	Source,
	Destination,
	All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationConfig {
	pub device: DeviceId,
	pub services: Vec<Service>,
}

impl DestinationConfig {
	/// Destination for `device` with every forwarded service.
	pub fn for_device(device: &DeviceId) -> Self {
		Self {
			device: device.clone(),
			services: Service::ALL.to_vec(),
		}
	}
}

/// Result of a successful open call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedTunnel {
	pub tunnel_id: TunnelId,
	pub tokens: TokenPair,
}
