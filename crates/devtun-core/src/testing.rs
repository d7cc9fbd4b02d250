// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory backend and launcher for tests.
//!
//! Compiled for this crate's own tests and, through the `test-util`
//! feature, for tests of dependent crates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::TunnelBackend;
use crate::device::DeviceId;
use crate::error::{BackendError, LaunchError};
use crate::launch::ProxyLauncher;
use crate::token::{AccessToken, TokenPair};
use crate::tunnel::{
	ClientMode, DestinationConfig, OpenedTunnel, TunnelId, TunnelStatus, TunnelSummary,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
	List(DeviceId),
	Open(DestinationConfig),
	Rotate(TunnelId, ClientMode, DestinationConfig),
	Close(TunnelId, bool),
}

/// Backend holding one device's tunnels in memory.
///
/// Opening adds an OPEN tunnel, closing with `delete` removes it. Every call
/// is recorded, including failed ones.
#[derive(Default)]
pub struct MockBackend {
	tunnels: Mutex<Vec<TunnelSummary>>,
	calls: Mutex<Vec<BackendCall>>,
	close_failures: Mutex<HashMap<String, usize>>,
	list_fails: AtomicBool,
	opened: AtomicUsize,
	rotated: AtomicUsize,
}

impl MockBackend {
	pub fn with_tunnels(tunnels: Vec<TunnelSummary>) -> Self {
		Self {
			tunnels: Mutex::new(tunnels),
			..Default::default()
		}
	}

	/// Make the next `times` closes of `tunnel_id` fail.
	pub fn fail_close(&self, tunnel_id: &str, times: usize) {
		self
			.close_failures
			.lock()
			.unwrap()
			.insert(tunnel_id.to_string(), times);
	}

	pub fn fail_list(&self) {
		self.list_fails.store(true, Ordering::SeqCst);
	}

	pub fn calls(&self) -> Vec<BackendCall> {
		self.calls.lock().unwrap().clone()
	}

	pub fn tunnels(&self) -> Vec<TunnelSummary> {
		self.tunnels.lock().unwrap().clone()
	}

	pub fn opens(&self) -> usize {
		self
			.calls()
			.iter()
			.filter(|c| matches!(c, BackendCall::Open(_)))
			.count()
	}

	pub fn rotates(&self) -> usize {
		self
			.calls()
			.iter()
			.filter(|c| matches!(c, BackendCall::Rotate(..)))
			.count()
	}

	pub fn closes(&self) -> Vec<(TunnelId, bool)> {
		self
			.calls()
			.into_iter()
			.filter_map(|c| match c {
				BackendCall::Close(id, delete) => Some((id, delete)),
				_ => None,
			})
			.collect()
	}

	fn record(&self, call: BackendCall) {
		self.calls.lock().unwrap().push(call);
	}
}

#[async_trait]
impl TunnelBackend for MockBackend {
	async fn list_tunnels(&self, device: &DeviceId) -> Result<Vec<TunnelSummary>, BackendError> {
		self.record(BackendCall::List(device.clone()));
		if self.list_fails.load(Ordering::SeqCst) {
			return Err(BackendError::service("ListTunnels", "mock failure"));
		}
		Ok(self.tunnels())
	}

	async fn open_tunnel(
		&self,
		destination: &DestinationConfig,
	) -> Result<OpenedTunnel, BackendError> {
		self.record(BackendCall::Open(destination.clone()));
		let n = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
		let tunnel_id = TunnelId::new(format!("tunnel-{n}"));
		self.tunnels.lock().unwrap().push(TunnelSummary {
			tunnel_id: tunnel_id.clone(),
			status: Some(TunnelStatus::Open),
		});
		Ok(OpenedTunnel {
			tunnel_id,
			tokens: TokenPair::new(format!("open-src-{n}"), format!("open-dst-{n}")),
		})
	}

	async fn rotate_access_tokens(
		&self,
		tunnel_id: &TunnelId,
		client_mode: ClientMode,
		destination: &DestinationConfig,
	) -> Result<TokenPair, BackendError> {
		self.record(BackendCall::Rotate(
			tunnel_id.clone(),
			client_mode,
			destination.clone(),
		));
		let n = self.rotated.fetch_add(1, Ordering::SeqCst) + 1;
		Ok(TokenPair::new(
			format!("rotated-src-{n}"),
			format!("rotated-dst-{n}"),
		))
	}

	async fn close_tunnel(&self, tunnel_id: &TunnelId, delete: bool) -> Result<(), BackendError> {
		self.record(BackendCall::Close(tunnel_id.clone(), delete));

		{
			let mut failures = self.close_failures.lock().unwrap();
			if let Some(remaining) = failures.get_mut(tunnel_id.as_str()) {
				if *remaining > 0 {
					*remaining -= 1;
					return Err(BackendError::service("CloseTunnel", "mock failure"));
				}
			}
		}

		let mut tunnels = self.tunnels.lock().unwrap();
		if delete {
			tunnels.retain(|t| &t.tunnel_id != tunnel_id);
		} else if let Some(t) = tunnels.iter_mut().find(|t| &t.tunnel_id == tunnel_id) {
			t.status = Some(TunnelStatus::Closed);
		}
		Ok(())
	}
}

/// Launcher that records the tokens it is given instead of spawning anything.
pub struct MockLauncher {
	tokens: Mutex<Vec<String>>,
	exit_code: i32,
}

impl MockLauncher {
	pub fn succeeding() -> Self {
		Self::exiting_with(0)
	}

	pub fn exiting_with(exit_code: i32) -> Self {
		Self {
			tokens: Mutex::new(Vec::new()),
			exit_code,
		}
	}

	pub fn tokens(&self) -> Vec<String> {
		self.tokens.lock().unwrap().clone()
	}
}

#[async_trait]
impl ProxyLauncher for MockLauncher {
	async fn launch(&self, token: &AccessToken) -> Result<(), LaunchError> {
		self.tokens.lock().unwrap().push(token.expose().to_string());
		if self.exit_code == 0 {
			Ok(())
		} else {
			Err(LaunchError::NonZeroExit {
				code: Some(self.exit_code),
			})
		}
	}
}
