// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tunnel state reconciliation.
//!
//! A device may have at most one OPEN tunnel. Every state query also removes
//! CLOSED tunnels left behind by earlier sessions. The connect workflow turns
//! whatever state it finds into "open with a fresh source token":
//!
//! | state     | action          |
//! |-----------|-----------------|
//! | no tunnel | open            |
//! | open      | rotate tokens   |
//! | closed    | delete, open    |

use tracing::{error, info, instrument, warn};

use crate::backend::TunnelBackend;
use crate::device::DeviceId;
use crate::error::{BackendError, ConnectError, ReconcileError};
use crate::launch::ProxyLauncher;
use crate::token::{AccessToken, TokenPair};
use crate::tunnel::{ClientMode, DestinationConfig, TunnelId, TunnelState, TunnelStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
	/// A new tunnel was opened.
	Created { tunnel_id: TunnelId, tokens: TokenPair },
	/// The backend already lists a tunnel for the device; nothing was opened.
	Existing {
		tunnel_id: TunnelId,
		status: Option<TunnelStatus>,
	},
}

impl OpenOutcome {
	pub fn tokens(&self) -> Option<&TokenPair> {
		match self {
			OpenOutcome::Created { tokens, .. } => Some(tokens),
			OpenOutcome::Existing { .. } => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateOutcome {
	Rotated { tunnel_id: TunnelId, tokens: TokenPair },
	/// The tunnel is not open; a new one has to be created instead.
	NotOpen(TunnelState),
}

impl RotateOutcome {
	pub fn tokens(&self) -> Option<&TokenPair> {
		match self {
			RotateOutcome::Rotated { tokens, .. } => Some(tokens),
			RotateOutcome::NotOpen(_) => None,
		}
	}
}

/// How the connect workflow obtained its source token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
	Opened { tunnel_id: TunnelId },
	Rotated { tunnel_id: TunnelId },
	Replaced { closed: TunnelId, tunnel_id: TunnelId },
}

pub struct TunnelReconciler<B> {
	backend: B,
}

impl<B: TunnelBackend> TunnelReconciler<B> {
	pub fn new(backend: B) -> Self {
		Self { backend }
	}

	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Determine the device's tunnel state, deleting CLOSED tunnels on the way.
	///
	/// A CLOSED tunnel whose deletion fails is kept; when no tunnel is open the
	/// first such survivor is reported as [`TunnelState::Closed`].
	#[instrument(skip_all, fields(device = %device))]
	pub async fn tunnel_state(&self, device: &DeviceId) -> Result<TunnelState, ReconcileError> {
		let summaries = self.backend.list_tunnels(device).await?;

		let mut open = Vec::new();
		let mut closed = Vec::new();
		for summary in summaries {
			match summary.status {
				Some(TunnelStatus::Open) => open.push(summary.tunnel_id),
				Some(TunnelStatus::Closed) => closed.push(summary.tunnel_id),
				None => {}
			}
		}

		let mut undeleted = Vec::new();
		for tunnel_id in closed {
			if let Err(e) = self.delete_tunnel(&tunnel_id).await {
				warn!(tunnel_id = %tunnel_id, error = %e, "failed to delete closed tunnel");
				undeleted.push(tunnel_id);
			}
		}

		if open.len() > 1 {
			return Err(ReconcileError::Inconsistent {
				device: device.clone(),
				open,
			});
		}

		let state = match open.pop() {
			Some(tunnel_id) => TunnelState::Open(tunnel_id),
			None => match undeleted.into_iter().next() {
				Some(tunnel_id) => TunnelState::Closed(tunnel_id),
				None => TunnelState::NoTunnel,
			},
		};
		Ok(state)
	}

	/// Open a tunnel unless the backend lists any tunnel for the device.
	///
	/// The existence check ignores status: a CLOSED tunnel also blocks the open.
	#[instrument(skip_all, fields(device = %device))]
	pub async fn open_tunnel(&self, device: &DeviceId) -> Result<OpenOutcome, ReconcileError> {
		let summaries = self.backend.list_tunnels(device).await?;

		if let Some(existing) = summaries.into_iter().next() {
			info!(
				tunnel_id = %existing.tunnel_id,
				status = %existing.status.map_or_else(|| "UNKNOWN".to_string(), |s| s.to_string()),
				"not opening a new tunnel, one already exists"
			);
			return Ok(OpenOutcome::Existing {
				tunnel_id: existing.tunnel_id,
				status: existing.status,
			});
		}

		info!("creating a new tunnel");
		let opened = self
			.backend
			.open_tunnel(&DestinationConfig::for_device(device))
			.await?;
		info!(tunnel_id = %opened.tunnel_id, "new tunnel created");

		Ok(OpenOutcome::Created {
			tunnel_id: opened.tunnel_id,
			tokens: opened.tokens,
		})
	}

	/// Rotate both tokens of the device's open tunnel.
	#[instrument(skip_all, fields(device = %device))]
	pub async fn rotate_tokens(&self, device: &DeviceId) -> Result<RotateOutcome, ReconcileError> {
		let state = self.tunnel_state(device).await?;

		let TunnelState::Open(tunnel_id) = state else {
			info!(state = %state, "cannot rotate tokens, tunnel is not open; create a new tunnel");
			return Ok(RotateOutcome::NotOpen(state));
		};

		let tokens = self
			.backend
			.rotate_access_tokens(
				&tunnel_id,
				ClientMode::All,
				&DestinationConfig::for_device(device),
			)
			.await?;
		info!(tunnel_id = %tunnel_id, "tokens rotated");

		Ok(RotateOutcome::Rotated { tunnel_id, tokens })
	}

	/// Close and delete a tunnel.
	#[instrument(skip(self))]
	pub async fn delete_tunnel(&self, tunnel_id: &TunnelId) -> Result<(), BackendError> {
		info!(tunnel_id = %tunnel_id, "deleting tunnel");
		self.backend.close_tunnel(tunnel_id, true).await
	}

	/// Bring the device to "open with a fresh source token", then run the
	/// launcher with that token until it exits.
	#[instrument(skip_all, fields(device = %device))]
	pub async fn connect<L>(
		&self,
		device: &DeviceId,
		launcher: &L,
	) -> Result<ConnectOutcome, ConnectError>
	where
		L: ProxyLauncher + ?Sized,
	{
		let state = self.tunnel_state(device).await?;

		let (outcome, source) = match state {
			TunnelState::NoTunnel => {
				info!("no tunnel for device, opening one");
				let (tunnel_id, token) = self.open_for_connect(device).await?;
				(ConnectOutcome::Opened { tunnel_id }, token)
			}
			TunnelState::Open(tunnel_id) => {
				info!(tunnel_id = %tunnel_id, "tunnel is open, rotating access tokens");
				match self.rotate_tokens(device).await? {
					RotateOutcome::Rotated { tunnel_id, tokens } => {
						(ConnectOutcome::Rotated { tunnel_id }, tokens.source)
					}
					RotateOutcome::NotOpen(_) => {
						return Err(ReconcileError::NoSourceToken {
							device: device.clone(),
						}
						.into());
					}
				}
			}
			TunnelState::Closed(closed) => {
				info!(tunnel_id = %closed, "tunnel is closed, deleting it and opening a new one");
				self.delete_tunnel(&closed).await.map_err(ReconcileError::from)?;
				let (tunnel_id, token) = self.open_for_connect(device).await?;
				(ConnectOutcome::Replaced { closed, tunnel_id }, token)
			}
		};

		if let Err(e) = launcher.launch(&source).await {
			error!(error = %e, "localproxy failed");
			return Err(e.into());
		}

		Ok(outcome)
	}

	async fn open_for_connect(
		&self,
		device: &DeviceId,
	) -> Result<(TunnelId, AccessToken), ReconcileError> {
		match self.open_tunnel(device).await? {
			OpenOutcome::Created { tunnel_id, tokens } => Ok((tunnel_id, tokens.source)),
			OpenOutcome::Existing { .. } => Err(ReconcileError::NoSourceToken {
				device: device.clone(),
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{BackendCall, MockBackend, MockLauncher};
	use crate::tunnel::TunnelSummary;
	use crate::LaunchError;
	use proptest::prelude::*;

	fn device() -> DeviceId {
		DeviceId::new("g111000").unwrap()
	}

	mod state_query {
		use super::*;

		#[tokio::test]
		async fn no_tunnels_reports_no_tunnel() {
			let reconciler = TunnelReconciler::new(MockBackend::default());

			let state = reconciler.tunnel_state(&device()).await.unwrap();

			assert_eq!(state, TunnelState::NoTunnel);
			assert_eq!(state.tunnel_id(), None);
			assert!(reconciler.backend().closes().is_empty());
		}

		#[tokio::test]
		async fn one_open_and_closed_tunnels_deletes_closed() {
			let backend = MockBackend::with_tunnels(vec![
				TunnelSummary::closed("t-old-1"),
				TunnelSummary::open("t-live"),
				TunnelSummary::closed("t-old-2"),
			]);
			let reconciler = TunnelReconciler::new(backend);

			let state = reconciler.tunnel_state(&device()).await.unwrap();

			assert_eq!(state, TunnelState::Open(TunnelId::new("t-live")));
			assert_eq!(
				reconciler.backend().closes(),
				vec![
					(TunnelId::new("t-old-1"), true),
					(TunnelId::new("t-old-2"), true)
				]
			);
			assert_eq!(
				reconciler.backend().tunnels(),
				vec![TunnelSummary::open("t-live")]
			);
		}

		#[tokio::test]
		async fn only_closed_tunnels_reports_no_tunnel_after_cleanup() {
			let backend = MockBackend::with_tunnels(vec![TunnelSummary::closed("t-old")]);
			let reconciler = TunnelReconciler::new(backend);

			let state = reconciler.tunnel_state(&device()).await.unwrap();

			assert_eq!(state, TunnelState::NoTunnel);
			assert!(reconciler.backend().tunnels().is_empty());
		}

		#[tokio::test]
		async fn multiple_open_tunnels_is_inconsistent() {
			let backend = MockBackend::with_tunnels(vec![
				TunnelSummary::open("t-1"),
				TunnelSummary::closed("t-2"),
				TunnelSummary::open("t-3"),
			]);
			let reconciler = TunnelReconciler::new(backend);

			let err = reconciler.tunnel_state(&device()).await.unwrap_err();

			match err {
				ReconcileError::Inconsistent { device: d, open } => {
					assert_eq!(d, device());
					assert_eq!(open, vec![TunnelId::new("t-1"), TunnelId::new("t-3")]);
				}
				other => panic!("expected Inconsistent, got {other:?}"),
			}
			// Closed tunnels are still collected; open ones are never touched.
			assert_eq!(
				reconciler.backend().closes(),
				vec![(TunnelId::new("t-2"), true)]
			);
		}

		#[tokio::test]
		async fn unknown_status_is_ignored() {
			let backend = MockBackend::with_tunnels(vec![TunnelSummary::new("t-odd", None)]);
			let reconciler = TunnelReconciler::new(backend);

			let state = reconciler.tunnel_state(&device()).await.unwrap();

			assert_eq!(state, TunnelState::NoTunnel);
			assert!(reconciler.backend().closes().is_empty());
		}

		#[tokio::test]
		async fn failed_cleanup_reports_closed() {
			let backend = MockBackend::with_tunnels(vec![TunnelSummary::closed("t-stuck")]);
			backend.fail_close("t-stuck", 1);
			let reconciler = TunnelReconciler::new(backend);

			let state = reconciler.tunnel_state(&device()).await.unwrap();

			assert_eq!(state, TunnelState::Closed(TunnelId::new("t-stuck")));
		}

		#[tokio::test]
		async fn list_failure_propagates() {
			let backend = MockBackend::default();
			backend.fail_list();
			let reconciler = TunnelReconciler::new(backend);

			let err = reconciler.tunnel_state(&device()).await.unwrap_err();

			assert!(matches!(err, ReconcileError::Backend(BackendError::Service { .. })));
		}
	}

	mod open {
		use super::*;

		#[tokio::test]
		async fn creates_tunnel_when_none_listed() {
			let reconciler = TunnelReconciler::new(MockBackend::default());

			let outcome = reconciler.open_tunnel(&device()).await.unwrap();

			let tokens = outcome.tokens().expect("tokens for a new tunnel");
			assert_eq!(tokens.source.expose(), "open-src-1");
			assert_eq!(tokens.destination.expose(), "open-dst-1");
			assert_eq!(reconciler.backend().opens(), 1);
			assert!(reconciler.backend().calls().contains(&BackendCall::Open(
				DestinationConfig::for_device(&device())
			)));
		}

		#[tokio::test]
		async fn existing_closed_tunnel_blocks_open() {
			let backend = MockBackend::with_tunnels(vec![TunnelSummary::closed("t-old")]);
			let reconciler = TunnelReconciler::new(backend);

			let outcome = reconciler.open_tunnel(&device()).await.unwrap();

			assert_eq!(
				outcome,
				OpenOutcome::Existing {
					tunnel_id: TunnelId::new("t-old"),
					status: Some(TunnelStatus::Closed),
				}
			);
			assert_eq!(outcome.tokens(), None);
			assert_eq!(reconciler.backend().opens(), 0);
			assert!(reconciler.backend().closes().is_empty());
		}

		proptest! {
			#[test]
			fn prop_open_is_noop_when_any_tunnel_listed(
				statuses in proptest::collection::vec(
					prop_oneof![
						Just(Some(TunnelStatus::Open)),
						Just(Some(TunnelStatus::Closed)),
						Just(None),
					],
					1..6,
				)
			) {
				let tunnels = statuses
					.iter()
					.enumerate()
					.map(|(i, s)| TunnelSummary::new(format!("t-{i}"), *s))
					.collect();
				let reconciler = TunnelReconciler::new(MockBackend::with_tunnels(tunnels));

				let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
				let outcome = rt.block_on(reconciler.open_tunnel(&device())).unwrap();

				let is_existing = matches!(outcome, OpenOutcome::Existing { .. });
				prop_assert!(is_existing);
				prop_assert_eq!(reconciler.backend().opens(), 0);
			}
		}
	}

	mod rotate {
		use super::*;

		#[tokio::test]
		async fn rotates_open_tunnel_for_all_clients() {
			let backend = MockBackend::with_tunnels(vec![TunnelSummary::open("t-live")]);
			let reconciler = TunnelReconciler::new(backend);

			let outcome = reconciler.rotate_tokens(&device()).await.unwrap();

			let RotateOutcome::Rotated { tunnel_id, tokens } = outcome else {
				panic!("expected Rotated");
			};
			assert_eq!(tunnel_id, TunnelId::new("t-live"));
			assert_eq!(tokens.source.expose(), "rotated-src-1");
			assert_eq!(tokens.destination.expose(), "rotated-dst-1");
			assert!(reconciler.backend().calls().contains(&BackendCall::Rotate(
				TunnelId::new("t-live"),
				ClientMode::All,
				DestinationConfig::for_device(&device()),
			)));
		}

		#[tokio::test]
		async fn no_tunnel_is_not_rotated() {
			let reconciler = TunnelReconciler::new(MockBackend::default());

			let outcome = reconciler.rotate_tokens(&device()).await.unwrap();

			assert_eq!(outcome, RotateOutcome::NotOpen(TunnelState::NoTunnel));
			assert_eq!(outcome.tokens(), None);
			assert_eq!(reconciler.backend().rotates(), 0);
		}

		#[tokio::test]
		async fn undeletable_closed_tunnel_is_not_rotated() {
			let backend = MockBackend::with_tunnels(vec![TunnelSummary::closed("t-stale")]);
			backend.fail_close("t-stale", 1);
			let reconciler = TunnelReconciler::new(backend);

			let outcome = reconciler.rotate_tokens(&device()).await.unwrap();

			assert_eq!(
				outcome,
				RotateOutcome::NotOpen(TunnelState::Closed(TunnelId::new("t-stale")))
			);
			assert_eq!(outcome.tokens(), None);
			assert_eq!(reconciler.backend().rotates(), 0);
			assert_eq!(
				reconciler.backend().closes(),
				vec![(TunnelId::new("t-stale"), true)]
			);
		}

		#[tokio::test]
		async fn inconsistency_propagates_without_rotating() {
			let backend = MockBackend::with_tunnels(vec![
				TunnelSummary::open("t-1"),
				TunnelSummary::open("t-2"),
			]);
			let reconciler = TunnelReconciler::new(backend);

			let err = reconciler.rotate_tokens(&device()).await.unwrap_err();

			assert!(matches!(err, ReconcileError::Inconsistent { .. }));
			assert_eq!(reconciler.backend().rotates(), 0);
		}
	}

	mod connect {
		use super::*;

		#[tokio::test]
		async fn no_tunnel_opens_and_launches_with_open_token() {
			let reconciler = TunnelReconciler::new(MockBackend::default());
			let launcher = MockLauncher::succeeding();

			let outcome = reconciler.connect(&device(), &launcher).await.unwrap();

			assert!(matches!(outcome, ConnectOutcome::Opened { .. }));
			assert_eq!(reconciler.backend().opens(), 1);
			assert_eq!(reconciler.backend().rotates(), 0);
			assert!(reconciler.backend().closes().is_empty());
			assert_eq!(launcher.tokens(), vec!["open-src-1".to_string()]);
		}

		#[tokio::test]
		async fn open_tunnel_rotates_and_launches_with_rotated_token() {
			let backend = MockBackend::with_tunnels(vec![TunnelSummary::open("t-live")]);
			let reconciler = TunnelReconciler::new(backend);
			let launcher = MockLauncher::succeeding();

			let outcome = reconciler.connect(&device(), &launcher).await.unwrap();

			assert_eq!(
				outcome,
				ConnectOutcome::Rotated {
					tunnel_id: TunnelId::new("t-live")
				}
			);
			assert_eq!(reconciler.backend().rotates(), 1);
			assert_eq!(reconciler.backend().opens(), 0);
			assert!(reconciler.backend().closes().is_empty());
			assert_eq!(launcher.tokens(), vec!["rotated-src-1".to_string()]);
		}

		#[tokio::test]
		async fn closed_tunnel_is_deleted_then_replaced() {
			let backend = MockBackend::with_tunnels(vec![TunnelSummary::closed("t-old")]);
			let reconciler = TunnelReconciler::new(backend);
			let launcher = MockLauncher::succeeding();

			reconciler.connect(&device(), &launcher).await.unwrap();

			assert_eq!(
				reconciler.backend().closes(),
				vec![(TunnelId::new("t-old"), true)]
			);
			assert_eq!(reconciler.backend().opens(), 1);
			assert_eq!(launcher.tokens(), vec!["open-src-1".to_string()]);

			let calls = reconciler.backend().calls();
			let close_at = calls
				.iter()
				.position(|c| matches!(c, BackendCall::Close(..)))
				.unwrap();
			let open_at = calls
				.iter()
				.position(|c| matches!(c, BackendCall::Open(..)))
				.unwrap();
			assert!(close_at < open_at, "delete must happen before open");
		}

		#[tokio::test]
		async fn closed_state_retries_delete_before_open() {
			let backend = MockBackend::with_tunnels(vec![TunnelSummary::closed("t-stuck")]);
			backend.fail_close("t-stuck", 1);
			let reconciler = TunnelReconciler::new(backend);
			let launcher = MockLauncher::succeeding();

			let outcome = reconciler.connect(&device(), &launcher).await.unwrap();

			assert_eq!(
				outcome,
				ConnectOutcome::Replaced {
					closed: TunnelId::new("t-stuck"),
					tunnel_id: TunnelId::new("tunnel-1"),
				}
			);
			assert_eq!(reconciler.backend().closes().len(), 2);
			assert_eq!(reconciler.backend().opens(), 1);
			assert_eq!(launcher.tokens(), vec!["open-src-1".to_string()]);
		}

		#[tokio::test]
		async fn inconsistency_never_launches() {
			let backend = MockBackend::with_tunnels(vec![
				TunnelSummary::open("t-1"),
				TunnelSummary::open("t-2"),
			]);
			let reconciler = TunnelReconciler::new(backend);
			let launcher = MockLauncher::succeeding();

			let err = reconciler.connect(&device(), &launcher).await.unwrap_err();

			assert!(matches!(
				err,
				ConnectError::Reconcile(ReconcileError::Inconsistent { .. })
			));
			assert!(launcher.tokens().is_empty());
		}

		#[tokio::test]
		async fn launcher_failure_is_reported() {
			let reconciler = TunnelReconciler::new(MockBackend::default());
			let launcher = MockLauncher::exiting_with(7);

			let err = reconciler.connect(&device(), &launcher).await.unwrap_err();

			match err {
				ConnectError::Launch(e @ LaunchError::NonZeroExit { .. }) => {
					assert_eq!(e.exit_code(), 7);
				}
				other => panic!("expected launch failure, got {other:?}"),
			}
		}
	}
}
