// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core logic for managing a device's secure tunnel.
//!
//! - [`TunnelBackend`]: the four remote operations (list, open, rotate, close)
//! - [`TunnelReconciler`]: the state query and the open / rotate / connect
//!   workflows built on top of a backend
//! - [`LocalProxyLauncher`]: builds and runs the `localproxy` command line

pub mod backend;
pub mod device;
pub mod error;
pub mod launch;
pub mod reconcile;
pub mod token;
pub mod tunnel;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use backend::TunnelBackend;
pub use device::{DeviceId, DeviceIdError};
pub use error::{BackendError, ConnectError, LaunchError, ReconcileError};
pub use launch::{
	resolve_executable, LocalProxyCommand, LocalProxyLauncher, ProcessRunner, ProxyLauncher,
	ProxySettings, TokioProcessRunner, ACCESS_TOKEN_ENV, DEFAULT_EXECUTABLE,
};
pub use reconcile::{ConnectOutcome, OpenOutcome, RotateOutcome, TunnelReconciler};
pub use token::{AccessToken, TokenPair};
pub use tunnel::{
	ClientMode, DestinationConfig, OpenedTunnel, Service, ServiceBinding, TunnelId, TunnelState,
	TunnelStatus, TunnelSummary,
};
