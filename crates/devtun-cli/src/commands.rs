// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::ffi::OsStr;

use console::style;
use devtun_aws::AwsSession;
use devtun_config::DevtunConfig;
use devtun_core::{
	resolve_executable, AccessToken, ConnectError, ConnectOutcome, DeviceId, LocalProxyLauncher,
	OpenOutcome, ProxyLauncher, ProxySettings, RotateOutcome, Service, ServiceBinding,
	TokenPair, TunnelBackend, TunnelReconciler, TunnelState,
};
use tracing::{error, info, instrument, warn};

use crate::args::Action;

/// Run `action` against AWS and return the process exit status.
pub async fn run(action: &Action, config: &DevtunConfig, show_tokens: bool) -> u8 {
	let session = AwsSession::establish(config.aws.profile.as_deref(), &config.aws.region).await;
	let reconciler = TunnelReconciler::new(session.backend());
	let search_path = std::env::var_os("PATH");
	let launcher = LocalProxyLauncher::new(proxy_settings(config, search_path.as_deref()));

	let result = execute(action, &reconciler, &launcher, show_tokens).await;
	exit_status(&result)
}

pub fn proxy_settings(config: &DevtunConfig, search_path: Option<&OsStr>) -> ProxySettings {
	let proxy = &config.proxy;
	ProxySettings {
		executable: resolve_executable(&proxy.executable, search_path),
		region: config.aws.region.clone(),
		bindings: vec![
			ServiceBinding::new(Service::Ssh, proxy.ssh_port),
			ServiceBinding::new(Service::Gort, proxy.gort_port),
		],
		bind_address: proxy.bind_address,
		cert_dir: proxy.cert_dir.clone(),
		token_via_env: proxy.token_via_env,
	}
}

pub async fn execute<B, L>(
	action: &Action,
	reconciler: &TunnelReconciler<B>,
	launcher: &L,
	show_tokens: bool,
) -> Result<(), ConnectError>
where
	B: TunnelBackend,
	L: ProxyLauncher,
{
	match action {
		Action::Create(device) => handle_create(device, reconciler, show_tokens).await,
		Action::Status(device) => handle_status(device, reconciler).await,
		Action::Rotate(device) => handle_rotate(device, reconciler, show_tokens).await,
		Action::Connect(device) => handle_connect(device, reconciler, launcher).await,
	}
}

/// Only a failed proxy run is reported through the exit status.
pub fn exit_status(result: &Result<(), ConnectError>) -> u8 {
	match result {
		Ok(()) => 0,
		Err(ConnectError::Launch(e)) => u8::try_from(e.exit_code())
			.ok()
			.filter(|code| *code != 0)
			.unwrap_or(1),
		Err(ConnectError::Reconcile(e)) => {
			error!(error = %e, "command failed");
			0
		}
	}
}

#[instrument(skip_all, fields(device = %device))]
async fn handle_status<B: TunnelBackend>(
	device: &DeviceId,
	reconciler: &TunnelReconciler<B>,
) -> Result<(), ConnectError> {
	let state = reconciler.tunnel_state(device).await?;
	info!(state = %state, tunnel_id = ?state.tunnel_id(), "device tunnel state");

	let marker = match state {
		TunnelState::Open(_) => style("●").green().bold(),
		TunnelState::Closed(_) => style("●").red().bold(),
		TunnelState::NoTunnel => style("●").dim(),
	};
	match state.tunnel_id() {
		Some(tunnel_id) => println!(
			"{marker} {device}: {state} ({})",
			style(tunnel_id).cyan()
		),
		None => println!("{marker} {device}: {state}"),
	}
	Ok(())
}

#[instrument(skip_all, fields(device = %device))]
async fn handle_create<B: TunnelBackend>(
	device: &DeviceId,
	reconciler: &TunnelReconciler<B>,
	show_tokens: bool,
) -> Result<(), ConnectError> {
	match reconciler.open_tunnel(device).await? {
		OpenOutcome::Created { tunnel_id, tokens } => {
			info!(tunnel_id = %tunnel_id, "opened tunnel");
			println!("{} Tunnel opened for {device}", style("✓").green().bold());
			println!("  Tunnel: {}", style(&tunnel_id).cyan());
			print_tokens(&tokens, show_tokens);
		}
		OpenOutcome::Existing { tunnel_id, status } => {
			let status = status.map_or_else(|| "UNKNOWN".to_string(), |s| s.to_string());
			warn!(tunnel_id = %tunnel_id, status = %status, "device already has a tunnel, not opening another");
			println!(
				"{} {device} already has a tunnel: {} ({status})",
				style("!").yellow().bold(),
				style(&tunnel_id).cyan()
			);
		}
	}
	Ok(())
}

#[instrument(skip_all, fields(device = %device))]
async fn handle_rotate<B: TunnelBackend>(
	device: &DeviceId,
	reconciler: &TunnelReconciler<B>,
	show_tokens: bool,
) -> Result<(), ConnectError> {
	match reconciler.rotate_tokens(device).await? {
		RotateOutcome::Rotated { tunnel_id, tokens } => {
			info!(tunnel_id = %tunnel_id, "rotated access tokens");
			println!("{} Tokens rotated for {device}", style("✓").green().bold());
			println!("  Tunnel: {}", style(&tunnel_id).cyan());
			print_tokens(&tokens, show_tokens);
		}
		RotateOutcome::NotOpen(state) => {
			warn!(state = %state, "no open tunnel, nothing to rotate");
			println!(
				"{} {device} has no open tunnel ({state}); create one first",
				style("!").yellow().bold()
			);
		}
	}
	Ok(())
}

#[instrument(skip_all, fields(device = %device))]
async fn handle_connect<B, L>(
	device: &DeviceId,
	reconciler: &TunnelReconciler<B>,
	launcher: &L,
) -> Result<(), ConnectError>
where
	B: TunnelBackend,
	L: ProxyLauncher,
{
	let outcome = reconciler.connect(device, launcher).await?;
	let tunnel_id = match &outcome {
		ConnectOutcome::Opened { tunnel_id }
		| ConnectOutcome::Rotated { tunnel_id }
		| ConnectOutcome::Replaced { tunnel_id, .. } => tunnel_id,
	};
	info!(tunnel_id = %tunnel_id, outcome = ?outcome, "local proxy session ended");
	println!(
		"{} Disconnected from {device} ({})",
		style("✓").green().bold(),
		style(tunnel_id).cyan()
	);
	Ok(())
}

fn print_tokens(tokens: &TokenPair, show_tokens: bool) {
	println!("  Source token:      {}", render_token(&tokens.source, show_tokens));
	println!("  Destination token: {}", render_token(&tokens.destination, show_tokens));
}

fn render_token(token: &AccessToken, show: bool) -> String {
	if show {
		token.expose().to_string()
	} else {
		token.to_string()
	}
}
