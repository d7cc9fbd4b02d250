// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runs the launcher against a stand-in `localproxy` shell script.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use devtun_core::{
	AccessToken, LaunchError, LocalProxyLauncher, ProxyLauncher, ProxySettings, Service,
	ServiceBinding,
};

const SCRIPT: &str = r#"#!/bin/sh
here="$(dirname "$0")"
printf '%s\n' "$@" > "$here/args.txt"
printf '%s' "$AWSIOT_TUNNEL_ACCESS_TOKEN" > "$here/env.txt"
exit "$(cat "$here/exit_code")"
"#;

fn install_fake_proxy(dir: &Path) -> PathBuf {
	let path = dir.join("localproxy");
	std::fs::write(&path, SCRIPT).unwrap();
	std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
	path
}

fn settings(executable: PathBuf) -> ProxySettings {
	ProxySettings {
		executable,
		region: "eu-west-1".to_string(),
		bindings: vec![
			ServiceBinding::new(Service::Ssh, 2222),
			ServiceBinding::new(Service::Gort, 5555),
		],
		bind_address: "0.0.0.0".parse().unwrap(),
		cert_dir: PathBuf::from("certs"),
		token_via_env: false,
	}
}

fn read_args(dir: &Path) -> Vec<String> {
	std::fs::read_to_string(dir.join("args.txt"))
		.unwrap()
		.lines()
		.map(str::to_string)
		.collect()
}

// One test so that only one child process is forked at a time while the
// script file is being written.
#[tokio::test]
async fn localproxy_exit_status_is_propagated() {
	let dir = tempfile::tempdir().unwrap();
	let exe = install_fake_proxy(dir.path());
	let token = AccessToken::new("tok123");

	// Clean exit.
	std::fs::write(dir.path().join("exit_code"), "0").unwrap();
	let launcher = LocalProxyLauncher::new(settings(exe.clone()));
	launcher.launch(&token).await.unwrap();
	assert_eq!(
		read_args(dir.path()),
		vec![
			"-r",
			"eu-west-1",
			"-s",
			"SSH=2222,GORT=5555",
			"-b",
			"0.0.0.0",
			"-c",
			"certs",
			"-t",
			"tok123"
		]
	);

	// Failing exit carries the child's code.
	std::fs::write(dir.path().join("exit_code"), "7").unwrap();
	let err = launcher.launch(&token).await.unwrap_err();
	assert!(matches!(err, LaunchError::NonZeroExit { code: Some(7) }));
	assert_eq!(err.exit_code(), 7);

	// Token handed over through the environment.
	std::fs::write(dir.path().join("exit_code"), "0").unwrap();
	let mut env_settings = settings(exe);
	env_settings.token_via_env = true;
	LocalProxyLauncher::new(env_settings)
		.launch(&token)
		.await
		.unwrap();
	assert!(!read_args(dir.path()).contains(&"tok123".to_string()));
	assert_eq!(
		std::fs::read_to_string(dir.path().join("env.txt")).unwrap(),
		"tok123"
	);

	// Missing executable.
	let missing = LocalProxyLauncher::new(settings(dir.path().join("does-not-exist")));
	let err = missing.launch(&token).await.unwrap_err();
	assert!(matches!(err, LaunchError::Spawn { .. }));
	assert_eq!(err.exit_code(), 1);
}
