// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AWS IoT Secure Tunneling implementation of [`devtun_core::TunnelBackend`].

pub mod backend;
pub mod session;

pub use backend::AwsTunnelBackend;
pub use session::AwsSession;
