// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Host identity injected into every document.

use std::env;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use std::sync::OnceLock;
use tracing::{debug, warn};

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Get the system hostname
///
/// Tried in order:
/// 1. `ES_LOG_HOSTNAME` environment variable
/// 2. `HOSTNAME` environment variable
/// 3. System hostname via `nix::unistd::gethostname()`
/// 4. `"unknown"`
#[must_use]
pub fn get_hostname() -> String {
    for var in ["ES_LOG_HOSTNAME", "HOSTNAME"] {
        if let Ok(hostname) = env::var(var) {
            if !hostname.is_empty() {
                return hostname;
            }
        }
    }

    match nix::unistd::gethostname() {
        Ok(hostname) => {
            if let Some(hostname) = hostname.to_str() {
                if !hostname.is_empty() {
                    return hostname.to_string();
                }
            }
        }
        Err(e) => {
            warn!("Failed to get system hostname: {}", e);
        }
    }

    warn!("Could not determine hostname, using 'unknown'");
    "unknown".to_string()
}

/// First IPv4 address the hostname resolves to, loopback when resolution
/// fails. macOS resolution of the local hostname can stall for seconds, so
/// loopback is used there directly.
#[must_use]
pub fn get_host_ip(hostname: &str) -> String {
    if cfg!(target_os = "macos") {
        return LOOPBACK.to_string();
    }

    let resolved = (hostname, 0)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.find(|addr| addr.is_ipv4()).map(|addr| addr.ip()));

    resolved.unwrap_or(LOOPBACK).to_string()
}

/// `(hostname, host_ip)`, resolved once per process. The first call blocks
/// on a DNS lookup.
pub fn host_identity() -> &'static (String, String) {
    static IDENTITY: OnceLock<(String, String)> = OnceLock::new();
    IDENTITY.get_or_init(|| {
        let host = get_hostname();
        let host_ip = get_host_ip(&host);
        debug!("Resolved host identity {} ({})", host, host_ip);
        (host, host_ip)
    })
}
