use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::{EnvSnapshot, NetworkConfig};

const PROXY_KEYS: &[&str] = &[
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
    "NO_PROXY",
    "no_proxy",
];

const USER_AGENT: &str = concat!("remold/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Decide whether remold should honor standard proxy environment variables.
///
/// Behavior:
/// - `REMOLD_KEEP_PROXIES=1/true/yes/on` forces proxies on.
/// - `REMOLD_KEEP_PROXIES=0/false/no/off/""` forces proxies off.
/// - If unset, proxies are enabled only when at least one proxy env var is set.
pub(crate) fn keep_proxies(snapshot: &EnvSnapshot) -> bool {
    match snapshot.var("REMOLD_KEEP_PROXIES") {
        Some(raw) => {
            let value = raw.trim().to_ascii_lowercase();
            !matches!(value.as_str(), "" | "0" | "false" | "no" | "off")
        }
        None => PROXY_KEYS
            .iter()
            .any(|key| snapshot.non_empty(key).is_some()),
    }
}

pub(crate) fn http_client(network: &NetworkConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT);
    if !network.keep_proxies {
        builder = builder.no_proxy();
    }
    builder.build().context("failed to build http client")
}
