// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! NATS connection establishment.
//!
//! The comma-joined server list doubles as the connection's identity in logs
//! and metrics, so two subscribers configured with the same list in the same
//! order report under the same label.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Comma-separated server URLs.
pub const ENV_URL: &str = "JSB_URL";
pub const ENV_CLIENT_NAME: &str = "JSB_CLIENT_NAME";
pub const ENV_USERNAME: &str = "JSB_USERNAME";
pub const ENV_PASSWORD: &str = "JSB_PASSWORD";
pub const ENV_TOKEN: &str = "JSB_TOKEN";
pub const ENV_REQUIRE_TLS: &str = "JSB_REQUIRE_TLS";

pub const DEFAULT_URL: &str = "nats://localhost:4222";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Server URLs, tried in order.
    pub urls: Vec<String>,
    /// Client name advertised to the server.
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub require_tls: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            urls: vec![DEFAULT_URL.to_string()],
            name: None,
            username: None,
            password: None,
            token: None,
            require_tls: false,
        }
    }
}

impl ConnectOptions {
    /// Reads connection settings from `JSB_URL`, `JSB_CLIENT_NAME`,
    /// `JSB_USERNAME`, `JSB_PASSWORD`, `JSB_TOKEN` and `JSB_REQUIRE_TLS`.
    pub fn from_env() -> Self {
        let urls = match std::env::var(ENV_URL) {
            Ok(joined) => {
                let urls: Vec<String> = joined
                    .split(',')
                    .map(|url| url.trim().to_string())
                    .filter(|url| !url.is_empty())
                    .collect();
                if urls.is_empty() {
                    vec![DEFAULT_URL.to_string()]
                } else {
                    urls
                }
            }
            Err(_) => vec![DEFAULT_URL.to_string()],
        };
        Self {
            urls,
            name: std::env::var(ENV_CLIENT_NAME).ok(),
            username: std::env::var(ENV_USERNAME).ok(),
            password: std::env::var(ENV_PASSWORD).ok(),
            token: std::env::var(ENV_TOKEN).ok(),
            require_tls: env_flag(ENV_REQUIRE_TLS),
        }
    }

    /// The comma-joined server list. Used verbatim as the connection's
    /// identity wherever the bridge logs or counts.
    pub fn connected_url(&self) -> String {
        self.urls.join(",")
    }

    /// Connects to the configured servers.
    pub async fn connect(&self) -> Result<async_nats::Client> {
        let url = self.connected_url();
        let mut options = async_nats::ConnectOptions::new().require_tls(self.require_tls);
        if let Some(name) = &self.name {
            options = options.name(name);
        }
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options = options.user_and_password(username.clone(), password.clone());
        }
        if let Some(token) = &self.token {
            options = options.token(token.clone());
        }
        tracing::debug!(url = %url, "connecting to NATS");
        let client = options
            .connect(url.as_str())
            .await
            .with_context(|| format!("connecting to NATS at {url}"))?;
        Ok(client)
    }
}

/// True when the variable is set to `1`, `true`, or `on` (any case).
pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "on"))
        .unwrap_or(false)
}
