// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Tracing setup.
//!
//! `JSB_LOG` sets the default level, an optional TOML file named by
//! `JSB_LOGGING_CONFIG_PATH` adds per-target filters, and `JSB_LOG_JSONL`
//! switches the format to one JSON object per line for log shippers.

use std::collections::BTreeMap;
use std::sync::Once;

use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::connect::env_flag;

pub const ENV_LOG: &str = "JSB_LOG";
pub const ENV_LOG_JSONL: &str = "JSB_LOG_JSONL";
pub const ENV_LOGGING_CONFIG_PATH: &str = "JSB_LOGGING_CONFIG_PATH";

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for targets without an explicit filter.
    pub log_level: String,
    /// Per-target levels, keyed by tracing target prefix.
    pub log_filters: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut log_filters = BTreeMap::new();
        // The client logs every reconnect attempt at warn; too chatty for a
        // default.
        log_filters.insert("async_nats".to_string(), "error".to_string());
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_filters,
        }
    }
}

impl LoggingConfig {
    /// Layered defaults, then the `JSB_LOGGING_CONFIG_PATH` file, then
    /// `JSB_LOG`.
    pub fn from_env() -> Self {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = std::env::var_os(ENV_LOGGING_CONFIG_PATH) {
            figment = figment.merge(Toml::file(path));
        }
        let mut config: Self = match figment.extract() {
            Ok(config) => config,
            Err(error) => {
                eprintln!("invalid logging config, using defaults: {error}");
                Self::default()
            }
        };
        if let Ok(level) = std::env::var(ENV_LOG) {
            config.log_level = level;
        }
        config
    }

    /// Renders the config as an `EnvFilter` directive string.
    fn directives(&self) -> String {
        let mut directives = vec![self.log_level.clone()];
        for (target, level) in &self.log_filters {
            directives.push(format!("{target}={level}"));
        }
        directives.join(",")
    }
}

static INIT: Once = Once::new();

/// Installs the global tracing subscriber. Later calls are no-ops, so
/// libraries and binaries can both call this without coordinating.
pub fn init() {
    INIT.call_once(|| {
        let config = LoggingConfig::from_env();
        let filter = EnvFilter::new(config.directives());
        if env_flag(ENV_LOG_JSONL) {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        } else {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    });
}
