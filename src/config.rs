// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Subscription configuration.
//!
//! Options layer in the usual order: built-in defaults, then an optional TOML
//! file named by `JSB_CONFIG_PATH`, then `JSB_`-prefixed environment
//! variables. `JSB_STREAM=ORDERS JSB_SUBJECT=orders.created` is enough for a
//! minimal subscriber.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Environment prefix for subscriber options.
pub const ENV_PREFIX: &str = "JSB_";
/// Optional path to a TOML file layered under the environment.
pub const ENV_CONFIG_PATH: &str = "JSB_CONFIG_PATH";

pub const DEFAULT_ACK_WAIT_SECS: u64 = 30;
pub const DEFAULT_MAX_IN_FLIGHT: i64 = 1024;

/// Where a newly created consumer starts reading the stream.
///
/// Stored in config as a string: `new_only`, `last_received`, `first`,
/// `sequence:<n>`, or `time_delta:<seconds>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StartPosition {
    /// Only messages published after the consumer exists.
    #[default]
    NewOnly,
    /// Start from the last message on the stream.
    LastReceived,
    /// Replay the stream from its first message.
    First,
    /// Start from an absolute stream sequence.
    Sequence(u64),
    /// Start from `now - delta` seconds.
    TimeDeltaSecs(u64),
}

impl FromStr for StartPosition {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        if let Some(seq) = lowered.strip_prefix("sequence:") {
            let seq: u64 = seq
                .parse()
                .map_err(|_| crate::error!("invalid start sequence: {seq}"))?;
            return Ok(StartPosition::Sequence(seq));
        }
        if let Some(delta) = lowered.strip_prefix("time_delta:") {
            let delta: u64 = delta
                .parse()
                .map_err(|_| crate::error!("invalid start time delta: {delta}"))?;
            return Ok(StartPosition::TimeDeltaSecs(delta));
        }
        match lowered.as_str() {
            "new_only" => Ok(StartPosition::NewOnly),
            "last_received" => Ok(StartPosition::LastReceived),
            "first" => Ok(StartPosition::First),
            other => Err(crate::error!("unrecognized start position: {other}")),
        }
    }
}

impl fmt::Display for StartPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartPosition::NewOnly => write!(f, "new_only"),
            StartPosition::LastReceived => write!(f, "last_received"),
            StartPosition::First => write!(f, "first"),
            StartPosition::Sequence(seq) => write!(f, "sequence:{seq}"),
            StartPosition::TimeDeltaSecs(secs) => write!(f, "time_delta:{secs}"),
        }
    }
}

impl TryFrom<String> for StartPosition {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StartPosition> for String {
    fn from(value: StartPosition) -> Self {
        value.to_string()
    }
}

/// Options for one stream subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberOptions {
    /// Stream to consume from.
    pub stream: String,
    /// Subject filter within the stream. May contain wildcards.
    pub subject: String,
    /// Durable consumer name. With a name, position survives restarts and
    /// instances sharing the name split the subject's messages between them;
    /// without one the consumer is ephemeral.
    pub durable_name: Option<String>,
    /// When set, the attached handler acknowledges through its `Caller` and
    /// the bridge never acks on its own.
    pub manual_ack: bool,
    /// How long the server waits for an ack before redelivering.
    pub ack_wait_secs: u64,
    /// Upper bound on deliveries awaiting ack on the server side.
    pub max_in_flight: i64,
    /// Where a newly created consumer starts reading.
    pub start_position: StartPosition,
}

impl Default for SubscriberOptions {
    fn default() -> Self {
        Self {
            stream: String::new(),
            subject: String::new(),
            durable_name: None,
            manual_ack: false,
            ack_wait_secs: DEFAULT_ACK_WAIT_SECS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            start_position: StartPosition::default(),
        }
    }
}

impl SubscriberOptions {
    /// Loads options from the environment, with a `JSB_CONFIG_PATH` TOML file
    /// layered beneath the `JSB_*` variables when present.
    pub fn from_env() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = std::env::var_os(ENV_CONFIG_PATH) {
            figment = figment.merge(Toml::file(path));
        }
        let options: Self = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        options.validate()?;
        Ok(options)
    }

    /// Rejects option sets that cannot name or position a consumer.
    pub fn validate(&self) -> Result<()> {
        if self.stream.is_empty() {
            crate::raise!("subscriber options missing a stream name");
        }
        if self.subject.is_empty() {
            crate::raise!("subscriber options missing a subject");
        }
        if self.ack_wait_secs == 0 {
            crate::raise!("ack_wait_secs must be positive");
        }
        if self.max_in_flight <= 0 {
            crate::raise!("max_in_flight must be positive");
        }
        if let StartPosition::TimeDeltaSecs(secs) = &self.start_position {
            if i64::try_from(*secs).is_err() {
                crate::raise!("time_delta start position does not fit a signed offset: {secs}");
            }
        }
        Ok(())
    }

    pub fn ack_wait(&self) -> Duration {
        Duration::from_secs(self.ack_wait_secs)
    }
}
