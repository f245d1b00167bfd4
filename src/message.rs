// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Message types crossing the bridge.
//!
//! A [`Delivery`] is what the subscription yields: payload, subject, and the
//! transport's acknowledgement handle. The bridge marshals it into the
//! [`StreamMessage`] record handed to the service, plus a [`Caller`] when the
//! handler asked for one.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BridgeError;
use crate::Result;

/// Acknowledges a single delivery back to the transport.
///
/// One handle belongs to one delivery; acknowledging it twice is the
/// implementation's problem to tolerate, which is why [`Caller`] guards
/// against repeats before calling in.
#[async_trait]
pub trait AckHandle: Send + Sync {
    async fn ack(&self) -> Result<()>;
}

/// A message pulled off the subscription, not yet dispatched.
#[derive(Clone)]
pub struct Delivery {
    /// Raw payload bytes.
    pub payload: Bytes,
    /// Subject the message was published on. For wildcard subscriptions this
    /// is narrower than the subscription's own subject.
    pub subject: String,
    acker: Arc<dyn AckHandle>,
}

impl Delivery {
    pub fn new(payload: Bytes, subject: impl Into<String>, acker: Arc<dyn AckHandle>) -> Self {
        Self {
            payload,
            subject: subject.into(),
            acker,
        }
    }

    /// The acknowledgement handle for this delivery.
    pub fn acker(&self) -> Arc<dyn AckHandle> {
        self.acker.clone()
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("subject", &self.subject)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// The record handed to the attached service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    /// Raw payload bytes.
    pub payload: Bytes,
    /// Subject the message was published on.
    pub subject: String,
}

impl StreamMessage {
    pub fn new(payload: Bytes, subject: impl Into<String>) -> Self {
        Self {
            payload,
            subject: subject.into(),
        }
    }
}

/// Lets a two-parameter handler acknowledge the delivery itself.
///
/// Only constructed when the subscription runs with manual acknowledgement;
/// in automatic mode [`Caller::ack`] refuses so a handler written for the
/// wrong mode fails loudly instead of double-acking.
pub struct Caller {
    acker: Arc<dyn AckHandle>,
    manual_ack: bool,
    acked: AtomicBool,
}

impl Caller {
    pub(crate) fn new(acker: Arc<dyn AckHandle>, manual_ack: bool) -> Self {
        Self {
            acker,
            manual_ack,
            acked: AtomicBool::new(false),
        }
    }

    /// Whether this subscription expects the handler to acknowledge.
    pub fn manual_ack(&self) -> bool {
        self.manual_ack
    }

    /// Acknowledges the delivery.
    ///
    /// Returns [`BridgeError::ManualAckDisabled`] when the subscription
    /// acknowledges automatically. A second call on the same delivery is a
    /// no-op.
    pub async fn ack(&self) -> Result<()> {
        if !self.manual_ack {
            return Err(BridgeError::ManualAckDisabled.into());
        }
        if self.acked.swap(true, Ordering::SeqCst) {
            tracing::debug!("duplicate ack ignored");
            return Ok(());
        }
        self.acker.ack().await
    }
}

impl fmt::Debug for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caller")
            .field("manual_ack", &self.manual_ack)
            .field("acked", &self.acked.load(Ordering::SeqCst))
            .finish()
    }
}
