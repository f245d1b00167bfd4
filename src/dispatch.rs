// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-message completion signalling.
//!
//! Every dispatch pairs a [`CompletionHandle`] given to the service host with
//! a [`DispatchGate`] the delivery task awaits. Exactly one signal flows
//! through the pair; a handle dropped without signalling resolves the gate to
//! [`BridgeError::DispatchInterrupted`] so a crashed host cannot wedge the
//! subscription.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::BridgeError;
use crate::metrics::MetricsSink;

/// Outcome of one handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Success,
    Failure,
}

/// Handed to the service host along with the call; the host must consume it
/// with [`notify_success`](CompletionHandle::notify_success) or
/// [`notify_failure`](CompletionHandle::notify_failure) when the handler
/// finishes.
pub struct CompletionHandle {
    tx: Option<oneshot::Sender<Completion>>,
    metrics: Arc<dyn MetricsSink>,
    url: Arc<str>,
    subject: Arc<str>,
}

impl CompletionHandle {
    /// Connection identity of the subscription this dispatch belongs to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subject the message was published on.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The handler returned normally. Records the delivery and releases the
    /// delivery task.
    pub fn notify_success(mut self) {
        self.metrics.report_delivery(&self.url, &self.subject);
        self.send(Completion::Success);
    }

    /// The handler failed. Logs and counts the failure, then releases the
    /// delivery task; the message is not redelivered by the bridge itself.
    pub fn notify_failure(mut self, error: crate::Error) {
        tracing::error!(
            url = %self.url,
            subject = %self.subject,
            "handler failed: {error:#}"
        );
        self.metrics
            .report_dispatch_error(&self.url, &self.subject, "handler");
        self.send(Completion::Failure);
    }

    fn send(&mut self, completion: Completion) {
        if let Some(tx) = self.tx.take() {
            if tx.send(completion).is_err() {
                tracing::debug!(
                    subject = %self.subject,
                    "delivery task stopped waiting before completion"
                );
            }
        }
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!(
                url = %self.url,
                subject = %self.subject,
                "completion handle dropped without a signal"
            );
        }
    }
}

/// Awaited by the delivery task; resolves when the matching handle signals.
pub(crate) struct DispatchGate {
    rx: oneshot::Receiver<Completion>,
}

impl DispatchGate {
    pub(crate) async fn wait(self) -> Result<Completion, BridgeError> {
        self.rx.await.map_err(|_| BridgeError::DispatchInterrupted)
    }
}

/// Builds the handle/gate pair for one dispatch.
pub(crate) fn gate(
    metrics: Arc<dyn MetricsSink>,
    url: Arc<str>,
    subject: Arc<str>,
) -> (CompletionHandle, DispatchGate) {
    let (tx, rx) = oneshot::channel();
    let handle = CompletionHandle {
        tx: Some(tx),
        metrics,
        url,
        subject,
    };
    (handle, DispatchGate { rx })
}
