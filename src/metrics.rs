// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Delivery metrics reported by the bridge.
//!
//! The bridge records two events per message: a consume when the message is
//! pulled off the subscription, and a delivery when the attached handler
//! signals success. Dispatch errors get their own counter with a `kind`
//! label. The sink is injected so embedders can route these events into
//! whatever registry the host process already runs; [`PrometheusMetrics`] is
//! the first-party implementation and [`NoopMetrics`] is for tests and
//! metrics-free deployments.

use prometheus::{IntCounterVec, Opts, Registry};

use crate::Result;

/// Metric names as they appear in the registry.
pub mod names {
    /// Messages pulled off the subscription, before dispatch.
    pub const MESSAGES_CONSUMED: &str = "bridge_messages_consumed_total";
    /// Payload bytes pulled off the subscription.
    pub const CONSUMED_BYTES: &str = "bridge_consumed_bytes_total";
    /// Messages whose handler signalled success.
    pub const DELIVERIES: &str = "bridge_deliveries_total";
    /// Dispatches that ended in a handler failure or an interruption.
    pub const DISPATCH_ERRORS: &str = "bridge_dispatch_errors_total";
}

/// Receives delivery events from the bridge.
///
/// Implementations must be cheap; every message crosses this trait twice on
/// the hot path.
pub trait MetricsSink: Send + Sync {
    /// A message arrived on the subscription. `subject` is the subject the
    /// subscription was configured with, not the per-message subject.
    fn report_consume(&self, url: &str, subject: &str, bytes: usize);

    /// The handler for a message signalled success. `subject` is the subject
    /// the message was published on.
    fn report_delivery(&self, url: &str, subject: &str);

    /// A dispatch ended without a success signal. `kind` is a low-cardinality
    /// category such as `handler` or `interrupted`.
    fn report_dispatch_error(&self, url: &str, subject: &str, kind: &str);
}

/// Prometheus-backed [`MetricsSink`] labelled by connection URL and subject.
#[derive(Clone)]
pub struct PrometheusMetrics {
    messages_consumed: IntCounterVec,
    consumed_bytes: IntCounterVec,
    deliveries: IntCounterVec,
    dispatch_errors: IntCounterVec,
}

impl PrometheusMetrics {
    /// Creates the bridge counters and registers them with `registry`.
    ///
    /// Registration fails if another collector already claimed one of the
    /// [`names`], so build one sink per registry and clone it.
    pub fn new(registry: &Registry) -> Result<Self> {
        let messages_consumed = IntCounterVec::new(
            Opts::new(
                names::MESSAGES_CONSUMED,
                "Messages pulled off the subscription",
            ),
            &["url", "subject"],
        )?;
        let consumed_bytes = IntCounterVec::new(
            Opts::new(
                names::CONSUMED_BYTES,
                "Payload bytes pulled off the subscription",
            ),
            &["url", "subject"],
        )?;
        let deliveries = IntCounterVec::new(
            Opts::new(names::DELIVERIES, "Messages delivered to the handler"),
            &["url", "subject"],
        )?;
        let dispatch_errors = IntCounterVec::new(
            Opts::new(
                names::DISPATCH_ERRORS,
                "Dispatches that ended without a success signal",
            ),
            &["url", "subject", "kind"],
        )?;

        registry.register(Box::new(messages_consumed.clone()))?;
        registry.register(Box::new(consumed_bytes.clone()))?;
        registry.register(Box::new(deliveries.clone()))?;
        registry.register(Box::new(dispatch_errors.clone()))?;

        Ok(Self {
            messages_consumed,
            consumed_bytes,
            deliveries,
            dispatch_errors,
        })
    }
}

impl MetricsSink for PrometheusMetrics {
    fn report_consume(&self, url: &str, subject: &str, bytes: usize) {
        self.messages_consumed
            .with_label_values(&[url, subject])
            .inc();
        self.consumed_bytes
            .with_label_values(&[url, subject])
            .inc_by(bytes as u64);
    }

    fn report_delivery(&self, url: &str, subject: &str) {
        self.deliveries.with_label_values(&[url, subject]).inc();
    }

    fn report_dispatch_error(&self, url: &str, subject: &str, kind: &str) {
        self.dispatch_errors
            .with_label_values(&[url, subject, kind])
            .inc();
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn report_consume(&self, _url: &str, _subject: &str, _bytes: usize) {}
    fn report_delivery(&self, _url: &str, _subject: &str) {}
    fn report_dispatch_error(&self, _url: &str, _subject: &str, _kind: &str) {}
}
