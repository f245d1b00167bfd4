// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The delivery bridge.
//!
//! One bridge connects one subscription to one attached service. For every
//! delivery it records the consume, marshals the payload into the service's
//! record type, hands the call to the [`ServiceHost`], and waits for the
//! completion signal before letting the subscription move on. A handler
//! failure is logged and counted but does not surface to the subscription;
//! only an interrupted dispatch does.

use std::fmt;
use std::sync::Arc;

use crate::dispatch;
use crate::message::{Caller, Delivery, StreamMessage};
use crate::metrics::MetricsSink;
use crate::service::{HandlerCall, HandlerShape, ServiceHost};
use crate::Result;

pub struct DeliveryBridge {
    host: Arc<dyn ServiceHost>,
    shape: HandlerShape,
    manual_ack: bool,
    connected_url: Arc<str>,
    subject: Arc<str>,
    metrics: Arc<dyn MetricsSink>,
}

impl DeliveryBridge {
    /// Binds a service host to a subscription identity.
    ///
    /// Resolves the handler shape here, once; a host declaring anything other
    /// than one or two parameters fails the attach with
    /// [`BridgeError::InvalidHandlerSignature`](crate::BridgeError) before a
    /// single message is pulled.
    ///
    /// `connected_url` is the comma-joined server list used as the metric and
    /// log identity of the connection. `subject` is the subject the
    /// subscription is configured with.
    pub fn new(
        host: Arc<dyn ServiceHost>,
        manual_ack: bool,
        connected_url: impl Into<Arc<str>>,
        subject: impl Into<Arc<str>>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        let shape = HandlerShape::from_params(host.declared_params())?;
        Ok(Self {
            host,
            shape,
            manual_ack,
            connected_url: connected_url.into(),
            subject: subject.into(),
            metrics,
        })
    }

    /// Runs one delivery through the attached service.
    ///
    /// Returns `Ok(())` when the handler signalled, whether success or
    /// failure; the failure was already logged and counted where it happened.
    /// Returns an error only when the dispatch was interrupted, in which case
    /// the delivery was not acknowledged by the bridge.
    pub async fn on_message(&self, delivery: Delivery) -> Result<()> {
        self.metrics.report_consume(
            &self.connected_url,
            &self.subject,
            delivery.payload.len(),
        );
        tracing::trace!(
            subject = %delivery.subject,
            bytes = delivery.payload.len(),
            "dispatching delivery"
        );

        let message = StreamMessage::new(delivery.payload.clone(), delivery.subject.clone());
        let call = match self.shape {
            HandlerShape::SingleArg => HandlerCall::Message(message),
            HandlerShape::ArgAndCaller => HandlerCall::MessageWithCaller(
                message,
                Caller::new(delivery.acker(), self.manual_ack),
            ),
        };

        // Deliveries are counted against the subject the message arrived on,
        // which for wildcard subscriptions differs from the configured one.
        let subject: Arc<str> = Arc::from(delivery.subject.as_str());
        let (completion, gate) =
            dispatch::gate(self.metrics.clone(), self.connected_url.clone(), subject.clone());

        self.host.invoke(call, completion);

        match gate.wait().await {
            Ok(_) => Ok(()),
            Err(error) => {
                self.metrics.report_dispatch_error(
                    &self.connected_url,
                    &subject,
                    error.metric_kind(),
                );
                Err(error.into())
            }
        }
    }

    /// Shape resolved from the attached host.
    pub fn shape(&self) -> HandlerShape {
        self.shape
    }

    /// Whether the attached service acknowledges deliveries itself.
    pub fn manual_ack(&self) -> bool {
        self.manual_ack
    }

    /// Subject this bridge's subscription is configured with.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Comma-joined server list identifying the connection.
    pub fn connected_url(&self) -> &str {
        &self.connected_url
    }
}

impl fmt::Debug for DeliveryBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryBridge")
            .field("connected_url", &self.connected_url)
            .field("subject", &self.subject)
            .field("shape", &self.shape)
            .field("manual_ack", &self.manual_ack)
            .finish()
    }
}
