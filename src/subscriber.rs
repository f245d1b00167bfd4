// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The subscription endpoint and its delivery loop.
//!
//! [`subscribe`] opens a JetStream pull consumer and adapts it into a
//! [`DeliveryStream`]; [`SubscriberEndpoint::start`] drives that stream
//! through a [`DeliveryBridge`] one message at a time. Deliveries are
//! serialized per subscription: the next message is not pulled until the
//! previous one's handler has signalled.

use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use async_nats::jetstream::consumer::{pull, AckPolicy, DeliverPolicy};
use async_nats::jetstream::{self, message::Acker};
use async_trait::async_trait;
use derive_builder::Builder;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::bridge::DeliveryBridge;
use crate::config::{StartPosition, SubscriberOptions};
use crate::message::{AckHandle, Delivery};
use crate::Result;

/// Stream of deliveries feeding an endpoint. Stream-level failures come
/// through as `Err` items and do not end the stream.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery>> + Send>>;

/// Drives one subscription through its bridge until cancelled or the stream
/// ends.
#[derive(Builder)]
pub struct SubscriberEndpoint {
    bridge: Arc<DeliveryBridge>,
    cancellation_token: CancellationToken,
    /// When set, a dispatch in flight at cancellation time is awaited before
    /// the loop exits; otherwise the loop stops waiting and leaves the
    /// handler task to finish on its own, unacknowledged.
    #[builder(default = "true")]
    graceful_drain: bool,
}

impl SubscriberEndpoint {
    pub fn builder() -> SubscriberEndpointBuilder {
        SubscriberEndpointBuilder::default()
    }

    /// Runs the delivery loop.
    ///
    /// One delivery at a time: pull, dispatch through the bridge, wait for
    /// the completion signal, acknowledge unless the subscription is manual,
    /// repeat. Stream errors and interrupted dispatches are logged and the
    /// loop moves on; only cancellation or stream end stop it.
    pub async fn start(self, mut deliveries: DeliveryStream) -> Result<()> {
        tracing::info!(
            url = self.bridge.connected_url(),
            subject = self.bridge.subject(),
            manual_ack = self.bridge.manual_ack(),
            "subscriber endpoint started"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::debug!("subscriber endpoint cancelled");
                    break;
                }
                next = deliveries.next() => next,
            };
            let Some(next) = next else {
                tracing::info!("delivery stream ended");
                break;
            };
            let delivery = match next {
                Ok(delivery) => delivery,
                Err(error) => {
                    tracing::warn!("delivery stream error: {error:#}");
                    continue;
                }
            };

            let acker = delivery.acker();
            let dispatched = if self.graceful_drain {
                self.bridge.on_message(delivery).await
            } else {
                tokio::select! {
                    biased;
                    _ = self.cancellation_token.cancelled() => {
                        tracing::debug!("cancelled with a dispatch in flight");
                        break;
                    }
                    dispatched = self.bridge.on_message(delivery) => dispatched,
                }
            };

            match dispatched {
                Ok(()) => {
                    if !self.bridge.manual_ack() {
                        if let Err(error) = acker.ack().await {
                            tracing::warn!("failed to acknowledge delivery: {error:#}");
                        }
                    }
                }
                Err(error) => {
                    tracing::error!("delivery aborted without a completion signal: {error:#}");
                }
            }
        }

        tracing::info!(
            url = self.bridge.connected_url(),
            subject = self.bridge.subject(),
            "subscriber endpoint stopped"
        );
        Ok(())
    }
}

/// Opens a pull consumer for `options` and returns its deliveries.
///
/// With a durable name the consumer is fetched or created under that name,
/// so restarts resume from the recorded position; without one the consumer
/// is ephemeral and positioned by `options.start_position`.
pub async fn subscribe(
    client: async_nats::Client,
    options: &SubscriberOptions,
) -> Result<DeliveryStream> {
    options.validate()?;

    let jetstream = jetstream::new(client);
    let stream = jetstream
        .get_stream(&options.stream)
        .await
        .with_context(|| format!("looking up stream {}", options.stream))?;

    tracing::info!(
        stream = %options.stream,
        subject = %options.subject,
        durable = options.durable_name.as_deref().unwrap_or("<ephemeral>"),
        "opening pull consumer"
    );

    let config = pull_config(options);
    let consumer = match &options.durable_name {
        Some(name) => stream
            .get_or_create_consumer(name, config)
            .await
            .with_context(|| format!("creating durable consumer {name}"))?,
        None => stream
            .create_consumer(config)
            .await
            .context("creating ephemeral consumer")?,
    };

    let messages = consumer
        .messages()
        .await
        .context("starting pull subscription")?;

    let deliveries = messages.map(|item| match item {
        Ok(message) => {
            let (message, acker) = message.split();
            Ok(Delivery::new(
                message.payload,
                message.subject.to_string(),
                Arc::new(JetStreamAck(acker)),
            ))
        }
        Err(error) => Err(crate::error!("pull subscription failed: {error}")),
    });
    Ok(Box::pin(deliveries))
}

fn pull_config(options: &SubscriberOptions) -> pull::Config {
    pull::Config {
        durable_name: options.durable_name.clone(),
        filter_subject: options.subject.clone(),
        ack_policy: AckPolicy::Explicit,
        ack_wait: options.ack_wait(),
        max_ack_pending: options.max_in_flight,
        deliver_policy: DeliverPolicy::from(&options.start_position),
        ..Default::default()
    }
}

impl From<&StartPosition> for DeliverPolicy {
    fn from(position: &StartPosition) -> Self {
        match position {
            StartPosition::NewOnly => DeliverPolicy::New,
            StartPosition::LastReceived => DeliverPolicy::Last,
            StartPosition::First => DeliverPolicy::All,
            StartPosition::Sequence(sequence) => DeliverPolicy::ByStartSequence {
                start_sequence: *sequence,
            },
            StartPosition::TimeDeltaSecs(secs) => {
                let delta = i64::try_from(*secs)
                    .map(time::Duration::seconds)
                    .unwrap_or(time::Duration::MAX);
                // A delta reaching past representable time means replay from
                // the beginning; the epoch predates any stream.
                let start_time = time::OffsetDateTime::now_utc()
                    .checked_sub(delta)
                    .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
                DeliverPolicy::ByStartTime { start_time }
            }
        }
    }
}

struct JetStreamAck(Acker);

#[async_trait]
impl AckHandle for JetStreamAck {
    async fn ack(&self) -> Result<()> {
        self.0
            .ack()
            .await
            .map_err(|error| crate::error!("acknowledging jetstream message: {error}"))
    }
}
