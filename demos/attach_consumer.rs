// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Minimal subscriber: attaches a logging handler to a JetStream stream.
//!
//! Point it at a nats-server with JetStream enabled and an existing stream:
//!
//! ```text
//! JSB_URL=nats://localhost:4222 JSB_STREAM=ORDERS JSB_SUBJECT='orders.>' \
//!     JSB_DURABLE_NAME=order-logger cargo run --example attach_consumer
//! ```
//!
//! Ctrl-C drains the in-flight dispatch and prints the final counters.

use std::sync::Arc;

use async_trait::async_trait;
use jetstream_bridge::{
    logging, subscribe, CancellationToken, ConnectOptions, DeliveryBridge, MessageHandler,
    PrometheusMetrics, Result, StreamMessage, SubscriberEndpoint, SubscriberOptions,
    TokioServiceHost,
};

struct OrderLogger;

#[async_trait]
impl MessageHandler for OrderLogger {
    async fn on_message(&self, message: StreamMessage) -> Result<()> {
        tracing::info!(
            subject = %message.subject,
            bytes = message.payload.len(),
            "order received"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let connect = ConnectOptions::from_env();
    let options = SubscriberOptions::from_env()?;
    let client = connect.connect().await?;

    let registry = prometheus::Registry::new();
    let metrics = Arc::new(PrometheusMetrics::new(&registry)?);

    let bridge = Arc::new(DeliveryBridge::new(
        Arc::new(TokioServiceHost::message(OrderLogger)),
        options.manual_ack,
        connect.connected_url(),
        options.subject.clone(),
        metrics,
    )?);

    let deliveries = subscribe(client, &options).await?;

    let token = CancellationToken::new();
    let endpoint = SubscriberEndpoint::builder()
        .bridge(bridge)
        .cancellation_token(token.clone())
        .build()?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down");
            token.cancel();
        }
    });

    endpoint.start(deliveries).await?;

    for family in registry.gather() {
        for metric in family.get_metric() {
            tracing::info!(
                name = family.get_name(),
                value = metric.get_counter().get_value(),
                "final count"
            );
        }
    }
    Ok(())
}
