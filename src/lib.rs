// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! JetStream Bridge
//!
//! Binds a NATS JetStream subscription to an attached service handler. Each
//! delivery is marshaled into a [`StreamMessage`], handed to the service's
//! host scheduler for asynchronous invocation, and the subscription task is
//! held on a per-message completion gate until the handler reports success or
//! failure. This keeps at most one message in flight per subscription and
//! preserves manual-acknowledgement ordering.
//!
//! The crate deliberately owns only the glue: connection management and
//! redelivery belong to [`async_nats`], and handler execution belongs to the
//! injected [`ServiceHost`].

pub use anyhow::{
    Context as ErrorContext, Error, Ok as OK, Result, anyhow as error, bail as raise,
};

pub mod bridge;
pub mod config;
pub mod connect;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod message;
pub mod metrics;
pub mod service;
pub mod subscriber;

pub use bridge::DeliveryBridge;
pub use config::{StartPosition, SubscriberOptions};
pub use connect::ConnectOptions;
pub use dispatch::CompletionHandle;
pub use error::BridgeError;
pub use message::{AckHandle, Caller, Delivery, StreamMessage};
pub use metrics::{MetricsSink, NoopMetrics, PrometheusMetrics};
pub use service::{
    CallerHandler, HandlerCall, HandlerShape, MessageHandler, ServiceHandler, ServiceHost,
    TokioServiceHost,
};
pub use subscriber::{DeliveryStream, SubscriberEndpoint, subscribe};
pub use tokio_util::sync::CancellationToken;
