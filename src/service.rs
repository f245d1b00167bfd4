// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The attached service and the host that runs it.
//!
//! A service declares its handler with one of two shapes: message only, or
//! message plus [`Caller`]. The shape is fixed when the bridge is built, from
//! [`ServiceHost::declared_params`], and any other parameter count is
//! rejected there. Invocation goes through the [`ServiceHost`] trait so
//! embedders can route calls into their own executor; [`TokioServiceHost`]
//! is the first-party host and runs each call on a spawned task.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use crate::dispatch::CompletionHandle;
use crate::error::BridgeError;
use crate::message::{Caller, StreamMessage};
use crate::Result;

/// Parameter shape of the attached handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerShape {
    /// `(message)`
    SingleArg,
    /// `(message, caller)`
    ArgAndCaller,
}

impl HandlerShape {
    /// Resolves the shape from a declared parameter count. Anything other
    /// than one or two parameters is a configuration error, caught before a
    /// subscription is opened.
    pub fn from_params(params: usize) -> Result<Self, BridgeError> {
        match params {
            1 => Ok(HandlerShape::SingleArg),
            2 => Ok(HandlerShape::ArgAndCaller),
            params => Err(BridgeError::InvalidHandlerSignature { params }),
        }
    }
}

/// One call into the service, already marshalled for its shape.
#[derive(Debug)]
pub enum HandlerCall {
    Message(StreamMessage),
    MessageWithCaller(StreamMessage, Caller),
}

/// Runs handler invocations for the bridge.
///
/// `invoke` must not block and must not run the handler inline; it hands the
/// call to the host's executor and returns. The host signals the outcome
/// through the [`CompletionHandle`], exactly once per call.
pub trait ServiceHost: Send + Sync {
    /// Parameter count of the attached handler, used to resolve the
    /// [`HandlerShape`] when the bridge is built.
    fn declared_params(&self) -> usize;

    /// Starts one handler invocation.
    fn invoke(&self, call: HandlerCall, completion: CompletionHandle);
}

/// A one-parameter service handler.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, message: StreamMessage) -> Result<()>;
}

/// A two-parameter service handler that acknowledges deliveries itself.
#[async_trait]
pub trait CallerHandler: Send + Sync {
    async fn on_message(&self, message: StreamMessage, caller: Caller) -> Result<()>;
}

/// A handler with its shape made explicit.
#[derive(Clone)]
pub enum ServiceHandler {
    Message(Arc<dyn MessageHandler>),
    MessageWithCaller(Arc<dyn CallerHandler>),
}

impl ServiceHandler {
    pub fn params(&self) -> usize {
        match self {
            ServiceHandler::Message(_) => 1,
            ServiceHandler::MessageWithCaller(_) => 2,
        }
    }
}

/// Hosts a [`ServiceHandler`] on the ambient tokio runtime, one spawned task
/// per invocation.
#[derive(Clone)]
pub struct TokioServiceHost {
    handler: ServiceHandler,
}

impl TokioServiceHost {
    pub fn new(handler: ServiceHandler) -> Self {
        Self { handler }
    }

    /// Hosts a one-parameter handler.
    pub fn message<H>(handler: H) -> Self
    where
        H: MessageHandler + 'static,
    {
        Self::new(ServiceHandler::Message(Arc::new(handler)))
    }

    /// Hosts a two-parameter handler.
    pub fn with_caller<H>(handler: H) -> Self
    where
        H: CallerHandler + 'static,
    {
        Self::new(ServiceHandler::MessageWithCaller(Arc::new(handler)))
    }
}

impl ServiceHost for TokioServiceHost {
    fn declared_params(&self) -> usize {
        self.handler.params()
    }

    fn invoke(&self, call: HandlerCall, completion: CompletionHandle) {
        let span = tracing::info_span!(
            "on_message",
            subject = %completion.subject(),
            url = %completion.url(),
        );
        match (&self.handler, call) {
            (ServiceHandler::Message(handler), HandlerCall::Message(message)) => {
                let handler = handler.clone();
                tokio::spawn(
                    async move {
                        match handler.on_message(message).await {
                            Ok(()) => completion.notify_success(),
                            Err(error) => completion.notify_failure(error),
                        }
                    }
                    .instrument(span),
                );
            }
            (
                ServiceHandler::MessageWithCaller(handler),
                HandlerCall::MessageWithCaller(message, caller),
            ) => {
                let handler = handler.clone();
                tokio::spawn(
                    async move {
                        match handler.on_message(message, caller).await {
                            Ok(()) => completion.notify_success(),
                            Err(error) => completion.notify_failure(error),
                        }
                    }
                    .instrument(span),
                );
            }
            (_, call) => {
                // The bridge marshals from the shape this host declared, so a
                // mismatch means the host changed shape after attach.
                completion.notify_failure(crate::error!(
                    "handler shape does not match the dispatched call: {call:?}"
                ));
            }
        }
    }
}
