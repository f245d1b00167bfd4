// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Typed errors for the delivery bridge.
//!
//! Fallible APIs return [`crate::Result`]; the variants below are the
//! categories callers are expected to match on (via downcast) rather than
//! free-form message strings.

use thiserror::Error;

/// Errors raised by the bridge's own contract, as opposed to transport or
/// handler failures which are wrapped with context where they occur.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The attached service's message resource declares a parameter count the
    /// bridge cannot dispatch. Raised when the bridge is constructed, before
    /// any subscription exists.
    #[error("invalid handler signature: expected 1 or 2 parameters, found {params}")]
    InvalidHandlerSignature { params: usize },

    /// The completion handle was dropped without a success or failure signal,
    /// so the delivery task stopped waiting. Processing of that delivery
    /// aborts; its acknowledgement state is whatever the handler and ack mode
    /// had already determined.
    #[error("dispatch interrupted: completion handle dropped without a signal")]
    DispatchInterrupted,

    /// `Caller::ack` was used while the bridge acknowledges deliveries
    /// itself.
    #[error("manual acknowledgement is disabled for this subscription")]
    ManualAckDisabled,
}

impl BridgeError {
    /// Label value used when this error is counted on the dispatch-error
    /// metric.
    pub fn metric_kind(&self) -> &'static str {
        match self {
            BridgeError::InvalidHandlerSignature { .. } => "invalid_signature",
            BridgeError::DispatchInterrupted => "interrupted",
            BridgeError::ManualAckDisabled => "manual_ack_disabled",
        }
    }
}
