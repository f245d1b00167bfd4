// SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end dispatch behavior of the bridge: marshalling, metric identity,
//! failure swallowing, completion waiting, and caller acknowledgement.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use jetstream_bridge::{
    AckHandle, BridgeError, Caller, CallerHandler, CompletionHandle, Delivery, DeliveryBridge,
    HandlerCall, MessageHandler, MetricsSink, Result, ServiceHost, StreamMessage, TokioServiceHost,
};

const URL: &str = "nats://east:4222,nats://west:4222";
const CONFIGURED_SUBJECT: &str = "orders.>";

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl MetricsSink for RecordingSink {
    fn report_consume(&self, url: &str, subject: &str, bytes: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("consume {url} {subject} {bytes}"));
    }
    fn report_delivery(&self, url: &str, subject: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("delivery {url} {subject}"));
    }
    fn report_dispatch_error(&self, url: &str, subject: &str, kind: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("error {url} {subject} {kind}"));
    }
}

#[derive(Default)]
struct RecordingAck {
    acks: AtomicUsize,
}

#[async_trait]
impl AckHandle for RecordingAck {
    async fn ack(&self) -> Result<()> {
        self.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn delivery(subject: &str, payload: &[u8], acker: Arc<RecordingAck>) -> Delivery {
    Delivery::new(Bytes::copy_from_slice(payload), subject, acker)
}

fn bridge(
    host: Arc<dyn ServiceHost>,
    manual_ack: bool,
    sink: Arc<RecordingSink>,
) -> DeliveryBridge {
    DeliveryBridge::new(host, manual_ack, URL, CONFIGURED_SUBJECT, sink).unwrap()
}

#[derive(Default, Clone)]
struct Seen {
    messages: Arc<Mutex<Vec<StreamMessage>>>,
}

#[async_trait]
impl MessageHandler for Seen {
    async fn on_message(&self, message: StreamMessage) -> Result<()> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

#[tokio::test]
async fn test_single_arg_handler_gets_the_marshalled_record() {
    let sink = Arc::new(RecordingSink::default());
    let seen = Seen::default();
    let host = Arc::new(TokioServiceHost::message(seen.clone()));
    let bridge = bridge(host, false, sink.clone());
    let acker = Arc::new(RecordingAck::default());

    bridge
        .on_message(delivery("orders.created.42", b"hi", acker))
        .await
        .unwrap();

    let messages = seen.messages.lock().unwrap().clone();
    assert_eq!(
        messages,
        vec![StreamMessage::new(
            Bytes::from_static(b"hi"),
            "orders.created.42"
        )]
    );
    // Consume counts against the configured subject, delivery against the
    // subject the message actually arrived on.
    assert_eq!(
        sink.take(),
        vec![
            format!("consume {URL} {CONFIGURED_SUBJECT} 2"),
            format!("delivery {URL} orders.created.42"),
        ]
    );
}

struct Failing;

#[async_trait]
impl MessageHandler for Failing {
    async fn on_message(&self, _message: StreamMessage) -> Result<()> {
        Err(anyhow::anyhow!("downstream unavailable"))
    }
}

#[tokio::test]
async fn test_handler_failure_is_swallowed_and_counted() {
    let sink = Arc::new(RecordingSink::default());
    let host = Arc::new(TokioServiceHost::message(Failing));
    let bridge = bridge(host, false, sink.clone());
    let acker = Arc::new(RecordingAck::default());

    let result = bridge
        .on_message(delivery("orders.created.7", b"x", acker))
        .await;

    assert!(result.is_ok(), "handler failures must not escape dispatch");
    assert_eq!(
        sink.take(),
        vec![
            format!("consume {URL} {CONFIGURED_SUBJECT} 1"),
            format!("error {URL} orders.created.7 handler"),
        ]
    );
}

struct FixedParams(usize);

impl ServiceHost for FixedParams {
    fn declared_params(&self) -> usize {
        self.0
    }
    fn invoke(&self, _call: HandlerCall, completion: CompletionHandle) {
        completion.notify_success();
    }
}

#[tokio::test]
async fn test_attach_rejects_unsupported_shapes() {
    for params in [0usize, 3, 5] {
        let sink = Arc::new(RecordingSink::default());
        let result = DeliveryBridge::new(
            Arc::new(FixedParams(params)),
            false,
            URL,
            CONFIGURED_SUBJECT,
            sink,
        );
        let err = result.err().expect("shape must be rejected at attach");
        assert_eq!(
            err.downcast_ref::<BridgeError>(),
            Some(&BridgeError::InvalidHandlerSignature { params })
        );
    }
}

/// Captures the completion handle instead of signalling, so tests control
/// when the dispatch resolves.
#[derive(Default)]
struct CapturingHost {
    completion: Mutex<Option<CompletionHandle>>,
}

impl ServiceHost for CapturingHost {
    fn declared_params(&self) -> usize {
        1
    }
    fn invoke(&self, _call: HandlerCall, completion: CompletionHandle) {
        *self.completion.lock().unwrap() = Some(completion);
    }
}

#[tokio::test]
async fn test_dispatch_waits_for_the_completion_signal() {
    let sink = Arc::new(RecordingSink::default());
    let host = Arc::new(CapturingHost::default());
    let bridge = Arc::new(bridge(host.clone(), false, sink.clone()));
    let acker = Arc::new(RecordingAck::default());

    let in_flight = {
        let bridge = bridge.clone();
        let delivery = delivery("orders.created.1", b"abc", acker);
        tokio::spawn(async move { bridge.on_message(delivery).await })
    };

    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    assert!(
        !in_flight.is_finished(),
        "dispatch must not resolve before the handler signals"
    );

    let completion = host
        .completion
        .lock()
        .unwrap()
        .take()
        .expect("host should have been invoked");
    completion.notify_success();

    in_flight.await.unwrap().unwrap();
    assert_eq!(
        sink.take(),
        vec![
            format!("consume {URL} {CONFIGURED_SUBJECT} 3"),
            format!("delivery {URL} orders.created.1"),
        ]
    );
}

/// Parks every dispatch, keeping its record and completion handle.
#[derive(Default)]
struct ParkingHost {
    parked: Mutex<Vec<(StreamMessage, CompletionHandle)>>,
}

impl ServiceHost for ParkingHost {
    fn declared_params(&self) -> usize {
        1
    }
    fn invoke(&self, call: HandlerCall, completion: CompletionHandle) {
        if let HandlerCall::Message(message) = call {
            self.parked.lock().unwrap().push((message, completion));
        }
    }
}

fn take_parked(host: &ParkingHost, subject: &str) -> CompletionHandle {
    let mut parked = host.parked.lock().unwrap();
    let index = parked
        .iter()
        .position(|(message, _)| message.subject == subject)
        .expect("a dispatch should be parked for the subject");
    parked.remove(index).1
}

#[tokio::test]
async fn test_in_flight_dispatches_resolve_independently() {
    let sink = Arc::new(RecordingSink::default());
    let host = Arc::new(ParkingHost::default());
    let bridge = Arc::new(bridge(host.clone(), false, sink.clone()));

    let first = {
        let bridge = bridge.clone();
        let delivery = delivery("orders.created.1", b"one", Arc::new(RecordingAck::default()));
        tokio::spawn(async move { bridge.on_message(delivery).await })
    };
    let second = {
        let bridge = bridge.clone();
        let delivery = delivery("orders.created.2", b"two", Arc::new(RecordingAck::default()));
        tokio::spawn(async move { bridge.on_message(delivery).await })
    };

    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    // Both dispatches sit in flight, each with its own record.
    {
        let parked = host.parked.lock().unwrap();
        assert_eq!(parked.len(), 2);
        for (subject, payload) in [("orders.created.1", b"one"), ("orders.created.2", b"two")] {
            let record = parked
                .iter()
                .map(|(message, _)| message)
                .find(|message| message.subject == subject)
                .expect("each dispatch should carry its own record");
            assert_eq!(record.payload, Bytes::from_static(payload));
        }
    }
    assert!(!first.is_finished());
    assert!(!second.is_finished());

    // Signalling the later dispatch releases only that one.
    take_parked(&host, "orders.created.2").notify_success();
    second.await.unwrap().unwrap();
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    assert!(
        !first.is_finished(),
        "the first dispatch must wait for its own signal"
    );

    take_parked(&host, "orders.created.1").notify_success();
    first.await.unwrap().unwrap();

    assert_eq!(
        sink.take(),
        vec![
            format!("consume {URL} {CONFIGURED_SUBJECT} 3"),
            format!("consume {URL} {CONFIGURED_SUBJECT} 3"),
            format!("delivery {URL} orders.created.2"),
            format!("delivery {URL} orders.created.1"),
        ]
    );
}

/// Drops the completion handle without signalling.
struct VanishingHost;

impl ServiceHost for VanishingHost {
    fn declared_params(&self) -> usize {
        1
    }
    fn invoke(&self, _call: HandlerCall, completion: CompletionHandle) {
        drop(completion);
    }
}

#[tokio::test]
async fn test_dropped_completion_surfaces_as_interrupted() {
    let sink = Arc::new(RecordingSink::default());
    let bridge = bridge(Arc::new(VanishingHost), false, sink.clone());
    let acker = Arc::new(RecordingAck::default());

    let err = bridge
        .on_message(delivery("orders.created.9", b"x", acker))
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<BridgeError>(),
        Some(&BridgeError::DispatchInterrupted)
    );
    assert_eq!(
        sink.take(),
        vec![
            format!("consume {URL} {CONFIGURED_SUBJECT} 1"),
            format!("error {URL} orders.created.9 interrupted"),
        ]
    );
}

/// Captures the `Caller` handed to a two-parameter handler.
#[derive(Default)]
struct CallerProbe {
    caller: Mutex<Option<Caller>>,
}

impl ServiceHost for CallerProbe {
    fn declared_params(&self) -> usize {
        2
    }
    fn invoke(&self, call: HandlerCall, completion: CompletionHandle) {
        if let HandlerCall::MessageWithCaller(_, caller) = call {
            *self.caller.lock().unwrap() = Some(caller);
        }
        completion.notify_success();
    }
}

#[tokio::test]
async fn test_manual_caller_acks_the_transport_once() {
    let sink = Arc::new(RecordingSink::default());
    let host = Arc::new(CallerProbe::default());
    let bridge = bridge(host.clone(), true, sink.clone());
    let acker = Arc::new(RecordingAck::default());

    bridge
        .on_message(delivery("orders.created.3", b"x", acker.clone()))
        .await
        .unwrap();

    let caller = host
        .caller
        .lock()
        .unwrap()
        .take()
        .expect("two-parameter dispatch must carry a caller");
    assert!(caller.manual_ack());
    caller.ack().await.unwrap();
    caller.ack().await.unwrap();
    assert_eq!(acker.acks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_caller_in_auto_mode_refuses_to_ack() {
    let sink = Arc::new(RecordingSink::default());
    let host = Arc::new(CallerProbe::default());
    let bridge = bridge(host.clone(), false, sink.clone());
    let acker = Arc::new(RecordingAck::default());

    bridge
        .on_message(delivery("orders.created.4", b"x", acker.clone()))
        .await
        .unwrap();

    let caller = host.caller.lock().unwrap().take().unwrap();
    let err = caller.ack().await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<BridgeError>(),
        Some(&BridgeError::ManualAckDisabled)
    );
    assert_eq!(acker.acks.load(Ordering::SeqCst), 0);
}

struct AckingHandler;

#[async_trait]
impl CallerHandler for AckingHandler {
    async fn on_message(&self, _message: StreamMessage, caller: Caller) -> Result<()> {
        caller.ack().await
    }
}

#[tokio::test]
async fn test_two_arg_handler_acks_through_its_caller() {
    let sink = Arc::new(RecordingSink::default());
    let host = Arc::new(TokioServiceHost::with_caller(AckingHandler));
    let bridge = bridge(host, true, sink.clone());
    let acker = Arc::new(RecordingAck::default());

    bridge
        .on_message(delivery("orders.created.5", b"x", acker.clone()))
        .await
        .unwrap();

    assert_eq!(acker.acks.load(Ordering::SeqCst), 1);
    assert_eq!(
        sink.take(),
        vec![
            format!("consume {URL} {CONFIGURED_SUBJECT} 1"),
            format!("delivery {URL} orders.created.5"),
        ]
    );
}
