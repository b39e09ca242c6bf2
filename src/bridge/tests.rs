use super::*;
use crate::codec::Outcome;
use crate::error::{ProtocolError, RemoteError, RemoteErrorKind};
use std::sync::Mutex;

/// Bridge wired to a channel the test reads envelopes from directly
fn test_bridge() -> (Bridge, CallbackSink, mpsc::UnboundedReceiver<String>) {
    let (transport, inbound) = ChannelTransport::new();
    let (bridge, sink) = Bridge::new(Arc::new(transport));
    (bridge, sink, inbound)
}

async fn next_envelope(inbound: &mut mpsc::UnboundedReceiver<String>) -> Envelope {
    let raw = inbound.recv().await.expect("envelope posted");
    Envelope::from_wire(&raw).unwrap()
}

struct FailingTransport;

impl Transport for FailingTransport {
    fn post(&self, _envelope: &Envelope) -> Result<()> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "host gone",
        )))
    }
}

#[tokio::test]
async fn invoke_registers_one_call_and_settlement_removes_it() {
    let (bridge, sink, mut inbound) = test_bridge();
    assert_eq!(bridge.pending_calls().await.unwrap(), 0);

    let handle = bridge.invoke("fs.exists", vec![json!("notes.txt")]).unwrap();
    assert_eq!(bridge.pending_calls().await.unwrap(), 1);

    let envelope = next_envelope(&mut inbound).await;
    assert_eq!(envelope.id, handle.id());
    assert_eq!(envelope.channel, "fs.exists");
    assert_eq!(envelope.args, vec![json!("notes.txt")]);

    assert!(sink.settle(envelope.id, &Outcome::Value(json!(true))));
    assert_eq!(handle.await.unwrap(), Some(json!(true)));
    assert_eq!(bridge.pending_calls().await.unwrap(), 0);
}

#[tokio::test]
async fn second_settlement_is_ignored() {
    let (bridge, sink, mut inbound) = test_bridge();

    let handle = bridge.invoke("fs.exists", vec![json!("a.txt")]).unwrap();
    let id = next_envelope(&mut inbound).await.id;
    sink.settle(id, &Outcome::Value(json!(false)));
    sink.settle(id, &Outcome::Value(json!(true)));
    sink.settle(id, &Outcome::Failure(RemoteError::internal("late")));

    assert_eq!(handle.await.unwrap(), Some(json!(false)));
    assert_eq!(bridge.pending_calls().await.unwrap(), 0);

    // The bridge keeps working after the stray settlements.
    let next = bridge.invoke("fs.exists", vec![json!("b.txt")]).unwrap();
    let next_id = next_envelope(&mut inbound).await.id;
    assert_ne!(next_id, id);
    sink.settle(next_id, &Outcome::Value(json!(true)));
    assert_eq!(next.await.unwrap(), Some(json!(true)));
}

#[tokio::test]
async fn wrong_argument_count_fails_synchronously_without_registration() {
    let (bridge, _sink, mut inbound) = test_bridge();
    let before = bridge.pending_calls().await.unwrap();

    let err = bridge
        .invoke("fs.readFile", vec![json!("notes.txt")])
        .err()
        .expect("validation error");
    assert!(matches!(
        err,
        Error::Validation(ValidationError::ArgumentCount {
            expected: 2,
            actual: 1,
            ..
        })
    ));

    assert_eq!(bridge.pending_calls().await.unwrap(), before);
    assert!(inbound.try_recv().is_err());
}

#[tokio::test]
async fn unknown_channel_and_bad_arguments_are_validation_errors() {
    let (bridge, _sink, mut inbound) = test_bridge();

    assert!(matches!(
        bridge.invoke("fs.chmod", vec![json!("a")]),
        Err(Error::Validation(ValidationError::UnknownOperation(_)))
    ));
    assert!(matches!(
        bridge.download_to_file("file:///etc/passwd", "passwd"),
        Err(Error::Validation(ValidationError::LocalUrl(_)))
    ));
    assert!(matches!(
        bridge.stat("has space.txt"),
        Err(Error::Validation(ValidationError::PathWhitespace(_)))
    ));
    assert!(matches!(
        bridge.invoke("fs.readFile", vec![json!("a.txt"), json!("ascii")]),
        Err(Error::Validation(ValidationError::UnsupportedEncoding(_)))
    ));

    assert_eq!(bridge.pending_calls().await.unwrap(), 0);
    assert!(inbound.try_recv().is_err());
}

#[tokio::test]
async fn failure_outcome_rejects_the_call() {
    let (bridge, sink, mut inbound) = test_bridge();

    let call = bridge.read_file("missing.txt", Encoding::Utf8).unwrap();
    let id = next_envelope(&mut inbound).await.id;
    sink.settle(
        id,
        &Outcome::Failure(RemoteError::new(RemoteErrorKind::NotFound, "missing.txt")),
    );

    match call.await {
        Err(Error::Execution(remote)) => assert_eq!(remote.kind, RemoteErrorKind::NotFound),
        other => panic!("expected execution error, got {:?}", other),
    }
    assert_eq!(bridge.pending_calls().await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_settlement_rejects_with_protocol_error() {
    let (bridge, sink, mut inbound) = test_bridge();

    let handle = bridge.invoke("sqlite.query", vec![json!("SELECT 1")]).unwrap();
    let id = next_envelope(&mut inbound).await.id;
    sink.settle_encoded(id, "`Results go here.`".to_string());

    assert!(matches!(
        handle.await,
        Err(Error::Protocol(ProtocolError::MalformedSettlement(_)))
    ));
    assert_eq!(bridge.pending_calls().await.unwrap(), 0);
}

#[tokio::test]
async fn empty_outcome_resolves_without_value() {
    let (bridge, sink, mut inbound) = test_bridge();

    let raw = bridge.invoke("fs.unlink", vec![json!("old.txt")]).unwrap();
    let id = next_envelope(&mut inbound).await.id;
    sink.settle(id, &Outcome::Empty);
    assert_eq!(raw.await.unwrap(), None);

    let typed = bridge.unlink("old.txt").unwrap();
    let id = next_envelope(&mut inbound).await.id;
    sink.settle(id, &Outcome::Empty);
    typed.await.unwrap();
}

#[tokio::test]
async fn mismatched_payload_is_a_protocol_error_for_typed_calls() {
    let (bridge, sink, mut inbound) = test_bridge();

    let call = bridge.exists("a.txt").unwrap();
    let id = next_envelope(&mut inbound).await.id;
    sink.settle(id, &Outcome::Value(json!("yes")));

    assert!(matches!(
        call.await,
        Err(Error::Protocol(ProtocolError::UnexpectedPayload(_)))
    ));
}

#[tokio::test]
async fn progress_registered_with_the_call_sees_every_report() {
    let (bridge, sink, mut inbound) = test_bridge();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let recorder = Arc::clone(&seen);
    let handle = bridge
        .invoke_with_progress(
            "fs.downloadFiles",
            vec![json!("https://a.example.com/1.png"), json!("https://a.example.com/2.png")],
            move |done, total| recorder.lock().unwrap().push((done, total)),
        )
        .unwrap();

    let id = next_envelope(&mut inbound).await.id;
    sink.progress(id, 1, 2);
    sink.progress(id, 2, 2);
    sink.settle(id, &Outcome::Value(json!([])));
    handle.await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (2, 2)]);

    // Reports after settlement go nowhere.
    sink.progress(id, 3, 2);
    assert_eq!(bridge.pending_calls().await.unwrap(), 0);
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn attached_progress_handler_is_chainable_and_replaceable() {
    let (bridge, sink, mut inbound) = test_bridge();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&seen);
    let second = Arc::clone(&seen);
    let handle = bridge
        .invoke("fs.downloadFiles", vec![json!("https://a.example.com/1.png")])
        .unwrap()
        .on_progress(move |done, total| first.lock().unwrap().push(("first", done, total)))
        .on_progress(move |done, total| second.lock().unwrap().push(("second", done, total)));

    let id = next_envelope(&mut inbound).await.id;
    sink.progress(id, 1, 1);
    sink.settle(id, &Outcome::Value(json!([])));
    handle.await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![("second", 1, 1)]);
}

#[tokio::test]
async fn progress_before_any_handler_is_dropped() {
    let (bridge, sink, mut inbound) = test_bridge();

    let handle = bridge
        .invoke("fs.downloadFiles", vec![json!("https://a.example.com/1.png")])
        .unwrap();
    let id = next_envelope(&mut inbound).await.id;
    sink.progress(id, 1, 1);
    sink.settle(id, &Outcome::Value(json!([])));

    assert_eq!(handle.await.unwrap(), Some(json!([])));
}

#[tokio::test]
async fn transport_failure_abandons_the_registration() {
    let (bridge, _sink) = Bridge::new(Arc::new(FailingTransport));

    assert!(matches!(
        bridge.invoke("fs.exists", vec![json!("a.txt")]),
        Err(Error::Io(_))
    ));
    assert_eq!(bridge.pending_calls().await.unwrap(), 0);
}

#[tokio::test]
async fn shutdown_rejects_pending_calls_and_refuses_new_ones() {
    let (bridge, _sink, mut inbound) = test_bridge();

    let first = bridge.invoke("fs.exists", vec![json!("a.txt")]).unwrap();
    let second = bridge.sqlite("SELECT 1").unwrap();
    next_envelope(&mut inbound).await;
    next_envelope(&mut inbound).await;

    assert_eq!(bridge.shutdown().await.unwrap(), 2);
    assert!(matches!(first.await, Err(Error::ShuttingDown)));
    assert!(matches!(second.await, Err(Error::ShuttingDown)));

    assert!(matches!(
        bridge.invoke("fs.exists", vec![json!("a.txt")]),
        Err(Error::ShuttingDown)
    ));
    assert!(matches!(bridge.pending_calls().await, Err(Error::ShuttingDown)));
}

#[tokio::test]
async fn bridges_are_independent() {
    let (left, left_sink, mut left_inbound) = test_bridge();
    let (right, _right_sink, mut right_inbound) = test_bridge();

    let left_call = left.invoke("fs.exists", vec![json!("a.txt")]).unwrap();
    let right_call = right.invoke("fs.exists", vec![json!("a.txt")]).unwrap();
    assert_eq!(left_call.id(), right_call.id());

    let id = next_envelope(&mut left_inbound).await.id;
    next_envelope(&mut right_inbound).await;
    left_sink.settle(id, &Outcome::Value(json!(true)));

    assert_eq!(left_call.await.unwrap(), Some(json!(true)));
    assert_eq!(left.pending_calls().await.unwrap(), 0);
    assert_eq!(right.pending_calls().await.unwrap(), 1);
}

#[tokio::test]
async fn write_file_ships_base64_content() {
    let (bridge, sink, mut inbound) = test_bridge();

    let call = bridge.write_file("blob.bin", [0u8, 159, 146, 150]).unwrap();
    let envelope = next_envelope(&mut inbound).await;
    assert_eq!(
        envelope.args,
        vec![json!("blob.bin"), json!("AJ+Slg=="), json!("base64")]
    );
    sink.settle(envelope.id, &Outcome::Empty);
    call.await.unwrap();
}
