use std::time::Duration;

use jobs::{
    encode_native, DecodeError, DecodeQueue, DecodeRequest, DecoderRegistry, Domain, GateError,
    OperationGate,
};
use project::{CancellationToken, LazySource, ProjectNodeId};
use scenes::{FormatTag, Movie, SceneList};

fn request(name: &str, bytes: Vec<u8>) -> DecodeRequest {
    DecodeRequest {
        target: ProjectNodeId::new(),
        name: name.to_string(),
        source: LazySource::new(FormatTag::Native, bytes),
        token: CancellationToken::new(),
    }
}

#[test]
fn threaded_drop_keeps_domain_busy_until_every_decode_reports() {
    let gate = OperationGate::threaded(Some(2), Some(1)).unwrap();
    let queue = DecodeQueue::new(gate.clone(), DecoderRegistry::with_native());
    let bytes = encode_native(&SceneList::from_movie("a", Movie::new("a"))).unwrap();

    let cancelled = request("cancelled", bytes.clone());
    cancelled.token.cancel();
    {
        let seq = gate.try_begin(Domain::DragAndDrop).unwrap();
        queue.submit(&seq, request("ok", bytes));
        queue.submit(&seq, request("bad", b"[]".to_vec()));
        queue.submit(&seq, cancelled);
    }

    let mut done = Vec::new();
    while done.len() < 3 {
        let completion = queue
            .recv_timeout(Duration::from_secs(10))
            .expect("decode did not report back");
        done.push(completion);
    }
    done.sort_by(|a, b| a.name.cmp(&b.name));
    assert!(matches!(done[0].result, Err(DecodeError::Malformed { .. })));
    assert_eq!(done[1].result.as_ref().unwrap_err(), &DecodeError::Cancelled);
    assert!(done[2].result.is_ok());

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !gate.is_idle(Domain::DragAndDrop) && std::time::Instant::now() < deadline {
        std::thread::yield_now();
    }
    assert!(gate.try_begin(Domain::DragAndDrop).is_ok());
}

#[test]
fn project_domain_is_serial() {
    let gate = OperationGate::threaded(None, None).unwrap();
    assert_eq!(gate.parallelism(Domain::Project), 1);
    assert!(gate.parallelism(Domain::CopyPaste) >= 1);
    let held = gate.try_begin(Domain::Project).unwrap();
    assert_eq!(
        gate.try_begin(Domain::Project).unwrap_err(),
        GateError::Busy(Domain::Project)
    );
    drop(held);
}
