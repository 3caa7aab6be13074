//! Integration tests for the engine worker thread
//!
//! These tests validate the threaded workflow:
//! - Spawning the worker around a session
//! - Request/reply matching by request id
//! - Shutdown hands the session back

mod common;

use common::builders::{chain_catalog, descriptor, source_with_tracks, track};
use common::mock_helpers::create_test_session;
use common::test_timeout;
use filterflow_rs::backend::{EngineMessage, EngineWorker};
use filterflow_rs::bridge::ExecutionRequest;
use filterflow_rs::engine::{MockEngine, MockExit};
use filterflow_rs::graph::FilterGraph;
use filterflow_rs::types::StreamType;
use serial_test::serial;

#[test]
#[serial]
fn test_worker_inspect_and_shutdown() {
    let engine = MockEngine::inspector(vec![
        vec![("PID", "1"), ("StreamType", "Audio")],
        vec![("PID", "2"), ("StreamType", "Visual")],
    ]);
    let (_dir, session) = create_test_session(engine);
    let (bridge, worker) = EngineWorker::spawn(session).unwrap();

    bridge.inspect(42, b"media".to_vec());
    match bridge.msg_rx.recv_timeout(test_timeout()).unwrap() {
        EngineMessage::TracksReady { request_id, tracks } => {
            assert_eq!(request_id, 42);
            let types: Vec<_> = tracks.iter().map(|t| t.stream_type.clone()).collect();
            assert_eq!(types, vec![StreamType::Audio, StreamType::Visual]);
        }
        other => panic!("unexpected message {:?}", other),
    }

    bridge.shutdown();
    assert!(matches!(
        bridge.msg_rx.recv_timeout(test_timeout()).unwrap(),
        EngineMessage::Shutdown
    ));

    let session = worker.join().expect("worker thread panicked");
    assert_eq!(session.stats().invocations, 1);
}

#[test]
#[serial]
fn test_worker_runs_plan() {
    let catalog = chain_catalog();
    let mut graph = FilterGraph::new();
    let src = source_with_tracks(
        &mut graph,
        "/root/video.mp4",
        vec![track(1, "video", StreamType::Visual)],
    );
    let a = graph.add_filter(descriptor(&catalog, "a"));
    graph
        .connect(src, a, "video/Visual".parse().unwrap(), "Visual".parse().unwrap())
        .unwrap();
    let plan = graph.compile("/root/output.mp4").unwrap();

    let engine = MockEngine::with_script(|_, io| {
        io.write_file("/root/output.mp4", b"out").unwrap();
        io.done(0);
        MockExit::Halt(0)
    });
    let (_dir, session) = create_test_session(engine);
    let (bridge, worker) = EngineWorker::spawn(session).unwrap();

    bridge.run(7, plan);
    match bridge.msg_rx.recv_timeout(test_timeout()).unwrap() {
        EngineMessage::RunComplete {
            request_id, bytes, ..
        } => {
            assert_eq!(request_id, 7);
            assert_eq!(bytes, b"out");
        }
        other => panic!("unexpected message {:?}", other),
    }

    bridge.shutdown();
    worker.join().unwrap();
}

#[test]
#[serial]
fn test_worker_replies_in_order() {
    let (_dir, session) = create_test_session(MockEngine::new());
    let (bridge, worker) = EngineWorker::spawn(session).unwrap();

    for id in 1..=3 {
        bridge.execute(id, ExecutionRequest::raw(["-h"]));
    }
    let ids: Vec<_> = (0..3)
        .map(|_| bridge.msg_rx.recv_timeout(test_timeout()).unwrap())
        .map(|msg| msg.request_id())
        .collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);

    bridge.shutdown();
    worker.join().unwrap();
}

#[test]
#[serial]
fn test_worker_stops_when_editor_drops() {
    let (_dir, session) = create_test_session(MockEngine::new());
    let (bridge, worker) = EngineWorker::spawn(session).unwrap();

    drop(bridge);
    let session = worker.join().unwrap();
    assert_eq!(session.stats().invocations, 0);
}
