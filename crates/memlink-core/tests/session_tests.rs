//! # Session Integration Tests
//!
//! Drives `SessionContext` end to end over fake collaborators: sync,
//! export, checkpoints and the open/close lifecycle.

mod common;

use common::{FakeTransport, Reply, XorKeys};
use memlink_core::protocol::unframe;
use memlink_core::{
    MemlinkError, RelationshipRecord, ResponseEnd, SessionContext, SessionParams, SessionState,
    formats,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn params(dir: &Path) -> SessionParams {
    SessionParams::new("127.0.0.1:8080", dir.join("peer.pem"), dir.join("session.kv"))
}

#[test]
fn sync_reports_and_skips_malformed_lines() {
    let dir = tempfile::tempdir().expect("temp dir");
    let transport = FakeTransport::new(Reply::text("A B knows 5\n\nC D\nE F likes 2\n"));
    let mut session = SessionContext::open(params(dir.path()), &transport, &XorKeys::default())
        .expect("open");

    let report = session.sync("A").expect("sync");

    assert_eq!(report.merged, 2);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].line, "C D");
    assert_eq!(
        session.graph().relationships_from("E"),
        vec![RelationshipRecord::new("E", "F", "likes", 2)]
    );
    assert_eq!(transport.sent(), vec![b"GET_RELATIONSHIPS A\n".to_vec()]);
}

#[test]
fn refused_connection_leaves_session_usable() {
    let dir = tempfile::tempdir().expect("temp dir");
    let transport = FakeTransport::new(Reply::Refuse);
    let mut session = SessionContext::open(params(dir.path()), &transport, &XorKeys::default())
        .expect("open");

    let err = session.sync("A").expect_err("refused");
    assert!(err.is_recoverable());
    assert_eq!(session.state(), SessionState::Open);
    assert_eq!(session.graph().node_count(), 0);

    session.remember("last_error", "refused").expect("remember");
    session.close().expect("close");
}

#[test]
fn cancelled_response_drops_partial_line() {
    let dir = tempfile::tempdir().expect("temp dir");
    let transport = FakeTransport::new(Reply::Cancelled(vec![
        b"A B knows 5\nA C lik".to_vec(),
    ]));
    let mut session = SessionContext::open(params(dir.path()), &transport, &XorKeys::default())
        .expect("open");

    let report = session.sync("A").expect("sync");

    assert_eq!(report.end, ResponseEnd::Cancelled);
    assert_eq!(report.merged, 1);
    assert!(session.graph().find("C").is_none());
}

#[test]
fn export_sends_decryptable_snapshot() {
    let dir = tempfile::tempdir().expect("temp dir");
    let transport = FakeTransport::new(Reply::text(""));
    let keys = XorKeys::default();
    let mut session = SessionContext::open(params(dir.path()), &transport, &keys).expect("open");
    session.graph().add_relationship("A", "B", "knows", 5);
    session.graph().add_relationship("A", "B", "knows", 5);

    let report = session.export().expect("export");

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    let ciphertext = unframe(&sent[0]).expect("frame");
    assert_eq!(ciphertext.len(), report.ciphertext_bytes);

    let encryptor = common::XorEncryptor(0x5a);
    let restored = formats::decode(&encryptor.decrypt(ciphertext)).expect("decode");
    assert_eq!(restored.edge_count(), 2);
    assert_eq!(restored, session.graph().snapshot());
}

#[test]
fn key_load_failure_fails_open() {
    let dir = tempfile::tempdir().expect("temp dir");
    let transport = FakeTransport::new(Reply::text(""));
    let mut p = params(dir.path());
    p.key_file = dir.path().join("peer.txt");

    let result = SessionContext::open(p, &transport, &XorKeys::default());
    assert!(matches!(result, Err(MemlinkError::Encryption(_))));
}

#[test]
fn unreadable_store_fails_open() {
    let dir = tempfile::tempdir().expect("temp dir");
    let transport = FakeTransport::new(Reply::text(""));
    let mut p = params(dir.path());
    // A directory exists at the path but cannot be read as a file.
    p.store_path = dir.path().to_path_buf();

    let result = SessionContext::open(p, &transport, &XorKeys::default());
    assert!(matches!(result, Err(MemlinkError::StorageIo { .. })));
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let transport = FakeTransport::new(Reply::text("Paris France capital_of 1\n"));
    let p = params(dir.path()).with_graph_path(dir.path().join("graph.mlnk"));

    let mut session = SessionContext::open(p.clone(), &transport, &XorKeys::default())
        .expect("open");
    session.sync("Paris").expect("sync");
    session.remember("city", "Paris").expect("remember");
    session.close().expect("close");

    let session = SessionContext::open(p, &transport, &XorKeys::default()).expect("reopen");
    assert_eq!(session.recall("city").expect("recall"), "Paris");
    assert_eq!(
        session.graph().relationships_from("Paris"),
        vec![RelationshipRecord::new("Paris", "France", "capital_of", 1)]
    );
}

#[test]
fn readers_run_while_session_syncs() {
    let dir = tempfile::tempdir().expect("temp dir");
    let body: String = (0..200).map(|i| format!("hub n{} linked {}\n", i, i)).collect();
    let transport = FakeTransport::new(Reply::text(&body));
    let mut session = SessionContext::open(params(dir.path()), &transport, &XorKeys::default())
        .expect("open");

    let graph = Arc::clone(session.graph());
    let started = Arc::new(Barrier::new(2));
    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let started = Arc::clone(&started);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            started.wait();
            let mut reads = 0_usize;
            loop {
                // Sampled before the read, so the final read follows the merge.
                let finished = done.load(Ordering::Acquire);
                let seen = graph.relationships_from("hub").len();
                assert!(seen == 0 || seen == 200, "saw a partial merge: {}", seen);
                reads += 1;
                if finished {
                    return (reads, seen);
                }
            }
        })
    };

    started.wait();
    session.sync("hub").expect("sync");
    done.store(true, Ordering::Release);

    let (reads, last) = reader.join().expect("reader");
    assert!(reads >= 1);
    assert_eq!(last, 200);
    assert_eq!(session.graph().relationships_from("hub").len(), 200);
}
