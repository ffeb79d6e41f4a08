// ABOUTME: Integration tests for the transport and its session manager.
// ABOUTME: Runs against the in-memory connector from tests/support.

mod support;

use outrider::config::Target;
use outrider::diagnostics::Diagnostics;
use outrider::ssh::ProgressFn;
use outrider::transport::{Transport, TransportError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use support::{Call, FakeConnector};

fn archive(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("images.tar");
    std::fs::write(&path, vec![7u8; 4096]).unwrap();
    path
}

/// Test: Upload with skip_if_exists to a path that already exists.
/// Expected: Success with zero write operations.
#[tokio::test]
async fn skip_if_exists_issues_no_writes() {
    let dir = tempfile::tempdir().unwrap();
    let local = archive(&dir);
    let fake = FakeConnector::new().with_file("edge-1", "/tmp/images.tar");
    let transport = Transport::new(Arc::new(fake.clone()));

    let ok = transport
        .upload(&local, &Target::new("edge-1"), "/tmp/images.tar", true, None)
        .await;

    assert!(ok);
    assert_eq!(fake.writes("edge-1"), 0);
    assert!(fake.commands("edge-1").is_empty(), "no mkdir on skip");
}

/// Test: Upload without skip_if_exists to a path that already exists.
/// Expected: Exactly one write operation.
#[tokio::test]
async fn no_skip_writes_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let local = archive(&dir);
    let fake = FakeConnector::new().with_file("edge-1", "/tmp/images.tar");
    let transport = Transport::new(Arc::new(fake.clone()));

    let ok = transport
        .upload(&local, &Target::new("edge-1"), "/tmp/images.tar", false, None)
        .await;

    assert!(ok);
    assert_eq!(fake.writes("edge-1"), 1);
    assert!(
        !fake
            .calls("edge-1")
            .iter()
            .any(|c| matches!(c, Call::Exists(_))),
        "existence is not checked without skip_if_exists"
    );
}

/// Test: Upload with skip_if_exists to a path that is absent.
/// Expected: Parent created, one write, progress reaches the total.
#[tokio::test]
async fn skip_if_exists_uploads_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    let local = archive(&dir);
    let fake = FakeConnector::new();
    let transport = Transport::new(Arc::new(fake.clone()));

    let reached = AtomicU64::new(0);
    let sink: &ProgressFn = &|sent: u64, total: u64| {
        assert_eq!(total, 4096);
        reached.store(sent, Ordering::SeqCst);
    };

    let ok = transport
        .upload(
            &local,
            &Target::new("edge-1"),
            "/opt/images/bundle.tar",
            true,
            Some(sink),
        )
        .await;

    assert!(ok);
    assert_eq!(fake.writes("edge-1"), 1);
    assert_eq!(fake.commands("edge-1"), vec!["mkdir -p '/opt/images'".to_string()]);
    assert_eq!(reached.load(Ordering::SeqCst), 4096);
}

/// Test: Write fails mid-stream.
/// Expected: Upload reports false instead of erroring.
#[tokio::test]
async fn failed_write_reports_false() {
    let dir = tempfile::tempdir().unwrap();
    let local = archive(&dir);
    let fake = FakeConnector::new().fail_writes("edge-1");
    let transport = Transport::new(Arc::new(fake));

    assert!(
        !transport
            .upload(&local, &Target::new("edge-1"), "/tmp/images.tar", false, None)
            .await
    );
}

/// Test: Several operations against one target.
/// Expected: A single connection is opened and reused.
#[tokio::test]
async fn session_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let local = archive(&dir);
    let fake = FakeConnector::new();
    let transport = Transport::new(Arc::new(fake.clone()));
    let target = Target::new("edge-1");

    assert!(transport.upload(&local, &target, "/tmp/a.tar", false, None).await);
    assert!(transport.upload(&local, &target, "/tmp/b.tar", false, None).await);
    transport.execute(&target, "true").await.unwrap();
    assert!(transport.exists(&target, "/tmp/a.tar").await.unwrap());

    assert_eq!(fake.connects("edge-1"), 1);
    assert_eq!(transport.sessions().len(), 1);
}

/// Test: Many concurrent operations race for the first session.
/// Expected: Still exactly one connect.
#[tokio::test]
async fn concurrent_first_use_connects_once() {
    let fake = FakeConnector::new();
    let transport = Transport::new(Arc::new(fake.clone()));
    let target = Target::new("edge-1");

    let commands = ["true", "id"];
    let results = futures::future::join_all(
        (0..16).map(|i| transport.execute(&target, commands[i % 2])),
    )
    .await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(fake.connects("edge-1"), 1);
}

/// Test: Targets that differ only by display name share hostname and port.
/// Expected: They share one session.
#[tokio::test]
async fn session_keyed_by_hostname_and_port() {
    let fake = FakeConnector::new();
    let transport = Transport::new(Arc::new(fake.clone()));

    let a = Target::new("edge-1");
    let mut b = Target::new("edge-1");
    b.user = "deploy".to_string();
    let mut c = Target::new("edge-1");
    c.port = 2222;

    transport.execute(&a, "true").await.unwrap();
    transport.execute(&b, "true").await.unwrap();
    transport.execute(&c, "true").await.unwrap();

    assert_eq!(transport.sessions().len(), 2);
    assert_eq!(fake.connects("edge-1"), 2);
}

/// Test: Authentication fails, then the target is used again.
/// Expected: The failure is remembered; no second connect.
#[tokio::test]
async fn connect_failure_is_sticky() {
    let dir = tempfile::tempdir().unwrap();
    let local = archive(&dir);
    let fake = FakeConnector::new().refuse("edge-2");
    let transport = Transport::new(Arc::new(fake.clone()));
    let target = Target::new("edge-2");

    assert!(!transport.upload(&local, &target, "/tmp/images.tar", false, None).await);
    let err = transport.execute(&target, "true").await.unwrap_err();

    assert!(err.is_connectivity());
    assert!(matches!(err, TransportError::Session { .. }));
    assert_eq!(fake.connects("edge-2"), 1);
}

/// Test: exists() on a host that cannot be reached.
/// Expected: An error, distinct from "absent".
#[tokio::test]
async fn exists_distinguishes_unreachable_from_absent() {
    let fake = FakeConnector::new().refuse("edge-2");
    let transport = Transport::new(Arc::new(fake));

    assert!(!transport.exists(&Target::new("edge-1"), "/nope").await.unwrap());
    assert!(transport.exists(&Target::new("edge-2"), "/nope").await.is_err());
}

/// Test: A command exits non-zero.
/// Expected: execute returns the status as a normal result.
#[tokio::test]
async fn nonzero_exit_is_not_an_error() {
    let fake = FakeConnector::new().fail_exec("edge-1", "docker", 125);
    let transport = Transport::new(Arc::new(fake));

    let output = transport
        .execute(&Target::new("edge-1"), "docker load < /tmp/x.tar")
        .await
        .unwrap();

    assert_eq!(output.exit_code, 125);
    assert_eq!(output.stderr, "simulated failure");
}

/// Test: Close the transport twice, then use it.
/// Expected: Sessions closed once; later use fails as closed.
#[tokio::test]
async fn close_is_idempotent() {
    let fake = FakeConnector::new().refuse("edge-2");
    let transport = Transport::new(Arc::new(fake.clone()));
    let diagnostics = Diagnostics::default();

    transport.execute(&Target::new("edge-1"), "true").await.unwrap();
    let _ = transport.execute(&Target::new("edge-2"), "true").await;

    assert_eq!(transport.close(&diagnostics).await, 1);
    assert_eq!(transport.close(&diagnostics).await, 0);
    assert_eq!(fake.closes("edge-1"), 1);
    assert!(!diagnostics.has_warnings());

    let err = transport
        .execute(&Target::new("edge-1"), "true")
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Closed));
}
