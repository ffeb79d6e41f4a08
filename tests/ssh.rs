// ABOUTME: Integration tests for the SSH client against a live host.
// ABOUTME: Skipped unless OUTRIDER_SSH_TEST_HOST names a reachable sshd.

use outrider::ssh::{Credential, Error, HostKeyPolicy, Session, SessionConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Session config for the live test host, or `None` to skip.
fn live_config() -> Option<SessionConfig> {
    let host = std::env::var("OUTRIDER_SSH_TEST_HOST").ok()?;
    let user = std::env::var("OUTRIDER_SSH_TEST_USER").unwrap_or_else(|_| "root".to_string());
    let port = std::env::var("OUTRIDER_SSH_TEST_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(22);

    let mut credentials = Vec::new();
    if let Ok(key) = std::env::var("OUTRIDER_SSH_TEST_KEY") {
        credentials.push(Credential::KeyFile(PathBuf::from(key)));
    }
    credentials.push(Credential::Agent);
    credentials.push(Credential::DefaultKeys);

    Some(
        SessionConfig::new(host, user)
            .port(port)
            .credentials(credentials)
            .host_key_policy(HostKeyPolicy::AcceptAny),
    )
}

macro_rules! live_session {
    () => {{
        let Some(config) = live_config() else {
            eprintln!("OUTRIDER_SSH_TEST_HOST not set, skipping");
            return;
        };
        Session::connect(config)
            .await
            .expect("connection should succeed")
    }};
}

/// Test: Connect and execute `echo hello`.
/// Expected: Returns "hello" with exit code 0.
#[tokio::test]
async fn connect_and_execute_echo() {
    let session = live_session!();

    let output = session.exec("echo hello").await.expect("command should succeed");

    assert!(output.success(), "exit code should be 0");
    assert_eq!(output.stdout.trim(), "hello");
    session.disconnect().await.expect("disconnect should succeed");
}

/// Test: Execute command that writes to stderr and exits non-zero.
/// Expected: Both captured; non-zero exit is a normal result.
#[tokio::test]
async fn stderr_and_exit_code_captured() {
    let session = live_session!();

    let output = session
        .exec("echo oops >&2; exit 3")
        .await
        .expect("command should succeed");

    assert_eq!(output.exit_code, 3);
    assert_eq!(output.stderr.trim(), "oops");
    session.disconnect().await.expect("disconnect should succeed");
}

/// Test: Stream a local file to the host and read its size back.
/// Expected: Byte count matches and progress reaches the total.
#[tokio::test]
async fn write_file_streams_whole_file() {
    let session = live_session!();
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("payload.bin");
    std::fs::write(&local, vec![42u8; 200_000]).unwrap();
    let remote = format!("/tmp/outrider-test-{}.bin", std::process::id());

    let last = std::sync::atomic::AtomicU64::new(0);
    let progress: &outrider::ssh::ProgressFn = &|sent, _total| {
        last.store(sent, std::sync::atomic::Ordering::SeqCst);
    };
    let sent = session
        .write_file(&local, &remote, Some(progress))
        .await
        .expect("write should succeed");

    assert_eq!(sent, 200_000);
    assert_eq!(last.load(std::sync::atomic::Ordering::SeqCst), 200_000);
    assert!(session.path_exists(&remote).await.unwrap());

    let size = session.exec(&format!("wc -c < {remote}")).await.unwrap();
    assert_eq!(size.stdout.trim(), "200000");

    session.exec(&format!("rm -f {remote}")).await.unwrap();
    assert!(!session.path_exists(&remote).await.unwrap());
    session.disconnect().await.expect("disconnect should succeed");
}

/// Test: Command exceeds its timeout.
/// Expected: CommandTimeout error.
#[tokio::test]
async fn command_timeout_returns_error() {
    let session = live_session!();

    let err = session
        .exec_with_timeout("sleep 10", Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::CommandTimeout(_)),
        "expected CommandTimeout error, got: {err:?}"
    );
    session.disconnect().await.expect("disconnect should succeed");
}

/// Test: Only a missing key file is offered.
/// Expected: Authentication fails, naming what was attempted.
#[tokio::test]
async fn unusable_credentials_fail_authentication() {
    let Some(config) = live_config() else {
        return;
    };
    let config = config.credentials(vec![Credential::KeyFile(PathBuf::from(
        "/nonexistent/key/path",
    ))]);

    let err = Session::connect(config).await.err().expect("connect should fail");

    assert!(err.is_connect_failure(), "got: {err:?}");
}

/// Test: Connecting to a port nothing listens on.
/// Expected: Connection error.
#[tokio::test]
async fn closed_port_returns_connection_error() {
    let config = SessionConfig::new("127.0.0.1", "nobody").port(1);

    let err = Session::connect(config).await.err().expect("connect should fail");

    assert!(
        matches!(err, Error::Connection { .. }),
        "expected Connection error, got: {err:?}"
    );
}
