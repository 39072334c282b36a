//! Tests for the pending-call registry in isolation.

use std::{io, sync::Arc, time::Duration};

use altcom::{
    CallError,
    CommandId,
    CorrelationKey,
    ResponseFrame,
    SessionHandle,
    TransactionRegistry,
    codec::ResponseHeader,
    feature::{entropy, socket},
};
use bytes::Bytes;
use rstest::{fixture, rstest};

#[fixture]
fn registry() -> Arc<TransactionRegistry> { TransactionRegistry::new() }

fn key(command: CommandId, session: u32) -> CorrelationKey {
    CorrelationKey::new(command, SessionHandle::new(session))
}

fn response(key: CorrelationKey, result: i32, payload: &'static [u8]) -> ResponseFrame {
    ResponseFrame {
        header: ResponseHeader {
            command: key.command,
            session: key.session,
            result,
        },
        payload: Bytes::from_static(payload),
    }
}

const LONG: Duration = Duration::from_secs(60);

#[rstest]
fn second_registration_of_same_key_is_rejected(registry: Arc<TransactionRegistry>) {
    let k = key(entropy::INIT, 7);
    let _first = registry.register(k, LONG).expect("first registration");
    let err = registry.register(k, LONG).expect_err("duplicate");
    assert!(matches!(err, CallError::DuplicateKey(d) if d == k));
    assert_eq!(registry.len(), 1);
}

#[rstest]
#[tokio::test]
async fn response_is_delivered_exactly_once(registry: Arc<TransactionRegistry>) {
    let k = key(entropy::INIT, 7);
    let call = registry.register(k, LONG).expect("register");

    assert!(registry.resolve(&k, response(k, 0, b"first")));
    assert!(!registry.resolve(&k, response(k, 0, b"second")));

    let frame = call.wait().await.expect("resolved");
    assert_eq!(frame.payload, Bytes::from_static(b"first"));
    assert!(registry.is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn wait_times_out_and_clears_entry(registry: Arc<TransactionRegistry>) {
    let k = key(socket::CONNECT, 4);
    let call = registry
        .register(k, Duration::from_millis(250))
        .expect("register");
    let err = call.wait().await.expect_err("nobody answers");
    assert!(matches!(err, CallError::Timeout(t) if t == k));
    assert!(!registry.contains(&k));
    // The key is free again.
    let _again = registry.register(k, LONG).expect("re-register");
}

#[rstest]
#[tokio::test]
async fn unbounded_timeout_waits_for_resolution(registry: Arc<TransactionRegistry>) {
    let k = key(entropy::INIT, 8);
    let call = registry.register(k, Duration::MAX).expect("register");
    assert!(call.deadline() > tokio::time::Instant::now() + LONG);
    assert_eq!(registry.sweep_expired(tokio::time::Instant::now() + LONG), 0);

    assert!(registry.resolve(&k, response(k, 0, b"late but fine")));
    let frame = call.wait().await.expect("resolved");
    assert_eq!(frame.payload, Bytes::from_static(b"late but fine"));
}

#[rstest]
fn resolve_after_cancel_finds_no_waiter(registry: Arc<TransactionRegistry>) {
    let k = key(entropy::FREE, 2);
    let call = registry.register(k, LONG).expect("register");
    assert!(call.cancel());
    assert!(!registry.resolve(&k, response(k, 0, b"")));
}

#[rstest]
fn dropping_a_handle_cancels_it(registry: Arc<TransactionRegistry>) {
    let k = key(entropy::FREE, 2);
    drop(registry.register(k, LONG).expect("register"));
    assert!(registry.is_empty());
}

#[rstest]
fn stale_handle_cannot_remove_newer_registration(registry: Arc<TransactionRegistry>) {
    let k = key(entropy::INIT, 1);
    let old = registry.register(k, LONG).expect("register");
    assert!(registry.resolve(&k, response(k, 0, b"")));
    let _new = registry.register(k, LONG).expect("register again");

    assert!(!registry.cancel(&old));
    drop(old);
    assert!(registry.contains(&k));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn sweep_expires_only_overdue_calls(registry: Arc<TransactionRegistry>) {
    let short = registry
        .register(key(entropy::INIT, 1), Duration::from_millis(10))
        .expect("register");
    let _long = registry
        .register(key(entropy::INIT, 2), LONG)
        .expect("register");

    tokio::time::advance(Duration::from_millis(20)).await;
    assert_eq!(registry.sweep_expired(tokio::time::Instant::now()), 1);
    assert_eq!(registry.len(), 1);
    assert!(matches!(short.wait().await, Err(CallError::Timeout(_))));
}

#[rstest]
#[tokio::test]
async fn cancel_session_fails_only_that_session(registry: Arc<TransactionRegistry>) {
    let a = registry
        .register(key(socket::CONNECT, 5), LONG)
        .expect("register");
    let b = registry
        .register(key(socket::CLOSE, 5), LONG)
        .expect("register");
    let _other = registry
        .register(key(socket::CONNECT, 6), LONG)
        .expect("register");

    assert_eq!(registry.cancel_session(SessionHandle::new(5)), 2);
    for call in [a, b] {
        let err = call.wait().await.expect_err("session closed");
        assert!(matches!(err, CallError::SessionClosed(s) if s == SessionHandle::new(5)));
    }
    assert_eq!(registry.len(), 1);
}

#[rstest]
#[tokio::test]
async fn fail_all_closes_registry(registry: Arc<TransactionRegistry>) {
    let call = registry
        .register(key(entropy::INIT, 1), LONG)
        .expect("register");
    let failed = registry.fail_all(CallError::transport(io::Error::from(
        io::ErrorKind::BrokenPipe,
    )));
    assert_eq!(failed, 1);
    assert!(call.wait().await.expect_err("failed").is_transport());

    // Later failures keep the first error.
    registry.fail_all(CallError::Remote(-1));
    let err = registry
        .register(key(entropy::INIT, 2), LONG)
        .expect_err("closed");
    assert!(err.is_transport());
    assert!(registry.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolutions_never_cross(registry: Arc<TransactionRegistry>) {
    const CALLS: u32 = 200;
    let mut waiters = Vec::new();
    for n in 0..CALLS {
        let k = key(entropy::INIT, n);
        waiters.push((n, registry.register(k, LONG).expect("register")));
    }

    let resolvers: Vec<_> = (0..CALLS)
        .rev()
        .map(|n| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let k = key(entropy::INIT, n);
                let frame = ResponseFrame {
                    header: ResponseHeader {
                        command: k.command,
                        session: k.session,
                        result: 0,
                    },
                    payload: Bytes::copy_from_slice(&n.to_be_bytes()),
                };
                assert!(registry.resolve(&k, frame));
            })
        })
        .collect();
    for resolver in resolvers {
        resolver.await.expect("resolver task");
    }

    for (n, call) in waiters {
        let frame = call.wait().await.expect("resolved");
        assert_eq!(&frame.payload[..], &n.to_be_bytes()[..]);
    }
    assert!(registry.is_empty());
}
