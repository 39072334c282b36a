//! Tests for issuing calls and matching their responses.
//!
//! A mock modem on the far end of a duplex pipe reads the command frames the
//! client writes and answers them in whatever order the test chooses.

mod common;

use std::time::Duration;

use altcom::{AltcomClient, CallError, CorrelationKey, SessionHandle, feature::entropy};
use altcom_testing::{call_expect, modem_expect};
use common::{TestResult, link, spawn_call};
use rstest::rstest;

#[tokio::test]
async fn entropy_init_succeeds_on_zero_result() -> TestResult {
    let mut link = link();
    let caller = spawn_call(&link.client, entropy::INIT, SessionHandle::new(7), &[]);

    let command = link.modem.next_command().await?;
    assert_eq!(command.header.command.main, 0x0141);
    assert_eq!(command.header.command.sub, 0x01);
    assert_eq!(command.header.session, SessionHandle::new(7));
    link.modem.respond(&command, 0, &[]).await?;

    let payload = caller.await??;
    assert!(payload.is_empty());
    assert!(link.client.registry().is_empty());
    Ok(())
}

#[rstest]
#[case(-1)]
#[case(-22)]
#[tokio::test]
async fn negative_result_becomes_remote_error(#[case] code: i32) -> TestResult {
    let mut link = link();
    let caller = spawn_call(&link.client, entropy::INIT, SessionHandle::new(7), &[]);

    let command = link.modem.next_command().await?;
    link.modem.respond(&command, code, &[]).await?;

    let err = caller.await?.expect_err("modem reported failure");
    assert!(matches!(err, CallError::Remote(c) if c == code));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unanswered_call_times_out_after_five_seconds() -> TestResult {
    let mut link = link();
    let started = tokio::time::Instant::now();
    let caller = spawn_call(&link.client, entropy::INIT, SessionHandle::new(7), &[]);

    let _command = link.modem.next_command().await?;
    let err = caller.await?.expect_err("no response was sent");

    let key = CorrelationKey::new(entropy::INIT, SessionHandle::new(7));
    assert!(matches!(err, CallError::Timeout(k) if k == key));
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(!link.client.registry().contains(&key));
    Ok(())
}

#[tokio::test]
async fn identical_pending_call_is_rejected() -> TestResult {
    let link = link();
    let session = SessionHandle::new(9);
    let _first = call_expect!(link.client.begin_call(entropy::INIT, session, &[]));

    let err = link
        .client
        .begin_call(entropy::INIT, session, &[])
        .await
        .expect_err("key already pending");
    assert!(matches!(err, CallError::DuplicateKey(k) if k.session == session));

    // A different session or command is a different key.
    let _other_session = link
        .client
        .begin_call(entropy::INIT, SessionHandle::new(10), &[])
        .await?;
    let _other_command = call_expect!(
        link.client.begin_call(entropy::FREE, session, &[]),
        "a different command is a different key"
    );
    assert_eq!(link.client.registry().len(), 3);
    Ok(())
}

#[tokio::test]
async fn shuffled_responses_reach_their_own_callers() -> TestResult {
    const CALLS: u32 = 16;
    let mut link = link();

    let callers: Vec<_> = (1..=CALLS)
        .map(|n| {
            (
                n,
                spawn_call(&link.client, entropy::INIT, SessionHandle::new(n), &n.to_be_bytes()),
            )
        })
        .collect();

    let mut commands = link.modem.next_commands(CALLS as usize).await?;
    // Answer in an order unrelated to issue order.
    commands.sort_by_key(|c| (c.header.session.as_u32() * 7) % CALLS);
    for command in &commands {
        let echoed = command.payload.clone();
        link.modem.respond(command, 0, &echoed).await?;
    }

    for (n, caller) in callers {
        let payload = caller.await??;
        assert_eq!(&payload[..], &n.to_be_bytes()[..]);
    }
    assert!(link.client.registry().is_empty());
    Ok(())
}

#[tokio::test]
async fn closing_a_session_fails_its_calls_only() -> TestResult {
    let mut link = link();
    let doomed = spawn_call(&link.client, entropy::INIT, SessionHandle::new(4), &[]);
    let survivor = spawn_call(&link.client, entropy::INIT, SessionHandle::new(5), &[]);
    let commands = link.modem.next_commands(2).await?;

    assert_eq!(link.client.close_session(SessionHandle::new(4)), 1);
    let err = doomed.await?.expect_err("session was closed");
    assert!(matches!(err, CallError::SessionClosed(s) if s == SessionHandle::new(4)));

    let survivor_command = commands
        .iter()
        .find(|c| c.header.session == SessionHandle::new(5))
        .ok_or("survivor command missing")?;
    link.modem.respond(survivor_command, 0, &[]).await?;
    survivor.await??;
    Ok(())
}

#[tokio::test]
async fn explicit_cancel_withdraws_call() -> TestResult {
    let mut link = link();
    let pending = link
        .client
        .begin_call(entropy::INIT, SessionHandle::new(2), &[])
        .await?;
    let command = modem_expect!(link.modem.next_command());
    assert!(pending.cancel());
    assert!(link.client.registry().is_empty());

    // The answer now has no waiter and must not disturb a later call.
    link.modem.respond(&command, 0, &[]).await?;
    let later = spawn_call(&link.client, entropy::FREE, SessionHandle::new(2), &[]);
    let later_command = modem_expect!(link.modem.next_command(), "later command");
    modem_expect!(link.modem.respond(&later_command, 0, &[]));
    later.await??;
    Ok(())
}

#[tokio::test]
async fn transport_loss_fails_pending_and_later_calls() -> TestResult {
    let mut link = link();
    let caller = spawn_call(&link.client, entropy::INIT, SessionHandle::new(1), &[]);
    let _command = link.modem.next_command().await?;
    link.modem.hang_up().await;

    let err = caller.await?.expect_err("link dropped");
    assert!(err.is_transport());

    let err = link
        .client
        .call(entropy::INIT, SessionHandle::new(2), &[])
        .await
        .expect_err("client is closed");
    assert!(err.is_transport());
    assert!(link.client.is_closed());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn abandoned_call_never_tears_its_frame() -> TestResult {
    let mut link = common::link_with_capacity(AltcomClient::builder(), 24);
    let body = [0xA5; 200];

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        link.client.call(entropy::INIT, SessionHandle::new(1), &body),
    )
    .await;
    assert!(abandoned.is_err(), "write should stall on the small pipe");

    let caller = spawn_call(&link.client, entropy::FREE, SessionHandle::new(2), &[]);

    let first = link.modem.next_command().await?;
    assert_eq!(first.header.command, entropy::INIT);
    assert_eq!(first.payload.as_ref(), body.as_slice());

    let second = link.modem.next_command().await?;
    assert_eq!(second.header.command, entropy::FREE);
    assert_eq!(second.header.session, SessionHandle::new(2));
    link.modem.respond(&second, 0, b"ok").await?;

    assert_eq!(caller.await??.as_ref(), b"ok");
    assert!(!link.client.is_closed());
    Ok(())
}

#[tokio::test]
async fn unbounded_call_timeout_still_resolves() -> TestResult {
    let mut link = link();
    let caller = {
        let client = link.client.clone();
        tokio::spawn(async move {
            client
                .call_with_timeout(entropy::INIT, SessionHandle::new(7), &[], Duration::MAX)
                .await
        })
    };

    let command = link.modem.next_command().await?;
    link.modem.respond(&command, 0, b"done").await?;

    assert_eq!(caller.await??.as_ref(), b"done");
    assert!(link.client.registry().is_empty());
    Ok(())
}
