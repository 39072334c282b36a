//! Tests for unsolicited event delivery through the client.

mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use altcom::{
    Event,
    SessionHandle,
    SubscribeError,
    feature::{entropy, quality},
};
use common::{TestResult, link, link_with, spawn_call};
use futures::FutureExt;
use tokio::sync::{Notify, mpsc};

#[tokio::test]
async fn event_reaches_subscriber_while_call_stays_pending() -> TestResult {
    let mut link = link();
    let (tx, mut rx) = mpsc::unbounded_channel();
    link.client.subscribe_fn(quality::REPORT, move |event: Event| {
        let _ = tx.send(event);
    })?;

    let caller = spawn_call(&link.client, quality::GET, SessionHandle::GLOBAL, &[]);
    let command = link.modem.next_command().await?;

    link.modem
        .send_event(quality::REPORT, SessionHandle::GLOBAL, b"report")
        .await?;
    let event = rx.recv().await.ok_or("event handler dropped")?;
    assert_eq!(event.kind, quality::REPORT);
    assert_eq!(event.payload.as_ref(), b"report");
    assert!(!caller.is_finished());

    link.modem.respond(&command, 0, b"answer").await?;
    assert_eq!(caller.await??.as_ref(), b"answer");
    Ok(())
}

#[tokio::test]
async fn subscribing_to_a_call_identifier_is_rejected() {
    let link = link();
    let err = link
        .client
        .subscribe_fn(entropy::INIT, |_| {})
        .err().expect("calls are not events");
    assert_eq!(err, SubscribeError::NotAnEvent(entropy::INIT));
}

#[tokio::test]
async fn stalled_handler_does_not_delay_call_responses() -> TestResult {
    let mut link = link();
    let release = Arc::new(Notify::new());
    let entered = Arc::new(Notify::new());
    let (gate, signal) = (Arc::clone(&release), Arc::clone(&entered));
    link.client.subscribe(
        quality::REPORT,
        Arc::new(move |_event: Event| {
            let gate = Arc::clone(&gate);
            let signal = Arc::clone(&signal);
            async move {
                signal.notify_one();
                gate.notified().await;
            }
            .boxed()
        }),
    )?;

    link.modem
        .send_event(quality::REPORT, SessionHandle::GLOBAL, &[])
        .await?;
    entered.notified().await;

    let caller = spawn_call(&link.client, entropy::INIT, SessionHandle::new(7), &[]);
    let command = link.modem.next_command().await?;
    link.modem.respond(&command, 0, &[]).await?;
    let _payload = tokio::time::timeout(Duration::from_secs(1), caller).await???;

    release.notify_one();
    Ok(())
}

#[tokio::test]
async fn unsubscribed_events_are_dropped() -> TestResult {
    let mut link = link();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    link.client.subscribe_fn(quality::REPORT, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    })?;
    assert!(link.client.unsubscribe(quality::REPORT).is_some());

    link.modem
        .send_event(quality::REPORT, SessionHandle::GLOBAL, &[])
        .await?;
    // A call answered after the event proves the event was processed first.
    let caller = spawn_call(&link.client, entropy::FREE, SessionHandle::new(1), &[]);
    let command = link.modem.next_command().await?;
    link.modem.respond(&command, 0, &[]).await?;
    caller.await??;

    assert_eq!(seen.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn full_event_queue_drops_excess_events() -> TestResult {
    let mut link = link_with(altcom::AltcomClient::builder().event_capacity(1));
    let release = Arc::new(Notify::new());
    let delivered = Arc::new(AtomicUsize::new(0));
    let entered = Arc::new(Notify::new());
    let (gate, count, signal) = (
        Arc::clone(&release),
        Arc::clone(&delivered),
        Arc::clone(&entered),
    );
    link.client.subscribe(
        quality::REPORT,
        Arc::new(move |_event: Event| {
            let gate = Arc::clone(&gate);
            let count = Arc::clone(&count);
            let signal = Arc::clone(&signal);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                signal.notify_one();
                gate.notified().await;
            }
            .boxed()
        }),
    )?;

    // First event occupies the handler, second fills the queue, the rest drop.
    link.modem
        .send_event(quality::REPORT, SessionHandle::GLOBAL, &[])
        .await?;
    entered.notified().await;
    for _ in 0..3 {
        link.modem
            .send_event(quality::REPORT, SessionHandle::GLOBAL, &[])
            .await?;
    }
    let caller = spawn_call(&link.client, entropy::FREE, SessionHandle::new(1), &[]);
    let command = link.modem.next_command().await?;
    link.modem.respond(&command, 0, &[]).await?;
    caller.await??;

    release.notify_one();
    entered.notified().await;
    release.notify_one();
    tokio::task::yield_now().await;
    assert_eq!(delivered.load(Ordering::SeqCst), 2);
    Ok(())
}
