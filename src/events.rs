//! Delivery of unsolicited modem events to registered handlers.
//!
//! The inbound frame loop hands every frame that matched no pending call, and
//! whose identifier pair is a catalogued event kind, to [`EventRouter::route`].
//! Routing only enqueues: handlers run on the separate [`EventDispatcher`]
//! task, so a slow or stalled handler can delay other events but never the
//! delivery of call responses. A full queue drops the event with a warning.

use std::{fmt, panic::AssertUnwindSafe, sync::Arc};

use bytes::Bytes;
use dashmap::DashMap;
use futures::{FutureExt, future::BoxFuture};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    catalog::CommandCatalog,
    codec::ResponseFrame,
    correlation::{CommandId, SessionHandle},
    error::SubscribeError,
    metrics,
    panic::format_panic,
};

/// Default capacity of the event queue.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// An unsolicited notification from the modem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    /// Event kind.
    pub kind: CommandId,
    /// Session the event refers to, or [`SessionHandle::GLOBAL`].
    pub session: SessionHandle,
    /// Result code carried by the frame.
    pub result: i32,
    /// Feature-owned payload.
    pub payload: Bytes,
}

impl From<ResponseFrame> for Event {
    fn from(frame: ResponseFrame) -> Self {
        Self {
            kind: frame.header.command,
            session: frame.header.session,
            result: frame.header.result,
            payload: frame.payload,
        }
    }
}

/// Handler invoked for each event of a subscribed kind.
pub type EventHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync + 'static>;

/// Result of handing an event to the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The event was queued for its handler.
    Queued,
    /// No handler is registered for the kind; the event was dropped.
    NoSubscriber,
    /// The queue was full; the event was dropped.
    QueueFull,
    /// The dispatcher has stopped; the event was dropped.
    Closed,
}

impl RouteOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::NoSubscriber => "no_subscriber",
            Self::QueueFull => "queue_full",
            Self::Closed => "closed",
        }
    }
}

type HandlerMap = DashMap<CommandId, EventHandler>;

/// Subscription table and producer side of the event queue.
pub struct EventRouter {
    catalog: Arc<CommandCatalog>,
    handlers: Arc<HandlerMap>,
    tx: mpsc::Sender<Event>,
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("subscriptions", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl EventRouter {
    /// Create a router and the dispatcher that drains its queue.
    ///
    /// `capacity` is clamped to at least one slot.
    #[must_use]
    pub fn new(catalog: Arc<CommandCatalog>, capacity: usize) -> (Self, EventDispatcher) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handlers = Arc::new(HandlerMap::new());
        let router = Self {
            catalog,
            handlers: Arc::clone(&handlers),
            tx,
        };
        (router, EventDispatcher { rx, handlers })
    }

    /// Register `handler` for `kind`, replacing and returning any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`SubscribeError::NotAnEvent`] if `kind` is not catalogued as
    /// an event.
    pub fn subscribe(
        &self,
        kind: CommandId,
        handler: EventHandler,
    ) -> Result<Option<EventHandler>, SubscribeError> {
        if !self.catalog.is_event(kind) {
            return Err(SubscribeError::NotAnEvent(kind));
        }
        let previous = self.handlers.insert(kind, handler);
        if previous.is_some() {
            debug!(%kind, "event handler replaced");
        }
        Ok(previous)
    }

    /// Register a synchronous callback for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SubscribeError::NotAnEvent`] if `kind` is not catalogued as
    /// an event.
    pub fn subscribe_fn<F>(
        &self,
        kind: CommandId,
        callback: F,
    ) -> Result<Option<EventHandler>, SubscribeError>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.subscribe(
            kind,
            Arc::new(move |event: Event| {
                callback(event);
                futures::future::ready(()).boxed()
            }),
        )
    }

    /// Remove the handler for `kind`.
    pub fn unsubscribe(&self, kind: CommandId) -> Option<EventHandler> {
        self.handlers.remove(&kind).map(|(_, handler)| handler)
    }

    /// Whether a handler is registered for `kind`.
    #[must_use]
    pub fn is_subscribed(&self, kind: CommandId) -> bool { self.handlers.contains_key(&kind) }

    /// Queue `event` for its handler.
    pub fn route(&self, event: Event) -> RouteOutcome {
        let kind = event.kind;
        let outcome = if self.handlers.contains_key(&kind) {
            match self.tx.try_send(event) {
                Ok(()) => RouteOutcome::Queued,
                Err(TrySendError::Full(_)) => {
                    warn!(%kind, "event queue full; event dropped");
                    RouteOutcome::QueueFull
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%kind, "event dispatcher stopped; event dropped");
                    RouteOutcome::Closed
                }
            }
        } else {
            debug!(%kind, "no handler for event; dropped");
            RouteOutcome::NoSubscriber
        };
        metrics::inc_events(outcome.as_str());
        outcome
    }
}

/// Consumer side of the event queue; runs handlers one event at a time.
pub struct EventDispatcher {
    rx: mpsc::Receiver<Event>,
    handlers: Arc<HandlerMap>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher").finish_non_exhaustive()
    }
}

impl EventDispatcher {
    /// Deliver queued events until `shutdown` fires or the router is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                event = self.rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.deliver(event).await;
        }
        debug!("event dispatcher stopped");
    }

    async fn deliver(&self, event: Event) {
        let kind = event.kind;
        // Clone the handler out so no map guard is held across the await.
        let handler = self
            .handlers
            .get(&kind)
            .map(|entry| Arc::clone(entry.value()));
        let Some(handler) = handler else {
            debug!(%kind, "handler removed before delivery; event dropped");
            return;
        };

        let delivery = AssertUnwindSafe(async move { handler(event).await }).catch_unwind();
        if let Err(panic) = delivery.await {
            let panic_msg = format_panic(&panic);
            error!(%kind, panic = %panic_msg, "event handler panicked");
        }
    }
}
