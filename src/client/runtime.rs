//! Client handle shared by feature APIs and applications.

use std::{fmt, io, sync::Arc};

use bytes::Bytes;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{AltcomClientBuilder, ClientConfig};
use crate::{
    catalog::{CommandCatalog, CommandKind},
    codec::{CodecError, CommandHeader, FrameCodec},
    correlation::{CommandId, CorrelationKey, SessionHandle},
    error::{CallError, SubscribeError},
    events::{Event, EventHandler, EventRouter},
    inbound::LoopExit,
    metrics,
    outbound::OutboundHandle,
    registry::{PendingCall, TransactionRegistry},
};

pub(super) struct Tasks {
    pub(super) inbound: JoinHandle<LoopExit>,
    pub(super) events: JoinHandle<()>,
    pub(super) writer: JoinHandle<()>,
    pub(super) sweeper: JoinHandle<()>,
}

pub(super) struct ClientInner {
    pub(super) outbound: OutboundHandle,
    pub(super) codec: FrameCodec,
    pub(super) catalog: Arc<CommandCatalog>,
    pub(super) registry: Arc<TransactionRegistry>,
    pub(super) router: Arc<EventRouter>,
    pub(super) config: ClientConfig,
    pub(super) shutdown: CancellationToken,
    pub(super) tasks: Mutex<Option<Tasks>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) { self.shutdown.cancel(); }
}

/// Handle for issuing calls to the modem and subscribing to its events.
///
/// Clones share one transport, registry and event router. Dropping the last
/// clone stops the background tasks.
///
/// # Examples
///
/// ```
/// use altcom::{AltcomClient, IoTransport, SessionHandle, feature::entropy};
///
/// # #[tokio::main]
/// # async fn main() {
/// let (near, _far) = tokio::io::duplex(1024);
/// let client = AltcomClient::builder().connect(IoTransport::new(near));
/// let pending = client
///     .begin_call(entropy::INIT, SessionHandle::new(7), &[])
///     .await
///     .expect("request written");
/// assert_eq!(pending.key().session, SessionHandle::new(7));
/// client.shutdown().await;
/// # }
/// ```
#[derive(Clone)]
pub struct AltcomClient {
    pub(super) inner: Arc<ClientInner>,
}

impl fmt::Debug for AltcomClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AltcomClient")
            .field("config", &self.inner.config)
            .field("pending", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

impl AltcomClient {
    /// Start building a client.
    #[must_use]
    pub fn builder() -> AltcomClientBuilder { AltcomClientBuilder::new() }

    /// Issue a call and wait for its response payload using the configured
    /// call timeout.
    ///
    /// # Errors
    ///
    /// See [`call_with_timeout`](Self::call_with_timeout).
    pub async fn call(
        &self,
        command: CommandId,
        session: SessionHandle,
        payload: &[u8],
    ) -> Result<Bytes, CallError> {
        let timeout = self.inner.config.call_timeout_value();
        self.call_with_timeout(command, session, payload, timeout)
            .await
    }

    /// Issue a call and wait up to `timeout` for its response payload.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Remote`] when the modem answers with a non-zero
    /// result code, [`CallError::Timeout`] when no answer arrives in time,
    /// [`CallError::DuplicateKey`] when an identical call is already pending,
    /// [`CallError::Codec`] when the request cannot be encoded,
    /// [`CallError::SessionClosed`] when the session is torn down while
    /// waiting, and [`CallError::Transport`] once the link has failed.
    pub async fn call_with_timeout(
        &self,
        command: CommandId,
        session: SessionHandle,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Bytes, CallError> {
        let outcome = match self
            .begin_call_with_timeout(command, session, payload, timeout)
            .await
        {
            Ok(pending) => pending.wait().await.and_then(|response| {
                if response.header.is_success() {
                    Ok(response.payload)
                } else {
                    Err(CallError::Remote(response.header.result))
                }
            }),
            Err(e) => Err(e),
        };
        match &outcome {
            Ok(_) => metrics::inc_calls("success"),
            Err(e) => {
                debug!(%command, %session, error = %e, "call failed");
                metrics::inc_calls(e.outcome());
            }
        }
        outcome
    }

    /// Register and transmit a call without waiting for the response.
    ///
    /// The returned handle resolves through [`PendingCall::wait`]; dropping
    /// it withdraws the call.
    ///
    /// # Errors
    ///
    /// Fails as [`call_with_timeout`](Self::call_with_timeout) does before
    /// the request is on the wire.
    pub async fn begin_call(
        &self,
        command: CommandId,
        session: SessionHandle,
        payload: &[u8],
    ) -> Result<PendingCall, CallError> {
        let timeout = self.inner.config.call_timeout_value();
        self.begin_call_with_timeout(command, session, payload, timeout)
            .await
    }

    /// [`begin_call`](Self::begin_call) with an explicit timeout.
    ///
    /// # Errors
    ///
    /// See [`begin_call`](Self::begin_call).
    pub async fn begin_call_with_timeout(
        &self,
        command: CommandId,
        session: SessionHandle,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<PendingCall, CallError> {
        let inner = &self.inner;
        if inner.catalog.kind(command) != Some(CommandKind::Call) {
            return Err(CodecError::UnknownCommand(command).into());
        }
        let frame = inner
            .codec
            .encode_command(&CommandHeader { command, session }, payload)?;

        let key = CorrelationKey::new(command, session);
        let pending = inner.registry.register(key, timeout)?;

        inner.outbound.send(frame).await?;
        trace!(%key, len = payload.len(), "request written");
        Ok(pending)
    }

    /// Register `handler` for event `kind`, returning the handler it replaces.
    ///
    /// # Errors
    ///
    /// Returns [`SubscribeError::NotAnEvent`] when `kind` is not a catalogued
    /// event.
    pub fn subscribe(
        &self,
        kind: CommandId,
        handler: EventHandler,
    ) -> Result<Option<EventHandler>, SubscribeError> {
        self.inner.router.subscribe(kind, handler)
    }

    /// Register a synchronous callback for event `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SubscribeError::NotAnEvent`] when `kind` is not a catalogued
    /// event.
    pub fn subscribe_fn<F>(
        &self,
        kind: CommandId,
        callback: F,
    ) -> Result<Option<EventHandler>, SubscribeError>
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.inner.router.subscribe_fn(kind, callback)
    }

    /// Remove the handler for event `kind`.
    pub fn unsubscribe(&self, kind: CommandId) -> Option<EventHandler> {
        self.inner.router.unsubscribe(kind)
    }

    /// Fail every call pending on `session` with [`CallError::SessionClosed`].
    ///
    /// Returns the number of calls terminated.
    pub fn close_session(&self, session: SessionHandle) -> usize {
        let closed = self.inner.registry.cancel_session(session);
        debug!(%session, closed, "session closed");
        closed
    }

    /// Stop the background tasks and fail every pending call.
    ///
    /// Later calls fail immediately. Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.registry.fail_all(CallError::transport(io::Error::new(
            io::ErrorKind::NotConnected,
            "client shut down",
        )));
        let Some(tasks) = self.inner.tasks.lock().await.take() else {
            return;
        };
        if let Err(e) = tasks.inbound.await {
            warn!(error = %e, "inbound loop task failed");
        }
        if let Err(e) = tasks.events.await {
            warn!(error = %e, "event task failed");
        }
        if let Err(e) = tasks.writer.await {
            warn!(error = %e, "outbound writer task failed");
        }
        if let Err(e) = tasks.sweeper.await {
            warn!(error = %e, "sweeper task failed");
        }
        debug!("client shut down");
    }

    /// Whether the client has shut down or lost its transport.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.inner.registry.is_closed() }

    /// Settings the client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig { &self.inner.config }

    /// Catalogue of identifier pairs known to this client.
    #[must_use]
    pub fn catalog(&self) -> &Arc<CommandCatalog> { &self.inner.catalog }

    /// Registry of calls awaiting responses.
    #[must_use]
    pub fn registry(&self) -> &Arc<TransactionRegistry> { &self.inner.registry }
}

/// Periodically resolve expired calls whose callers are not waiting.
pub(super) async fn sweep_expired(
    registry: Arc<TransactionRegistry>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => break,

            now = ticker.tick() => {
                let swept = registry.sweep_expired(now);
                if swept > 0 {
                    debug!(swept, "expired calls swept");
                }
            }
        }
    }
}
