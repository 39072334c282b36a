//! Task reading frames from the modem and routing them.
//!
//! `InboundLoop` owns the read half of the transport. Each chunk is fed to a
//! [`FrameAssembler`]; every complete response frame is offered first to the
//! [`TransactionRegistry`], then, if no call claimed it and its identifier
//! pair is a catalogued event, to the [`EventRouter`]. Anything else is
//! logged and dropped. Malformed input never stops the loop; a transport
//! error does, and fails every pending call with it.

use std::sync::Arc;

use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::{
    catalog::CommandCatalog,
    codec::{CodecError, Frame, FramingError, ResponseFrame},
    correlation::CorrelatableFrame,
    error::CallError,
    events::{Event, EventRouter},
    frame::FrameAssembler,
    metrics,
    registry::{TransactionRegistry, deadline_after},
    transport::TransportReader,
};

/// Why the inbound loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// The shutdown token fired.
    Shutdown,
    /// The transport failed; pending calls were failed with the error.
    TransportFailed,
}

/// Reader task turning transport bytes into resolved calls and events.
pub struct InboundLoop<R> {
    reader: R,
    assembler: FrameAssembler,
    registry: Arc<TransactionRegistry>,
    router: Arc<EventRouter>,
    catalog: Arc<CommandCatalog>,
    frame_timeout: Duration,
    shutdown: CancellationToken,
}

impl<R> std::fmt::Debug for InboundLoop<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundLoop")
            .field("state", &self.assembler.state())
            .field("frame_timeout", &self.frame_timeout)
            .finish_non_exhaustive()
    }
}

impl<R> InboundLoop<R>
where
    R: TransportReader,
{
    /// Create a loop reading from `reader`.
    #[must_use]
    pub fn new(
        reader: R,
        assembler: FrameAssembler,
        registry: Arc<TransactionRegistry>,
        router: Arc<EventRouter>,
        catalog: Arc<CommandCatalog>,
        frame_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reader,
            assembler,
            registry,
            router,
            catalog,
            frame_timeout,
            shutdown,
        }
    }

    /// Read and dispatch frames until shutdown or transport failure.
    pub async fn run(mut self) -> LoopExit {
        if self.shutdown.is_cancelled() {
            return LoopExit::Shutdown;
        }
        debug!("inbound loop started");
        let exit = loop {
            let deadline = self
                .assembler
                .frame_started()
                .map(|started| deadline_after(started, self.frame_timeout));

            let received = tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break LoopExit::Shutdown,

                received = receive_until(&mut self.reader, deadline) => received,
            };

            match received {
                Ok(Some(chunk)) => {
                    trace!(len = chunk.len(), "bytes received");
                    self.assembler.push(&chunk);
                    self.drain();
                }
                Ok(None) => self.expire_partial(),
                Err(e) => {
                    error!(error = %e, "modem transport failed");
                    let failed = self.registry.fail_all(CallError::transport(e));
                    debug!(failed, "pending calls failed after transport error");
                    self.shutdown.cancel();
                    break LoopExit::TransportFailed;
                }
            }
        };
        debug!(?exit, "inbound loop stopped");
        exit
    }

    fn drain(&mut self) {
        while let Some(next) = self.assembler.next_frame() {
            match next {
                Ok(Frame::Response(response)) => {
                    metrics::inc_inbound_frames();
                    self.dispatch(response);
                }
                Ok(Frame::Command(command)) => {
                    metrics::inc_inbound_frames();
                    let e = CodecError::from(FramingError::UnexpectedFrameType("command"));
                    warn!(command = %command.header.command, error = %e, "frame dropped");
                    metrics::inc_dropped(e.reason());
                }
                Err(e @ CodecError::UnknownCommand(_)) => {
                    warn!(error = %e, "unrecognised frame dropped");
                    metrics::inc_dropped(e.reason());
                }
                Err(e) => {
                    warn!(error = %e, "malformed inbound data dropped");
                    metrics::inc_dropped(e.reason());
                }
            }
        }
    }

    fn dispatch(&self, response: ResponseFrame) {
        let key = response.header.correlation_key();
        // The payload is reference counted; the clone only survives a miss.
        if self.registry.resolve(&key, response.clone()) {
            return;
        }
        if self.catalog.is_event(key.command) {
            self.router.route(Event::from(response));
            return;
        }
        warn!(
            %key,
            result = response.header.result,
            "unexpected response dropped"
        );
        metrics::inc_dropped("unexpected_response");
    }

    fn expire_partial(&mut self) {
        let buffered = self.assembler.discard_partial();
        let e = CodecError::FrameTimeout { buffered };
        warn!(error = %e, "partial frame discarded");
        metrics::inc_dropped(e.reason());
    }
}

/// Receive the next chunk, or `Ok(None)` once `deadline` passes.
async fn receive_until<R: TransportReader>(
    reader: &mut R,
    deadline: Option<Instant>,
) -> std::io::Result<Option<bytes::Bytes>> {
    match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, reader.receive()).await {
            Ok(received) => received.map(Some),
            Err(_) => Ok(None),
        },
        None => reader.receive().await.map(Some),
    }
}
