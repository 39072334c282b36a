//! Task owning the write half of the transport.
//!
//! Callers hand encoded frames to [`OutboundWriter`] through a bounded queue
//! and wait for an acknowledgement. Only this task touches the transport, so
//! a caller that gives up mid-write cannot leave a torn frame on the link:
//! once a frame is dequeued it is written in full.

use std::{io, sync::Arc};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::{error::CallError, registry::TransactionRegistry, transport::TransportWriter};

/// Default capacity of the outbound frame queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 32;

/// One encoded frame and the channel acknowledging its write.
#[derive(Debug)]
pub struct OutboundFrame {
    frame: Bytes,
    ack: oneshot::Sender<Result<(), CallError>>,
}

/// Producer side of the outbound queue.
#[derive(Clone, Debug)]
pub struct OutboundHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl OutboundHandle {
    /// Queue `frame` and wait until it has been written.
    ///
    /// Dropping the returned future never interrupts a write in progress.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Transport`] when the write fails or the writer
    /// task has stopped.
    pub async fn send(&self, frame: Bytes) -> Result<(), CallError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(OutboundFrame { frame, ack })
            .await
            .map_err(|_| stopped())?;
        done.await.map_err(|_| stopped())?
    }
}

fn stopped() -> CallError {
    CallError::transport(io::Error::new(
        io::ErrorKind::NotConnected,
        "outbound writer stopped",
    ))
}

/// Consumer side of the outbound queue.
pub struct OutboundWriter<W> {
    writer: W,
    rx: mpsc::Receiver<OutboundFrame>,
    registry: Arc<TransactionRegistry>,
    shutdown: CancellationToken,
}

impl<W> std::fmt::Debug for OutboundWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundWriter").finish_non_exhaustive()
    }
}

impl<W> OutboundWriter<W>
where
    W: TransportWriter,
{
    /// Create the writer task state and the handle feeding it.
    ///
    /// `capacity` is clamped to at least one slot.
    #[must_use]
    pub fn new(
        writer: W,
        capacity: usize,
        registry: Arc<TransactionRegistry>,
        shutdown: CancellationToken,
    ) -> (Self, OutboundHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                writer,
                rx,
                registry,
                shutdown,
            },
            OutboundHandle { tx },
        )
    }

    /// Write queued frames until shutdown or a transport failure.
    ///
    /// A write failure fails every pending call and cancels `shutdown`.
    pub async fn run(mut self) {
        loop {
            let next = tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                next = self.rx.recv() => match next {
                    Some(next) => next,
                    None => break,
                },
            };
            let len = next.frame.len();
            match self.writer.send(next.frame).await {
                Ok(()) => {
                    trace!(len, "frame written");
                    let _ = next.ack.send(Ok(()));
                }
                Err(e) => {
                    error!(error = %e, "failed to write frame; closing link");
                    let failure = CallError::transport(e);
                    self.registry.fail_all(failure.clone());
                    self.shutdown.cancel();
                    let _ = next.ack.send(Err(failure));
                    break;
                }
            }
        }
        debug!("outbound writer stopped");
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;

    struct Recorder {
        written: mpsc::UnboundedSender<Bytes>,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl TransportWriter for Recorder {
        async fn send(&mut self, frame: Bytes) -> io::Result<()> {
            self.gate.notified().await;
            self.written
                .send(frame)
                .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    struct Broken;

    #[async_trait]
    impl TransportWriter for Broken {
        async fn send(&mut self, _frame: Bytes) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_send_is_still_written_whole() {
        let (written, mut seen) = mpsc::unbounded_channel();
        let gate = Arc::new(Notify::new());
        let shutdown = CancellationToken::new();
        let (writer, handle) = OutboundWriter::new(
            Recorder {
                written,
                gate: Arc::clone(&gate),
            },
            4,
            TransactionRegistry::new(),
            shutdown.clone(),
        );
        let task = tokio::spawn(writer.run());

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            handle.send(Bytes::from_static(b"first")),
        )
        .await;
        assert!(abandoned.is_err());

        gate.notify_one();
        assert_eq!(seen.recv().await.expect("first frame"), Bytes::from_static(b"first"));

        let second = tokio::spawn(async move { handle.send(Bytes::from_static(b"second")).await });
        gate.notify_one();
        second.await.expect("sender task").expect("write acknowledged");
        assert_eq!(seen.recv().await.expect("second frame"), Bytes::from_static(b"second"));

        shutdown.cancel();
        task.await.expect("writer task");
    }

    #[tokio::test]
    async fn write_failure_closes_registry() {
        let registry = TransactionRegistry::new();
        let shutdown = CancellationToken::new();
        let (writer, handle) =
            OutboundWriter::new(Broken, 1, Arc::clone(&registry), shutdown.clone());
        let task = tokio::spawn(writer.run());

        let err = handle
            .send(Bytes::from_static(b"frame"))
            .await
            .expect_err("write fails");
        assert!(err.is_transport());
        task.await.expect("writer task");
        assert!(registry.is_closed());
        assert!(shutdown.is_cancelled());
        assert!(handle.send(Bytes::new()).await.is_err());
    }
}
