//! Builder for configuring and starting an [`AltcomClient`].

use std::sync::Arc;

use tokio::{sync::Mutex, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    AltcomClient,
    ClientConfig,
    runtime::{ClientInner, Tasks, sweep_expired},
};
use crate::{
    catalog::CommandCatalog,
    codec::FrameCodec,
    events::EventRouter,
    frame::FrameAssembler,
    inbound::InboundLoop,
    outbound::{DEFAULT_OUTBOUND_CAPACITY, OutboundWriter},
    registry::TransactionRegistry,
    transport::Transport,
};

/// Builder for [`AltcomClient`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use altcom::client::AltcomClientBuilder;
///
/// let builder = AltcomClientBuilder::new().call_timeout(Duration::from_secs(2));
/// assert_eq!(builder.config_value().call_timeout_value(), Duration::from_secs(2));
/// ```
#[derive(Debug, Default)]
pub struct AltcomClientBuilder {
    config: ClientConfig,
    catalog: Option<Arc<CommandCatalog>>,
}

impl AltcomClientBuilder {
    /// Create a builder with default settings and the standard catalogue.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `catalog` instead of [`CommandCatalog::standard`].
    #[must_use]
    pub fn catalog(mut self, catalog: CommandCatalog) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    /// Default time a call waits for its response.
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.call_timeout(timeout);
        self
    }

    /// Time a partially received frame may stay incomplete.
    #[must_use]
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.frame_timeout(timeout);
        self
    }

    /// Period of the expired-call sweeper.
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config = self.config.sweep_interval(interval);
        self
    }

    /// Capacity of the event queue.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.event_capacity(capacity);
        self
    }

    /// Largest payload accepted in either direction.
    #[must_use]
    pub fn max_payload_len(mut self, len: usize) -> Self {
        self.config = self.config.max_payload_len(len);
        self
    }

    /// Settings collected so far.
    #[must_use]
    pub fn config_value(&self) -> &ClientConfig { &self.config }

    /// Split `transport` and start the inbound loop, outbound writer, event
    /// dispatcher and sweeper tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect<T: Transport>(self, transport: T) -> AltcomClient {
        let Self { config, catalog } = self;
        let catalog = catalog.unwrap_or_else(|| Arc::new(CommandCatalog::standard()));
        let codec = FrameCodec::new(config.max_payload_len_value());
        let registry = TransactionRegistry::new();
        let shutdown = CancellationToken::new();
        let (router, dispatcher) =
            EventRouter::new(Arc::clone(&catalog), config.event_capacity_value());
        let router = Arc::new(router);
        let (reader, writer) = transport.into_split();

        let inbound = InboundLoop::new(
            reader,
            FrameAssembler::new(codec, Arc::clone(&catalog)),
            Arc::clone(&registry),
            Arc::clone(&router),
            Arc::clone(&catalog),
            config.frame_timeout_value(),
            shutdown.clone(),
        );
        let (outbound_writer, outbound) = OutboundWriter::new(
            writer,
            DEFAULT_OUTBOUND_CAPACITY,
            Arc::clone(&registry),
            shutdown.clone(),
        );
        let tasks = Tasks {
            inbound: tokio::spawn(inbound.run()),
            events: tokio::spawn(dispatcher.run(shutdown.clone())),
            writer: tokio::spawn(outbound_writer.run()),
            sweeper: tokio::spawn(sweep_expired(
                Arc::clone(&registry),
                config.sweep_interval_value(),
                shutdown.clone(),
            )),
        };
        debug!(?config, commands = catalog.len(), "client connected");

        AltcomClient {
            inner: Arc::new(ClientInner {
                outbound,
                codec,
                catalog,
                registry,
                router,
                config,
                shutdown,
                tasks: Mutex::new(Some(tasks)),
            }),
        }
    }
}
