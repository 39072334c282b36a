#![doc(html_root_url = "https://docs.rs/altcom/latest")]
//! Public API for the `altcom` library.
//!
//! This crate implements the application-processor side of the ALTCOM
//! modem command layer: fixed-layout command frames written to the modem,
//! response frames matched back to the calls that issued them, and
//! unsolicited event frames routed to subscribed handlers, all over one
//! transport shared by concurrent callers.

pub mod byte_order;
pub mod catalog;
pub mod client;
pub mod codec;
pub mod correlation;
pub mod error;
pub mod events;
pub mod feature;
pub mod frame;
pub mod inbound;
pub mod metrics;
pub mod outbound;
pub mod panic;
pub mod registry;
pub mod transport;

pub use catalog::{CommandCatalog, CommandKind, FeatureFamily};
pub use client::{AltcomClient, AltcomClientBuilder, ClientConfig};
pub use codec::{CodecError, Frame, FrameCodec, FramingError, ResponseFrame};
pub use correlation::{CommandId, CorrelatableFrame, CorrelationKey, SessionHandle};
/// Result type alias for call outcomes.
pub use error::Result;
pub use error::{CallError, SubscribeError};
pub use events::{Event, EventHandler, RouteOutcome};
pub use feature::{FeatureError, Payload};
pub use metrics::{CALLS_PENDING, CALLS_TOTAL, EVENTS_TOTAL, FRAMES_DROPPED, FRAMES_INBOUND};
pub use registry::{PendingCall, TransactionRegistry};
pub use transport::{IoTransport, Transport, TransportReader, TransportWriter};
