//! Call dispatcher and event subscription front end.
//!
//! [`AltcomClient`] owns the write half of the modem transport and the
//! background tasks: the inbound frame loop, the event dispatcher and the
//! sweeper that expires calls nobody is waiting on. Feature APIs are thin
//! wrappers around [`AltcomClient::call`].

mod builder;
mod config;
mod runtime;

pub use builder::AltcomClientBuilder;
pub use config::{
    ClientConfig,
    DEFAULT_CALL_TIMEOUT,
    DEFAULT_FRAME_TIMEOUT,
    DEFAULT_SWEEP_INTERVAL,
};
pub use runtime::AltcomClient;
