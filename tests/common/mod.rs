//! Shared utilities for integration tests.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use altcom::{AltcomClient, AltcomClientBuilder, CommandId, SessionHandle};
use altcom_testing::{MockModem, pair_with, pair_with_capacity};

/// Result type used by fallible tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Client and scripted modem joined by a duplex pipe.
pub struct Link {
    pub client: AltcomClient,
    pub modem: MockModem,
}

/// Client with default settings connected to a mock modem.
///
/// Must be called from within a Tokio runtime.
pub fn link() -> Link { link_with(AltcomClient::builder()) }

/// Client built from `builder` connected to a mock modem.
pub fn link_with(builder: AltcomClientBuilder) -> Link {
    let (client, modem) = pair_with(builder);
    Link { client, modem }
}

/// Like [`link_with`] over a pipe buffering only `capacity` bytes.
pub fn link_with_capacity(builder: AltcomClientBuilder, capacity: usize) -> Link {
    let (client, modem) = pair_with_capacity(builder, capacity);
    Link { client, modem }
}

/// Spawn `client.call(..)` so the test can play the modem meanwhile.
pub fn spawn_call(
    client: &AltcomClient,
    command: CommandId,
    session: SessionHandle,
    payload: &[u8],
) -> tokio::task::JoinHandle<altcom::Result<bytes::Bytes>> {
    let client = client.clone();
    let payload = payload.to_vec();
    tokio::spawn(async move { client.call(command, session, &payload).await })
}
