//! Sockets hosted on the modem's IP stack.
//!
//! The socket identifier returned by `OPEN` is the session handle of every
//! later call on that socket.

use std::net::SocketAddrV4;

use bincode::{Decode, Encode};
use tracing::debug;

use super::{FeatureError, Payload};
use crate::{
    catalog::FeatureFamily,
    client::AltcomClient,
    correlation::{CommandId, SessionHandle},
};

/// Main command identifier of the socket family.
pub const MAIN_ID: u16 = 0x0130;
/// Create a socket.
pub const OPEN: CommandId = CommandId::new(MAIN_ID, 0x01);
/// Connect a socket to a remote endpoint.
pub const CONNECT: CommandId = CommandId::new(MAIN_ID, 0x02);
/// Close a socket.
pub const CLOSE: CommandId = CommandId::new(MAIN_ID, 0x03);

const AF_INET: u8 = 2;
const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;

/// Transport protocol of a socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketKind {
    /// TCP stream.
    Stream,
    /// UDP datagrams.
    Datagram,
}

impl SocketKind {
    const fn wire(self) -> (u8, u8) {
        match self {
            Self::Stream => (1, IPPROTO_TCP),
            Self::Datagram => (2, IPPROTO_UDP),
        }
    }
}

#[derive(Debug, Encode, Decode)]
struct OpenRequest {
    domain: u8,
    kind: u8,
    protocol: u8,
}

#[derive(Debug, Encode, Decode)]
struct OpenResponse {
    socket_id: u32,
}

#[derive(Debug, Encode, Decode)]
struct ConnectRequest {
    addr: [u8; 4],
    port: u16,
}

/// Socket feature bound to a client.
#[derive(Clone, Debug)]
pub struct Sockets {
    client: AltcomClient,
}

impl FeatureFamily for Sockets {
    const MAIN_ID: u16 = MAIN_ID;
    const CALLS: &'static [u16] = &[OPEN.sub, CONNECT.sub, CLOSE.sub];
}

impl Sockets {
    /// Bind the feature to `client`.
    #[must_use]
    pub fn new(client: AltcomClient) -> Self { Self { client } }

    /// Create an IPv4 socket and return its handle.
    ///
    /// # Errors
    ///
    /// Returns any call or decode failure.
    pub async fn open(&self, kind: SocketKind) -> Result<SessionHandle, FeatureError> {
        let (kind_id, protocol) = kind.wire();
        let payload = OpenRequest {
            domain: AF_INET,
            kind: kind_id,
            protocol,
        }
        .to_payload()?;
        let response = self
            .client
            .call(OPEN, SessionHandle::GLOBAL, &payload)
            .await?;
        let socket = SessionHandle::new(OpenResponse::from_payload(&response)?.socket_id);
        debug!(%socket, ?kind, "socket opened");
        Ok(socket)
    }

    /// Connect `socket` to `addr`.
    ///
    /// # Errors
    ///
    /// Returns any call failure.
    pub async fn connect(&self, socket: SessionHandle, addr: SocketAddrV4) -> Result<(), FeatureError> {
        let payload = ConnectRequest {
            addr: addr.ip().octets(),
            port: addr.port(),
        }
        .to_payload()?;
        self.client.call(CONNECT, socket, &payload).await?;
        debug!(%socket, %addr, "socket connected");
        Ok(())
    }

    /// Close `socket`.
    ///
    /// Calls still pending on the socket fail with
    /// [`CallError::SessionClosed`](crate::CallError::SessionClosed) once
    /// the modem confirms.
    ///
    /// # Errors
    ///
    /// Returns any call failure.
    pub async fn close(&self, socket: SessionHandle) -> Result<(), FeatureError> {
        self.client.call(CLOSE, socket, &[]).await?;
        self.client.close_session(socket);
        debug!(%socket, "socket closed");
        Ok(())
    }
}
