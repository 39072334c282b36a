//! Scripted modem peer over an in-memory duplex pipe.

use std::{io, sync::Arc};

use altcom::{
    AltcomClient,
    AltcomClientBuilder,
    CommandCatalog,
    CommandId,
    CorrelationKey,
    Frame,
    FrameCodec,
    IoTransport,
    SessionHandle,
    codec::{CommandFrame, ResponseHeader},
    frame::FrameAssembler,
};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

const DEFAULT_CAPACITY: usize = 4096;
const READ_CHUNK: usize = 512;

/// Connect a client with default settings to a fresh [`MockModem`].
///
/// Must be called from within a Tokio runtime.
pub fn pair() -> (AltcomClient, MockModem) { pair_with(AltcomClient::builder()) }

/// Connect a client built from `builder` to a fresh [`MockModem`].
pub fn pair_with(builder: AltcomClientBuilder) -> (AltcomClient, MockModem) {
    pair_with_capacity(builder, DEFAULT_CAPACITY)
}

/// Like [`pair_with`], but the pipe buffers at most `capacity` bytes in each
/// direction, so large writes stall until the modem reads.
pub fn pair_with_capacity(
    builder: AltcomClientBuilder,
    capacity: usize,
) -> (AltcomClient, MockModem) {
    let (near, far) = duplex(capacity);
    let max_payload_len = builder.config_value().max_payload_len_value();
    let client = builder.connect(IoTransport::new(near));
    let modem = MockModem::new(far, FrameCodec::new(max_payload_len), Arc::clone(client.catalog()));
    (client, modem)
}

/// Modem side of a duplex pipe.
pub struct MockModem {
    stream: DuplexStream,
    codec: FrameCodec,
    assembler: FrameAssembler,
}

impl MockModem {
    /// Wrap the modem end of a duplex pipe.
    pub fn new(stream: DuplexStream, codec: FrameCodec, catalog: Arc<CommandCatalog>) -> Self {
        Self {
            stream,
            codec,
            assembler: FrameAssembler::new(codec, catalog),
        }
    }

    /// Read the next command frame written by the client.
    ///
    /// # Errors
    ///
    /// Fails when the client side closes or writes something other than a
    /// well-formed command frame.
    pub async fn next_command(&mut self) -> io::Result<CommandFrame> {
        loop {
            if let Some(next) = self.assembler.next_frame() {
                return match next {
                    Ok(Frame::Command(command)) => Ok(command),
                    Ok(Frame::Response(response)) => Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("client wrote a response frame: {response:?}"),
                    )),
                    Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
                };
            }
            let mut chunk = vec![0; READ_CHUNK];
            let read = self.stream.read(&mut chunk).await?;
            if read == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            self.assembler.push(&chunk[..read]);
        }
    }

    /// Read `count` command frames.
    ///
    /// # Errors
    ///
    /// As for [`next_command`](Self::next_command).
    pub async fn next_commands(&mut self, count: usize) -> io::Result<Vec<CommandFrame>> {
        let mut commands = Vec::with_capacity(count);
        for _ in 0..count {
            commands.push(self.next_command().await?);
        }
        Ok(commands)
    }

    /// Answer `command` with `result` and `payload`.
    ///
    /// # Errors
    ///
    /// Fails when the frame cannot be encoded or written.
    pub async fn respond(
        &mut self,
        command: &CommandFrame,
        result: i32,
        payload: &[u8],
    ) -> io::Result<()> {
        let key = CorrelationKey::new(command.header.command, command.header.session);
        self.send_response(key, result, payload).await
    }

    /// Send a response frame for `key`, whether or not a call is waiting.
    ///
    /// # Errors
    ///
    /// Fails when the frame cannot be encoded or written.
    pub async fn send_response(
        &mut self,
        key: CorrelationKey,
        result: i32,
        payload: &[u8],
    ) -> io::Result<()> {
        let bytes = self.encode(key.command, key.session, result, payload)?;
        self.send_raw(&bytes).await
    }

    /// Raise an unsolicited event of `kind`.
    ///
    /// # Errors
    ///
    /// Fails when the frame cannot be encoded or written.
    pub async fn send_event(
        &mut self,
        kind: CommandId,
        session: SessionHandle,
        payload: &[u8],
    ) -> io::Result<()> {
        let bytes = self.encode(kind, session, 0, payload)?;
        self.send_raw(&bytes).await
    }

    /// Write arbitrary bytes to the client.
    ///
    /// # Errors
    ///
    /// Fails when the pipe is closed.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Encode a response frame without sending it.
    ///
    /// # Errors
    ///
    /// Fails when the payload exceeds the codec's limit.
    pub fn encode(
        &self,
        command: CommandId,
        session: SessionHandle,
        result: i32,
        payload: &[u8],
    ) -> io::Result<Bytes> {
        let header = ResponseHeader {
            command,
            session,
            result,
        };
        self.codec
            .encode_response(&header, payload)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }

    /// Close the modem side of the pipe.
    pub async fn hang_up(mut self) {
        let _ = self.stream.shutdown().await;
    }
}
