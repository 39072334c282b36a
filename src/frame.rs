//! Incremental frame assembly for the inbound byte stream.
//!
//! The transport hands over arbitrary chunks. [`FrameAssembler`] buffers them
//! and walks the read states `Idle → ReadingHeader → ReadingPayload`, yielding
//! one decoded frame (or one codec error) at a time. Noise before a frame is
//! skipped by scanning for the protocol magic, so a corrupted frame costs at
//! most its own bytes.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::time::Instant;

use crate::{
    byte_order::write_network_u32,
    catalog::CommandCatalog,
    codec::{CodecError, Frame, FrameCodec, FramePrefix, FramingError, MAGIC, PREFIX_LEN},
};

const MAGIC_LEN: usize = 4;

/// Read state of the assembler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadState {
    /// No bytes of the next frame have arrived.
    Idle,
    /// Part of a header is buffered.
    ReadingHeader,
    /// The header is decoded and the payload is being accumulated.
    ReadingPayload {
        /// Bytes of payload still missing.
        remaining: usize,
    },
}

/// Buffer turning a byte stream into frames.
#[derive(Debug)]
pub struct FrameAssembler {
    codec: FrameCodec,
    catalog: Arc<CommandCatalog>,
    buffer: BytesMut,
    prefix: Option<FramePrefix>,
    started: Option<Instant>,
}

impl FrameAssembler {
    /// Create an assembler decoding with `codec` against `catalog`.
    #[must_use]
    pub fn new(codec: FrameCodec, catalog: Arc<CommandCatalog>) -> Self {
        Self {
            codec,
            catalog,
            buffer: BytesMut::with_capacity(codec.max_payload_len().min(1024)),
            prefix: None,
            started: None,
        }
    }

    /// Current read state.
    #[must_use]
    pub fn state(&self) -> ReadState {
        match self.prefix {
            Some(prefix) => ReadState::ReadingPayload {
                remaining: prefix.frame_len().saturating_sub(self.buffer.len()),
            },
            None if self.buffer.is_empty() => ReadState::Idle,
            None => ReadState::ReadingHeader,
        }
    }

    /// When the first byte of the partially buffered frame arrived.
    #[must_use]
    pub fn frame_started(&self) -> Option<Instant> { self.started }

    /// Number of buffered bytes.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buffer.len() }

    /// Append bytes received from the transport.
    pub fn push(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if self.buffer.is_empty() {
            self.started = Some(Instant::now());
        }
        self.buffer.extend_from_slice(data);
    }

    /// Try to take the next frame from the buffer.
    ///
    /// Returns `None` when more bytes are needed. Errors consume the bytes
    /// that caused them, so calling again makes progress.
    pub fn next_frame(&mut self) -> Option<Result<Frame, CodecError>> {
        if self.prefix.is_none() {
            if let Some(skipped) = self.skip_noise() {
                return Some(Err(FramingError::Noise { skipped }.into()));
            }
            if self.buffer.len() < PREFIX_LEN {
                return None;
            }
            match self.codec.decode_prefix(&self.buffer[..PREFIX_LEN]) {
                Ok(prefix) => self.prefix = Some(prefix),
                Err(error) => {
                    // Drop the magic so the scan resumes past this header.
                    self.consume(MAGIC_LEN);
                    return Some(Err(error.into()));
                }
            }
        }

        let frame_len = self.prefix?.frame_len();
        if self.buffer.len() < frame_len {
            return None;
        }
        let raw = self.buffer.split_to(frame_len);
        self.prefix = None;
        self.restart_clock();
        Some(self.codec.decode(&raw, &self.catalog))
    }

    /// Drop any partially assembled frame, returning the bytes discarded.
    pub fn discard_partial(&mut self) -> usize {
        let discarded = self.buffer.len();
        self.buffer.clear();
        self.prefix = None;
        self.started = None;
        discarded
    }

    fn skip_noise(&mut self) -> Option<usize> {
        let magic = write_network_u32(MAGIC);
        let skip = match self
            .buffer
            .windows(MAGIC_LEN)
            .position(|window| window == magic)
        {
            Some(position) => position,
            None => {
                let len = self.buffer.len();
                let keep = (1..MAGIC_LEN)
                    .rev()
                    .find(|&n| len >= n && self.buffer[len - n..] == magic[..n])
                    .unwrap_or(0);
                len - keep
            }
        };
        if skip == 0 {
            return None;
        }
        self.consume(skip);
        Some(skip)
    }

    fn consume(&mut self, count: usize) {
        self.buffer.advance(count.min(self.buffer.len()));
        self.restart_clock();
    }

    fn restart_clock(&mut self) {
        self.started = if self.buffer.is_empty() {
            None
        } else {
            Some(Instant::now())
        };
    }
}
