//! Entropy source contexts for the modem's TLS stack.

use bincode::{Decode, Encode};
use tracing::debug;

use super::{FeatureError, Payload};
use crate::{
    catalog::FeatureFamily,
    client::AltcomClient,
    correlation::{CommandId, SessionHandle},
    error::CallError,
};

/// Main command identifier of the entropy family.
pub const MAIN_ID: u16 = 0x0141;
/// Initialise an entropy context.
pub const INIT: CommandId = CommandId::new(MAIN_ID, 0x01);
/// Release an entropy context.
pub const FREE: CommandId = CommandId::new(MAIN_ID, 0x02);

#[derive(Debug, Encode, Decode)]
struct EntropyRequest {
    ctx: u32,
    subcmd: u32,
}

#[derive(Debug, Encode, Decode)]
struct EntropyResult {
    ret_code: i32,
}

/// Entropy feature bound to a client.
///
/// The context handle doubles as the session handle, so operations on
/// different contexts run concurrently while a repeated operation on the
/// same context is rejected as a duplicate.
#[derive(Clone, Debug)]
pub struct Entropy {
    client: AltcomClient,
}

impl FeatureFamily for Entropy {
    const MAIN_ID: u16 = MAIN_ID;
    const CALLS: &'static [u16] = &[INIT.sub, FREE.sub];
}

impl Entropy {
    /// Bind the feature to `client`.
    #[must_use]
    pub fn new(client: AltcomClient) -> Self { Self { client } }

    /// Initialise the entropy context `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Call`] with [`CallError::Remote`] when the
    /// modem reports a non-zero code, or any other call or decode failure.
    pub async fn init(&self, ctx: SessionHandle) -> Result<(), FeatureError> {
        self.request(INIT, ctx).await
    }

    /// Release the entropy context `ctx`.
    ///
    /// # Errors
    ///
    /// As for [`init`](Self::init).
    pub async fn free(&self, ctx: SessionHandle) -> Result<(), FeatureError> {
        self.request(FREE, ctx).await
    }

    async fn request(&self, command: CommandId, ctx: SessionHandle) -> Result<(), FeatureError> {
        let payload = EntropyRequest {
            ctx: ctx.as_u32(),
            subcmd: u32::from(command.sub),
        }
        .to_payload()?;
        let response = self.client.call(command, ctx, &payload).await?;
        let result = EntropyResult::from_payload(&response)?;
        if result.ret_code != 0 {
            debug!(%command, %ctx, ret_code = result.ret_code, "entropy request refused");
            return Err(CallError::Remote(result.ret_code).into());
        }
        Ok(())
    }
}
