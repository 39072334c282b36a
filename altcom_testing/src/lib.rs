//! Utilities for exercising an [`AltcomClient`](altcom::AltcomClient)
//! against a scripted modem during tests.
//!
//! [`MockModem`] plays the modem side of a `tokio::io::duplex` pipe: it
//! decodes the command frames the client writes and answers with response
//! or event frames built by the real codec.
//!
//! ```rust
//! use altcom::{SessionHandle, feature::entropy};
//! use altcom_testing::pair;
//!
//! # #[tokio::main]
//! # async fn main() -> std::io::Result<()> {
//! let (client, mut modem) = pair();
//! let caller = tokio::spawn({
//!     let client = client.clone();
//!     async move { client.call(entropy::INIT, SessionHandle::new(7), &[]).await }
//! });
//! let command = modem.next_command().await?;
//! modem.respond(&command, 0, &[]).await?;
//! assert!(caller.await.expect("caller task").is_ok());
//! # Ok(())
//! # }
//! ```

pub mod logging;
pub mod macros;
pub mod metrics;
pub mod modem;

pub use logging::{LoggerHandle, logger};
pub use metrics::{counter_value, debugging_recorder_setup};
pub use modem::{MockModem, pair, pair_with, pair_with_capacity};
