//! Radio signal quality queries and periodic reports.
//!
//! [`QualityMonitor`] subscribes to the modem's report event and keeps the
//! latest record in a `watch` channel, so any number of tasks can read or
//! await it.

use bincode::{Decode, Encode};
use tokio::{sync::watch, time::Duration};
use tracing::{debug, warn};

use super::{FeatureError, Payload};
use crate::{
    catalog::FeatureFamily,
    client::AltcomClient,
    correlation::{CommandId, SessionHandle},
    error::SubscribeError,
    events::Event,
};

/// Main command identifier of the quality family.
pub const MAIN_ID: u16 = 0x0120;
/// Read the current signal quality.
pub const GET: CommandId = CommandId::new(MAIN_ID, 0x01);
/// Enable or disable periodic reports.
pub const SET_REPORT: CommandId = CommandId::new(MAIN_ID, 0x02);
/// Periodic quality report raised by the modem.
pub const REPORT: CommandId = CommandId::new(MAIN_ID, 0x80);

/// Signal quality as measured by the modem.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct Quality {
    /// Whether the measurements below are meaningful.
    pub valid: bool,
    /// Reference signal received power, dBm.
    pub rsrp: i16,
    /// Reference signal received quality, dB.
    pub rsrq: i16,
    /// Signal to interference plus noise ratio, dB.
    pub sinr: i16,
    /// Received signal strength indicator, dBm.
    pub rssi: i16,
}

#[derive(Debug, Encode, Decode)]
struct SetReportRequest {
    enable: u8,
    period_secs: u32,
}

/// Signal quality feature bound to a client.
#[derive(Clone, Debug)]
pub struct SignalQuality {
    client: AltcomClient,
}

impl FeatureFamily for SignalQuality {
    const MAIN_ID: u16 = MAIN_ID;
    const CALLS: &'static [u16] = &[GET.sub, SET_REPORT.sub];
    const EVENTS: &'static [u16] = &[REPORT.sub];
}

impl SignalQuality {
    /// Bind the feature to `client`.
    #[must_use]
    pub fn new(client: AltcomClient) -> Self { Self { client } }

    /// Read the current signal quality.
    ///
    /// # Errors
    ///
    /// Returns any call or decode failure.
    pub async fn get(&self) -> Result<Quality, FeatureError> {
        let response = self.client.call(GET, SessionHandle::GLOBAL, &[]).await?;
        Quality::from_payload(&response)
    }

    /// Ask the modem to report quality every `period`.
    ///
    /// The period is rounded down to whole seconds, with a floor of one.
    ///
    /// # Errors
    ///
    /// Returns any call failure.
    pub async fn enable_reports(&self, period: Duration) -> Result<(), FeatureError> {
        let period_secs = u32::try_from(period.as_secs()).unwrap_or(u32::MAX).max(1);
        self.set_report(SetReportRequest {
            enable: 1,
            period_secs,
        })
        .await
    }

    /// Stop periodic reports.
    ///
    /// # Errors
    ///
    /// Returns any call failure.
    pub async fn disable_reports(&self) -> Result<(), FeatureError> {
        self.set_report(SetReportRequest {
            enable: 0,
            period_secs: 0,
        })
        .await
    }

    async fn set_report(&self, request: SetReportRequest) -> Result<(), FeatureError> {
        let payload = request.to_payload()?;
        self.client
            .call(SET_REPORT, SessionHandle::GLOBAL, &payload)
            .await?;
        debug!(
            enable = request.enable,
            period_secs = request.period_secs,
            "quality reporting updated"
        );
        Ok(())
    }
}

/// Latest quality report, shared through a `watch` channel.
#[derive(Debug)]
pub struct QualityMonitor {
    client: AltcomClient,
    rx: watch::Receiver<Option<Quality>>,
}

impl QualityMonitor {
    /// Subscribe to quality reports on `client`.
    ///
    /// Replaces any handler already registered for [`REPORT`].
    ///
    /// # Errors
    ///
    /// Returns [`SubscribeError::NotAnEvent`] when the client's catalogue
    /// does not list the report event.
    pub fn attach(client: &AltcomClient) -> Result<Self, SubscribeError> {
        let (tx, rx) = watch::channel(None);
        client.subscribe_fn(REPORT, move |event: Event| {
            match Quality::from_payload(&event.payload) {
                Ok(quality) => {
                    tx.send_replace(Some(quality));
                }
                Err(e) => warn!(error = %e, "malformed quality report dropped"),
            }
        })?;
        Ok(Self {
            client: client.clone(),
            rx,
        })
    }

    /// Most recent report, if any has arrived.
    #[must_use]
    pub fn latest(&self) -> Option<Quality> { *self.rx.borrow() }

    /// Receiver that observes every new report.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<Quality>> { self.rx.clone() }

    /// Wait for the next report.
    ///
    /// Returns `None` once the subscription has been removed.
    pub async fn changed(&mut self) -> Option<Quality> {
        self.rx.changed().await.ok()?;
        *self.rx.borrow_and_update()
    }

    /// Remove the report subscription.
    pub fn detach(self) { self.client.unsubscribe(REPORT); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_record_is_nine_bytes() {
        let bytes = Quality {
            valid: true,
            rsrp: -95,
            rsrq: -10,
            sinr: 12,
            rssi: -65,
        }
        .to_payload()
        .expect("encode should succeed");
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..3], &(-95_i16).to_be_bytes());
    }

    #[test]
    fn invalid_flag_fails_to_decode() {
        let err = Quality::from_payload(&[2, 0, 0, 0, 0, 0, 0, 0, 0]).expect_err("flag out of range");
        assert!(matches!(err, FeatureError::Decode(_)));
    }
}
