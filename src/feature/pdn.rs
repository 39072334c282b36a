//! Packet data network activation.

use std::{fmt, net::Ipv4Addr, ops::BitOr};

use bincode::{Decode, Encode};
use tracing::info;

use super::{FeatureError, Payload, fixed_str, read_fixed_str};
use crate::{
    catalog::FeatureFamily,
    client::AltcomClient,
    correlation::{CommandId, SessionHandle},
};

/// Main command identifier of the PDN family.
pub const MAIN_ID: u16 = 0x0110;
/// Activate a PDN with an APN setting.
pub const ACTIVATE: CommandId = CommandId::new(MAIN_ID, 0x01);
/// Deactivate a PDN session.
pub const DEACTIVATE: CommandId = CommandId::new(MAIN_ID, 0x02);

/// Size of the APN name field, terminator included.
pub const APN_NAME_LEN: usize = 101;
/// Size of the user name field, terminator included.
pub const APN_USER_NAME_LEN: usize = 64;
/// Size of the password field, terminator included.
pub const APN_PASSWORD_LEN: usize = 32;

/// IP family requested for the PDN.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IpType {
    /// IPv4 only.
    #[default]
    V4,
    /// IPv6 only.
    V6,
    /// Dual stack.
    V4V6,
}

impl IpType {
    const fn as_u8(self) -> u8 {
        match self {
            Self::V4 => 0,
            Self::V6 => 1,
            Self::V4V6 => 2,
        }
    }
}

/// Authentication used towards the APN.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthType {
    /// No authentication.
    #[default]
    None,
    /// PAP.
    Pap,
    /// CHAP.
    Chap,
}

impl AuthType {
    const fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Pap => 1,
            Self::Chap => 2,
        }
    }
}

/// Bit set of APN roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ApnType(u32);

impl ApnType {
    /// Role not known.
    pub const UNKNOWN: Self = Self(0x0001);
    /// Default data traffic.
    pub const DEFAULT: Self = Self(0x0002);
    /// Multimedia messaging.
    pub const MMS: Self = Self(0x0004);
    /// Assisted location.
    pub const SUPL: Self = Self(0x0008);
    /// Dial-up networking.
    pub const DUN: Self = Self(0x0010);
    /// High priority traffic.
    pub const HIPRI: Self = Self(0x0020);
    /// Firmware over the air.
    pub const FOTA: Self = Self(0x0040);
    /// IP multimedia subsystem.
    pub const IMS: Self = Self(0x0080);
    /// Cell broadcast.
    pub const CBS: Self = Self(0x0100);
    /// Initial attach.
    pub const IA: Self = Self(0x0200);
    /// Emergency calls.
    pub const EMERGENCY: Self = Self(0x0400);

    /// Raw bit pattern.
    #[must_use]
    pub const fn bits(self) -> u32 { self.0 }

    /// Whether every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool { self.0 & other.0 == other.0 }
}

impl Default for ApnType {
    fn default() -> Self { Self::DEFAULT }
}

impl BitOr for ApnType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self { Self(self.0 | rhs.0) }
}

/// Access point to activate.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApnSetting {
    /// Access point name.
    pub apn: String,
    /// Requested IP family.
    pub ip_type: IpType,
    /// Authentication scheme.
    pub auth_type: AuthType,
    /// APN roles.
    pub apn_type: ApnType,
    /// User name, if the scheme needs one.
    pub user_name: Option<String>,
    /// Password, if the scheme needs one.
    pub password: Option<String>,
}

impl fmt::Debug for ApnSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApnSetting")
            .field("apn", &self.apn)
            .field("ip_type", &self.ip_type)
            .field("auth_type", &self.auth_type)
            .field("apn_type", &self.apn_type)
            .field("user_name", &self.user_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ApnSetting {
    /// Setting for `apn` with no authentication.
    #[must_use]
    pub fn new(apn: impl Into<String>) -> Self {
        Self {
            apn: apn.into(),
            ..Self::default()
        }
    }

    /// Authenticate with `scheme` using the given credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        scheme: AuthType,
        user_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth_type = scheme;
        self.user_name = Some(user_name.into());
        self.password = Some(password.into());
        self
    }

    fn to_request(&self) -> Result<ActivateRequest, FeatureError> {
        Ok(ActivateRequest {
            apn: fixed_str("apn", &self.apn)?,
            ip_type: self.ip_type.as_u8(),
            auth_type: self.auth_type.as_u8(),
            apn_type: self.apn_type.bits(),
            user_name: fixed_str("user_name", self.user_name.as_deref().unwrap_or_default())?,
            password: fixed_str("password", self.password.as_deref().unwrap_or_default())?,
        })
    }
}

#[derive(Debug, Encode, Decode)]
struct ActivateRequest {
    apn: [u8; APN_NAME_LEN],
    ip_type: u8,
    auth_type: u8,
    apn_type: u32,
    user_name: [u8; APN_USER_NAME_LEN],
    password: [u8; APN_PASSWORD_LEN],
}

#[derive(Debug, Encode, Decode)]
struct ActivateResponse {
    session_id: u32,
    active: u8,
    has_ipv4: u8,
    ipv4: [u8; 4],
    apn: [u8; APN_NAME_LEN],
}

/// State of an activated PDN.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PdnInfo {
    /// Session handle used for later calls on this PDN.
    pub session: SessionHandle,
    /// Whether the PDN is up.
    pub active: bool,
    /// Assigned IPv4 address, if any.
    pub ipv4: Option<Ipv4Addr>,
    /// APN name the modem reports.
    pub apn: String,
}

impl TryFrom<ActivateResponse> for PdnInfo {
    type Error = FeatureError;

    fn try_from(response: ActivateResponse) -> Result<Self, Self::Error> {
        let flag = |field, value: u8| match value {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(FeatureError::InvalidField {
                field,
                value: u32::from(other),
            }),
        };
        let active = flag("active", response.active)?;
        let ipv4 = flag("has_ipv4", response.has_ipv4)?.then(|| Ipv4Addr::from(response.ipv4));
        Ok(Self {
            session: SessionHandle::new(response.session_id),
            active,
            ipv4,
            apn: read_fixed_str(&response.apn),
        })
    }
}

/// PDN feature bound to a client.
#[derive(Clone, Debug)]
pub struct Pdn {
    client: AltcomClient,
}

impl FeatureFamily for Pdn {
    const MAIN_ID: u16 = MAIN_ID;
    const CALLS: &'static [u16] = &[ACTIVATE.sub, DEACTIVATE.sub];
}

impl Pdn {
    /// Bind the feature to `client`.
    #[must_use]
    pub fn new(client: AltcomClient) -> Self { Self { client } }

    /// Activate the PDN described by `setting`.
    ///
    /// Activation is not scoped to a session; only one may be in flight.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::FieldTooLong`] when a string does not fit its
    /// field, or any call or decode failure.
    pub async fn activate(&self, setting: &ApnSetting) -> Result<PdnInfo, FeatureError> {
        let payload = setting.to_request()?.to_payload()?;
        let response = self
            .client
            .call(ACTIVATE, SessionHandle::GLOBAL, &payload)
            .await?;
        let info = PdnInfo::try_from(ActivateResponse::from_payload(&response)?)?;
        info!(apn = %info.apn, session = %info.session, ipv4 = ?info.ipv4, "PDN activated");
        Ok(info)
    }

    /// Deactivate the PDN bound to `session`.
    ///
    /// # Errors
    ///
    /// Returns any call failure.
    pub async fn deactivate(&self, session: SessionHandle) -> Result<(), FeatureError> {
        self.client.call(DEACTIVATE, session, &[]).await?;
        info!(%session, "PDN deactivated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activate_request_has_fixed_size() {
        let setting = ApnSetting::new("soracom.io").with_credentials(AuthType::Chap, "sora", "sora");
        let bytes = setting
            .to_request()
            .expect("setting fits")
            .to_payload()
            .expect("encode should succeed");
        assert_eq!(bytes.len(), APN_NAME_LEN + 1 + 1 + 4 + APN_USER_NAME_LEN + APN_PASSWORD_LEN);
        assert_eq!(&bytes[..10], b"soracom.io");
        assert_eq!(bytes[APN_NAME_LEN + 1], 2);
    }

    #[test]
    fn oversized_apn_is_rejected() {
        let setting = ApnSetting::new("a".repeat(APN_NAME_LEN));
        let err = setting.to_request().expect_err("name too long");
        assert!(matches!(err, FeatureError::FieldTooLong { field: "apn", .. }));
    }

    #[test]
    fn apn_types_combine() {
        let roles = ApnType::DEFAULT | ApnType::IA;
        assert_eq!(roles.bits(), 0x0202);
        assert!(roles.contains(ApnType::IA));
        assert!(!roles.contains(ApnType::MMS));
    }

    #[test]
    fn debug_output_hides_password() {
        let setting = ApnSetting::new("internet").with_credentials(AuthType::Pap, "user", "secret");
        assert!(!format!("{setting:?}").contains("secret"));
    }

    #[test]
    fn response_flags_outside_zero_or_one_are_rejected() {
        let response = ActivateResponse {
            session_id: 1,
            active: 2,
            has_ipv4: 0,
            ipv4: [0; 4],
            apn: [0; APN_NAME_LEN],
        };
        let err = PdnInfo::try_from(response).expect_err("invalid flag");
        assert!(matches!(err, FeatureError::InvalidField { field: "active", value: 2 }));
    }
}
