//! Conference tokens and the service that issues them.

mod error;
mod service;

use std::fmt;
use std::time::Duration;

use pexconf_protocol::{
    RegistrationTokenPayload, Role, ServiceType, StunServer, TokenPayload, TurnServer,
    VersionInfo,
};
use tokio::time::Instant;

pub use error::{TokenError, TokenResult};
pub use service::{TokenRequest, TokenService};

/// Session credential granted by a node.
///
/// The lifetime is tracked against the local monotonic clock from the moment
/// the token was received. Registration tokens carry [`RegistrationDetails`]
/// and use the registration uuid as `participant_uuid`.
#[derive(Clone)]
pub struct Token {
    value: String,
    expires: Duration,
    issued_at: Instant,
    pub participant_uuid: String,
    pub display_name: String,
    pub role: Role,
    pub service_type: ServiceType,
    pub conference_name: String,
    pub stun: Vec<StunServer>,
    pub turn: Vec<TurnServer>,
    pub chat_enabled: bool,
    pub analytics_enabled: bool,
    pub direct_media: bool,
    pub data_channel_id: Option<u32>,
    pub version: VersionInfo,
    pub registration: Option<RegistrationDetails>,
}

/// What a registration token adds to a [`Token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationDetails {
    pub registration_uuid: String,
    pub directory_enabled: bool,
    pub route_via_registrar: bool,
}

impl Token {
    /// Builds a token from a `request_token` result received now.
    pub fn from_payload(payload: TokenPayload) -> Self {
        Self {
            value: payload.token,
            expires: Duration::from_secs(payload.expires),
            issued_at: Instant::now(),
            participant_uuid: payload.participant_uuid,
            display_name: payload.display_name,
            role: payload.role,
            service_type: payload.service_type,
            conference_name: payload.conference_name,
            stun: payload.stun,
            turn: payload.turn,
            chat_enabled: payload.chat_enabled,
            analytics_enabled: payload.analytics_enabled,
            direct_media: payload.direct_media,
            data_channel_id: payload.pex_datachannel_id,
            version: payload.version,
            registration: None,
        }
    }

    /// Builds a token from a registration `request_token` result received now.
    pub fn from_registration(payload: RegistrationTokenPayload) -> Self {
        Self {
            value: payload.token,
            expires: Duration::from_secs(payload.expires),
            issued_at: Instant::now(),
            participant_uuid: payload.registration_uuid.clone(),
            display_name: String::new(),
            role: Role::Guest,
            service_type: ServiceType::default(),
            conference_name: String::new(),
            stun: Vec::new(),
            turn: Vec::new(),
            chat_enabled: false,
            analytics_enabled: false,
            direct_media: false,
            data_channel_id: None,
            version: payload.version,
            registration: Some(RegistrationDetails {
                registration_uuid: payload.registration_uuid,
                directory_enabled: payload.directory_enabled,
                route_via_registrar: payload.route_via_registrar,
            }),
        }
    }

    /// Returns a copy carrying a refreshed value and lifetime.
    #[must_use]
    pub fn updating(&self, value: impl Into<String>, expires: Duration) -> Self {
        Self {
            value: value.into(),
            expires,
            issued_at: Instant::now(),
            ..self.clone()
        }
    }

    /// The opaque value sent in the `token` header.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Lifetime granted by the node.
    pub fn expires(&self) -> Duration {
        self.expires
    }

    /// When the token was received.
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    /// When the token stops being valid.
    pub fn expires_at(&self) -> Instant {
        self.issued_at + self.expires
    }

    /// When the token should be refreshed: halfway through its lifetime.
    pub fn refresh_at(&self) -> Instant {
        self.issued_at + self.expires / 2
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at()
    }

    /// Returns true if the token expires within `threshold`.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        Instant::now() + threshold >= self.expires_at()
    }

    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("expires", &self.expires)
            .field("participant_uuid", &self.participant_uuid)
            .field("display_name", &self.display_name)
            .field("role", &self.role)
            .field("conference_name", &self.conference_name)
            .field("registration", &self.registration)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.participant_uuid == other.participant_uuid
    }
}

impl Eq for Token {}

#[cfg(any(test, feature = "test-util"))]
impl Token {
    /// A token for tests, issued now.
    pub fn for_tests(value: impl Into<String>, expires: Duration) -> Self {
        Self {
            value: value.into(),
            expires,
            issued_at: Instant::now(),
            participant_uuid: "participant-1".to_string(),
            display_name: "Tester".to_string(),
            role: Role::Guest,
            service_type: ServiceType::Conference,
            conference_name: "Test".to_string(),
            stun: Vec::new(),
            turn: Vec::new(),
            chat_enabled: true,
            analytics_enabled: false,
            direct_media: false,
            data_channel_id: None,
            version: VersionInfo::default(),
            registration: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn lifetime_points() {
        let token = Token::for_tests("t", Duration::from_secs(120));
        assert_eq!(token.refresh_at() - token.issued_at(), Duration::from_secs(60));
        assert!(!token.is_expired());
        assert!(!token.is_stale(Duration::from_secs(30)));

        tokio::time::advance(Duration::from_secs(100)).await;
        assert!(token.is_stale(Duration::from_secs(30)));
        assert!(!token.is_expired());

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(token.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn updating_keeps_identity() {
        let token = Token::for_tests("old", Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(5)).await;
        let refreshed = token.updating("new", Duration::from_secs(120));
        assert_eq!(refreshed.value(), "new");
        assert_eq!(refreshed.participant_uuid, token.participant_uuid);
        assert!(refreshed.issued_at() > token.issued_at());
        assert_eq!(refreshed.expires(), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn registration_token_keeps_details_across_refresh() {
        let token = Token::from_registration(RegistrationTokenPayload {
            token: "reg".into(),
            expires: 300,
            registration_uuid: "r-1".into(),
            directory_enabled: true,
            route_via_registrar: false,
            version: VersionInfo::default(),
        });
        assert_eq!(token.participant_uuid, "r-1");
        assert_eq!(token.expires(), Duration::from_secs(300));

        let refreshed = token.updating("reg-2", Duration::from_secs(300));
        let details = refreshed.registration.unwrap();
        assert_eq!(details.registration_uuid, "r-1");
        assert!(details.directory_enabled);
    }

    #[test]
    fn debug_redacts_value() {
        let token = Token::for_tests("very-secret", Duration::from_secs(1));
        assert!(!format!("{token:?}").contains("very-secret"));
    }
}
