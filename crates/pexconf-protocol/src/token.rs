//! Token request, refresh and challenge payloads.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Body of a `request_token` call.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequestFields {
    /// Name shown to other participants.
    pub display_name: String,
    /// Extension used by virtual reception style conferences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_extension: Option<String>,
    /// UUID of the identity provider picked by the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_idp: Option<String>,
    /// Token returned by the identity provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sso_token: Option<String>,
    /// Whether the client supports direct media.
    #[serde(default)]
    pub direct_media: bool,
}

impl fmt::Debug for TokenRequestFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequestFields")
            .field("display_name", &self.display_name)
            .field("conference_extension", &self.conference_extension)
            .field("chosen_idp", &self.chosen_idp)
            .field("sso_token", &self.sso_token.as_ref().map(|_| "[REDACTED]"))
            .field("direct_media", &self.direct_media)
            .finish()
    }
}

/// Role granted by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Conference host (chair).
    Host,
    /// Guest participant.
    Guest,
}

/// The kind of service a token gives access to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// A regular conference.
    #[default]
    Conference,
    /// A gateway call.
    Gateway,
    /// The test call service.
    TestCall,
}

/// A STUN server advertised by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StunServer {
    pub url: String,
}

/// A TURN server advertised by the node.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnServer {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

impl fmt::Debug for TurnServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnServer")
            .field("urls", &self.urls)
            .field("username", &self.username)
            .field("credential", &"[REDACTED]")
            .finish()
    }
}

/// Node software version attached to a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub version_id: String,
    #[serde(default)]
    pub pseudo_version: String,
}

/// The `result` of a successful `request_token` call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub token: String,
    /// Lifetime in seconds. Sent by the node as a string.
    #[serde(deserialize_with = "seconds")]
    pub expires: u64,
    pub participant_uuid: String,
    pub role: Role,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub service_type: ServiceType,
    #[serde(default)]
    pub conference_name: String,
    #[serde(default)]
    pub stun: Vec<StunServer>,
    #[serde(default)]
    pub turn: Vec<TurnServer>,
    #[serde(default)]
    pub chat_enabled: bool,
    #[serde(default)]
    pub analytics_enabled: bool,
    #[serde(default)]
    pub direct_media: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pex_datachannel_id: Option<u32>,
    #[serde(default)]
    pub version: VersionInfo,
}

impl fmt::Debug for TokenPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPayload")
            .field("token", &"[REDACTED]")
            .field("expires", &self.expires)
            .field("participant_uuid", &self.participant_uuid)
            .field("role", &self.role)
            .field("service_type", &self.service_type)
            .field("conference_name", &self.conference_name)
            .finish_non_exhaustive()
    }
}

/// The `result` of a `refresh_token` call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub token: String,
    #[serde(deserialize_with = "seconds")]
    pub expires: u64,
}

impl fmt::Debug for RefreshPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshPayload")
            .field("token", &"[REDACTED]")
            .field("expires", &self.expires)
            .finish()
    }
}

/// The `result` of a registration `request_token` call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationTokenPayload {
    pub token: String,
    #[serde(deserialize_with = "seconds")]
    pub expires: u64,
    pub registration_uuid: String,
    #[serde(default)]
    pub directory_enabled: bool,
    #[serde(default)]
    pub route_via_registrar: bool,
    #[serde(default)]
    pub version: VersionInfo,
}

impl fmt::Debug for RegistrationTokenPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationTokenPayload")
            .field("token", &"[REDACTED]")
            .field("expires", &self.expires)
            .field("registration_uuid", &self.registration_uuid)
            .field("directory_enabled", &self.directory_enabled)
            .field("route_via_registrar", &self.route_via_registrar)
            .finish_non_exhaustive()
    }
}

/// An identity provider offered for single sign-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProvider {
    pub name: String,
    pub uuid: String,
}

/// The `result` of a 403 `request_token` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenErrorBody {
    /// `"required"` or `"none"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_pin: Option<String>,
    /// Extension type the conference expects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idp: Option<Vec<IdentityProvider>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_idp: Option<IdentityProvider>,
}

/// What the node asks for before it grants a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenChallenge {
    /// A PIN is required. `guest_pin` is true when guests need a PIN too.
    Pin { guest_pin: bool },
    /// A conference extension is required.
    ConferenceExtension(String),
    /// The user must pick one of these identity providers.
    IdentityProviders(Vec<IdentityProvider>),
    /// The user must complete sign-on at `url`.
    Redirect { idp: IdentityProvider, url: String },
}

impl TokenErrorBody {
    /// Interprets the body, or `None` if it carries no known challenge.
    pub fn challenge(&self) -> Option<TokenChallenge> {
        if let Some(ref guest_pin) = self.guest_pin {
            return Some(TokenChallenge::Pin {
                guest_pin: guest_pin == "required",
            });
        }
        if let Some(ref extension) = self.conference_extension {
            return Some(TokenChallenge::ConferenceExtension(extension.clone()));
        }
        if let Some(ref idps) = self.idp {
            return Some(TokenChallenge::IdentityProviders(idps.clone()));
        }
        match (&self.redirect_url, &self.redirect_idp) {
            (Some(url), Some(idp)) => Some(TokenChallenge::Redirect {
                idp: idp.clone(),
                url: url.clone(),
            }),
            _ => None,
        }
    }
}

/// Deserializes a lifetime given either as a string or as a number of seconds.
fn seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    struct Seconds;

    impl de::Visitor<'_> for Seconds {
        type Value = u64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a non-negative number of seconds")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u64, E> {
            u64::try_from(value).map_err(|_| E::custom("negative lifetime"))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u64, E> {
            value
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid lifetime {value:?}")))
        }
    }

    deserializer.deserialize_any(Seconds)
}
