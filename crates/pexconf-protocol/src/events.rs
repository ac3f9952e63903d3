//! Typed conference and registration events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Wire names of the events this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    SplashScreen,
    ConferenceUpdate,
    LiveCaptions,
    MessageReceived,
    NewOffer,
    UpdateSdp,
    NewCandidate,
    PresentationStart,
    PresentationStop,
    ParticipantSyncBegin,
    ParticipantSyncEnd,
    ParticipantCreate,
    ParticipantUpdate,
    ParticipantDelete,
    PeerDisconnected,
    Refer,
    CallDisconnected,
    ClientDisconnected,
    Incoming,
    IncomingCancelled,
}

impl EventName {
    /// Looks up a wire name. Unknown names return `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        let name = match name {
            "splash_screen" => Self::SplashScreen,
            "conference_update" => Self::ConferenceUpdate,
            "live_captions" => Self::LiveCaptions,
            "message_received" => Self::MessageReceived,
            "new_offer" => Self::NewOffer,
            "update_sdp" => Self::UpdateSdp,
            "new_candidate" => Self::NewCandidate,
            "presentation_start" => Self::PresentationStart,
            "presentation_stop" => Self::PresentationStop,
            "participant_sync_begin" => Self::ParticipantSyncBegin,
            "participant_sync_end" => Self::ParticipantSyncEnd,
            "participant_create" => Self::ParticipantCreate,
            "participant_update" => Self::ParticipantUpdate,
            "participant_delete" => Self::ParticipantDelete,
            "peer_disconnect" => Self::PeerDisconnected,
            "refer" => Self::Refer,
            "call_disconnected" => Self::CallDisconnected,
            "disconnect" => Self::ClientDisconnected,
            "incoming" => Self::Incoming,
            "incoming_cancelled" => Self::IncomingCancelled,
            _ => return None,
        };
        Some(name)
    }

    /// The wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SplashScreen => "splash_screen",
            Self::ConferenceUpdate => "conference_update",
            Self::LiveCaptions => "live_captions",
            Self::MessageReceived => "message_received",
            Self::NewOffer => "new_offer",
            Self::UpdateSdp => "update_sdp",
            Self::NewCandidate => "new_candidate",
            Self::PresentationStart => "presentation_start",
            Self::PresentationStop => "presentation_stop",
            Self::ParticipantSyncBegin => "participant_sync_begin",
            Self::ParticipantSyncEnd => "participant_sync_end",
            Self::ParticipantCreate => "participant_create",
            Self::ParticipantUpdate => "participant_update",
            Self::ParticipantDelete => "participant_delete",
            Self::PeerDisconnected => "peer_disconnect",
            Self::Refer => "refer",
            Self::CallDisconnected => "call_disconnected",
            Self::ClientDisconnected => "disconnect",
            Self::Incoming => "incoming",
            Self::IncomingCancelled => "incoming_cancelled",
        }
    }
}

/// A decoded event from the conference or registration event stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DomainEvent {
    SplashScreen(Option<SplashScreen>),
    ConferenceUpdate(ConferenceStatus),
    LiveCaptions(LiveCaptions),
    MessageReceived(ChatMessage),
    NewOffer(SdpMessage),
    UpdateSdp(SdpMessage),
    NewCandidate(IceCandidate),
    PresentationStart(PresentationStart),
    PresentationStop,
    ParticipantSyncBegin,
    ParticipantSyncEnd,
    ParticipantCreate(Participant),
    ParticipantUpdate(Participant),
    ParticipantDelete(ParticipantDelete),
    PeerDisconnected,
    Refer(Refer),
    CallDisconnected(CallDisconnected),
    ClientDisconnected(ClientDisconnected),
    Incoming(IncomingCall),
    IncomingCancelled(IncomingCancelled),
}

impl DomainEvent {
    /// The wire name this event was decoded from.
    pub fn name(&self) -> EventName {
        match self {
            Self::SplashScreen(_) => EventName::SplashScreen,
            Self::ConferenceUpdate(_) => EventName::ConferenceUpdate,
            Self::LiveCaptions(_) => EventName::LiveCaptions,
            Self::MessageReceived(_) => EventName::MessageReceived,
            Self::NewOffer(_) => EventName::NewOffer,
            Self::UpdateSdp(_) => EventName::UpdateSdp,
            Self::NewCandidate(_) => EventName::NewCandidate,
            Self::PresentationStart(_) => EventName::PresentationStart,
            Self::PresentationStop => EventName::PresentationStop,
            Self::ParticipantSyncBegin => EventName::ParticipantSyncBegin,
            Self::ParticipantSyncEnd => EventName::ParticipantSyncEnd,
            Self::ParticipantCreate(_) => EventName::ParticipantCreate,
            Self::ParticipantUpdate(_) => EventName::ParticipantUpdate,
            Self::ParticipantDelete(_) => EventName::ParticipantDelete,
            Self::PeerDisconnected => EventName::PeerDisconnected,
            Self::Refer(_) => EventName::Refer,
            Self::CallDisconnected(_) => EventName::CallDisconnected,
            Self::ClientDisconnected(_) => EventName::ClientDisconnected,
            Self::Incoming(_) => EventName::Incoming,
            Self::IncomingCancelled(_) => EventName::IncomingCancelled,
        }
    }
}

/// Conference-wide state carried by `conference_update`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConferenceStatus {
    pub started: bool,
    pub locked: bool,
    pub all_muted: bool,
    pub guests_muted: bool,
    pub presentation_allowed: bool,
    pub direct_media: bool,
    pub live_captions_available: bool,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "origin")]
    pub sender_name: String,
    #[serde(rename = "uuid")]
    pub sender_id: String,
    #[serde(rename = "type", default = "default_message_type")]
    pub kind: String,
    pub payload: String,
    /// Local time the message was sent or received.
    #[serde(skip_deserializing, default = "Utc::now")]
    pub date: DateTime<Utc>,
}

impl ChatMessage {
    /// A plain-text message stamped with the current time.
    pub fn text(
        sender_name: impl Into<String>,
        sender_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            sender_name: sender_name.into(),
            sender_id: sender_id.into(),
            kind: default_message_type(),
            payload: payload.into(),
            date: Utc::now(),
        }
    }
}

fn default_message_type() -> String {
    "text/plain".to_string()
}

/// A live captions fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveCaptions {
    pub data: String,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_time: Option<f64>,
}

/// Splash screen to show instead of the conference video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplashScreen {
    #[serde(rename = "screen_key")]
    pub key: String,
}

/// SDP pushed by the node (`new_offer`, `update_sdp`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpMessage {
    pub sdp: String,
}

/// A remote ICE candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub mid: Option<String>,
}

/// Somebody started presenting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationStart {
    #[serde(default)]
    pub presenter_name: String,
    #[serde(default)]
    pub presenter_uri: String,
}

/// A participant left the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantDelete {
    #[serde(rename = "uuid")]
    pub id: String,
}

/// The node asks the client to move to another conference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refer {
    pub conference_alias: String,
    pub token: String,
}

/// The media call was disconnected; the session may continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDisconnected {
    pub call_uuid: String,
    #[serde(default)]
    pub reason: String,
}

/// The node disconnected this participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDisconnected {
    #[serde(default)]
    pub reason: String,
}

/// An incoming call for a registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingCall {
    pub conference_alias: String,
    pub remote_display_name: String,
    pub token: String,
}

/// An incoming call was withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingCancelled {
    pub token: String,
}

/// Participant role in the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Guest,
    Chair,
}

/// What a participant is connected to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantServiceType {
    Connecting,
    WaitingRoom,
    Ivr,
    #[default]
    Conference,
    Lecture,
    Gateway,
    TestCall,
}

/// Direction of a participant's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallDirection {
    #[serde(rename = "in")]
    Inbound,
    #[serde(rename = "out")]
    Outbound,
}

/// A roster entry from `participant_create` / `participant_update`.
///
/// The node encodes most flags as `"YES"`/`"NO"` strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "uuid")]
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub local_alias: String,
    #[serde(default)]
    pub overlay_text: String,
    pub role: ParticipantRole,
    #[serde(default)]
    pub service_type: ParticipantServiceType,
    #[serde(default)]
    pub buzz_time: f64,
    pub call_direction: CallDirection,
    #[serde(default)]
    pub call_tag: Option<String>,
    #[serde(default, rename = "external_node_uuid")]
    pub external_node_id: Option<String>,
    #[serde(default, rename = "protocol")]
    pub call_protocol: Option<String>,
    #[serde(default, rename = "spotlight")]
    pub spotlight_time: f64,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub has_media: bool,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default)]
    pub is_streaming_conference: bool,
    #[serde(default)]
    pub is_video_muted: bool,
    #[serde(default, rename = "encryption", deserialize_with = "encryption_on")]
    pub is_connection_encrypted: bool,
    #[serde(default, rename = "rx_presentation_policy", deserialize_with = "policy_allow")]
    pub can_receive_presentation: bool,
    #[serde(default, rename = "disconnect_supported", deserialize_with = "yes_no")]
    pub is_disconnect_supported: bool,
    #[serde(default, rename = "fecc_supported", deserialize_with = "yes_no")]
    pub is_fecc_supported: bool,
    #[serde(default, deserialize_with = "yes_no")]
    pub is_audio_only_call: bool,
    #[serde(default, rename = "is_muted", deserialize_with = "yes_no")]
    pub is_audio_muted: bool,
    #[serde(default, deserialize_with = "yes_no")]
    pub is_presenting: bool,
    #[serde(default, deserialize_with = "yes_no")]
    pub is_video_call: bool,
    #[serde(default, rename = "mute_supported", deserialize_with = "yes_no")]
    pub is_mute_supported: bool,
    #[serde(default, rename = "transfer_supported", deserialize_with = "yes_no")]
    pub is_transfer_supported: bool,
}

fn yes_no<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match String::deserialize(deserializer)?.as_str() {
        "YES" => Ok(true),
        "NO" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected YES or NO, got {other:?}"
        ))),
    }
}

fn encryption_on<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match String::deserialize(deserializer)?.as_str() {
        "On" => Ok(true),
        "Off" | "Unknown" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "unknown encryption state {other:?}"
        ))),
    }
}

fn policy_allow<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match String::deserialize(deserializer)?.as_str() {
        "ALLOW" => Ok(true),
        "DENY" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "unknown presentation policy {other:?}"
        ))),
    }
}
