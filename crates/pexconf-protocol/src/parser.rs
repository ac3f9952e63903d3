//! Decoding of raw stream records into [`DomainEvent`]s.
//!
//! Parsing never fails the stream: unknown names and undecodable payloads
//! are logged and dropped.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ProtocolError, ProtocolResult};
use crate::events::{DomainEvent, EventName, SplashScreen};
use crate::framing::StreamEvent;

/// Turns [`StreamEvent`]s into [`DomainEvent`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventParser;

impl EventParser {
    /// Creates a parser.
    pub fn new() -> Self {
        Self
    }

    /// Decodes a record, returning `None` for unknown or malformed events.
    pub fn parse(&self, event: &StreamEvent) -> Option<DomainEvent> {
        let Some(ref raw_name) = event.name else {
            debug!(id = ?event.id, "ignoring stream event without a name");
            return None;
        };

        let Some(name) = EventName::from_wire(raw_name) else {
            debug!(name = %raw_name, "ignoring unhandled stream event");
            return None;
        };

        match self.decode(name, event.data.as_deref()) {
            Ok(domain_event) => {
                debug!(id = ?event.id, name = name.as_str(), "decoded stream event");
                Some(domain_event)
            }
            Err(error) => {
                warn!(name = name.as_str(), %error, "failed to decode stream event");
                None
            }
        }
    }

    /// Decodes the payload of a known event.
    pub fn decode(&self, name: EventName, data: Option<&str>) -> ProtocolResult<DomainEvent> {
        let event = match name {
            EventName::SplashScreen => match data.map(str::trim) {
                None | Some("") | Some("null") => DomainEvent::SplashScreen(None),
                Some(json) => {
                    DomainEvent::SplashScreen(Some(serde_json::from_str::<SplashScreen>(json)?))
                }
            },
            EventName::ConferenceUpdate => DomainEvent::ConferenceUpdate(payload(name, data)?),
            EventName::LiveCaptions => DomainEvent::LiveCaptions(payload(name, data)?),
            EventName::MessageReceived => DomainEvent::MessageReceived(payload(name, data)?),
            EventName::NewOffer => DomainEvent::NewOffer(payload(name, data)?),
            EventName::UpdateSdp => DomainEvent::UpdateSdp(payload(name, data)?),
            EventName::NewCandidate => DomainEvent::NewCandidate(payload(name, data)?),
            EventName::PresentationStart => DomainEvent::PresentationStart(payload(name, data)?),
            EventName::PresentationStop => DomainEvent::PresentationStop,
            EventName::ParticipantSyncBegin => DomainEvent::ParticipantSyncBegin,
            EventName::ParticipantSyncEnd => DomainEvent::ParticipantSyncEnd,
            EventName::ParticipantCreate => DomainEvent::ParticipantCreate(payload(name, data)?),
            EventName::ParticipantUpdate => DomainEvent::ParticipantUpdate(payload(name, data)?),
            EventName::ParticipantDelete => DomainEvent::ParticipantDelete(payload(name, data)?),
            EventName::PeerDisconnected => DomainEvent::PeerDisconnected,
            EventName::Refer => DomainEvent::Refer(payload(name, data)?),
            EventName::CallDisconnected => DomainEvent::CallDisconnected(payload(name, data)?),
            EventName::ClientDisconnected => {
                DomainEvent::ClientDisconnected(payload(name, data)?)
            }
            EventName::Incoming => DomainEvent::Incoming(payload(name, data)?),
            EventName::IncomingCancelled => DomainEvent::IncomingCancelled(payload(name, data)?),
        };
        Ok(event)
    }
}

fn payload<T: DeserializeOwned>(name: EventName, data: Option<&str>) -> ProtocolResult<T> {
    let data = data.ok_or_else(|| ProtocolError::missing_data(name.as_str()))?;
    Ok(serde_json::from_str(data)?)
}
