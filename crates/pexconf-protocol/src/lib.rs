//! Wire types for the conference client API.
//!
//! Every HTTP response from a conferencing node is wrapped in an
//! [`Envelope`]:
//!
//! ```json
//! {"status": "success", "result": ...}
//! ```
//!
//! Conference events arrive on a `text/event-stream` response and are framed
//! by [`EventStreamParser`] into [`StreamEvent`]s, which [`EventParser`]
//! decodes into typed [`DomainEvent`]s.
//!
//! # Example
//!
//! ```rust
//! use pexconf_protocol::{DomainEvent, EventParser, EventStreamParser};
//!
//! let mut framing = EventStreamParser::new();
//! let records = framing
//!     .push(b"event: presentation_stop\ndata: null\n\n")
//!     .unwrap();
//! let event = EventParser::new().parse(&records[0]);
//! assert_eq!(event, Some(DomainEvent::PresentationStop));
//! ```

mod envelope;
mod error;
mod events;
mod framing;
mod parser;
mod token;

pub use envelope::{AspectRatioFields, DtmfFields, Envelope, MessageFields};
pub use error::{ProtocolError, ProtocolResult};
pub use events::{
    CallDirection, CallDisconnected, ChatMessage, ClientDisconnected, ConferenceStatus,
    DomainEvent, EventName, IceCandidate, IncomingCall, IncomingCancelled, LiveCaptions,
    Participant, ParticipantDelete, ParticipantRole, ParticipantServiceType, PresentationStart,
    Refer, SdpMessage, SplashScreen,
};
pub use framing::{EventStreamParser, StreamEvent};
pub use parser::EventParser;
pub use token::{
    IdentityProvider, RefreshPayload, RegistrationTokenPayload, Role, ServiceType, StunServer,
    TokenChallenge,
    TokenErrorBody, TokenPayload, TokenRequestFields, TurnServer, VersionInfo,
};

/// Path prefix of the client API on a node.
pub const API_PATH: &str = "api/client/v2";

/// Maximum length of a single event-stream line (1 MB).
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;
