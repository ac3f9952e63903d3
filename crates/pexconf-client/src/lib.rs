//! Client for the conference API of a conferencing node.
//!
//! - [`NodeResolver`] turns a conference host into [`NodeEndpoint`]s
//! - [`HttpClient`] applies the request conventions and error classification
//! - [`TokenService`] refreshes and releases [`Token`]s
//! - [`ConferenceClient`] and [`ParticipantClient`] wrap the conference calls
//! - [`RegistrationClient`] registers a device alias for incoming calls
//! - [`EventSource`] opens the event stream of either
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   SRV / A    ┌─────────────┐
//! │ ConferenceAddress│ ───────────▶ │ NodeResolver│
//! └──────────────────┘              └──────┬──────┘
//!                                          │ NodeEndpoint
//!                                          ▼
//!                                ┌──────────────────┐
//!                                │ ConferenceClient │──▶ HttpClient
//!                                └────────┬─────────┘
//!                                         │ TokenService
//!                                         ▼
//!                                       Token
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pexconf_client::{ConferenceClient, HttpClient, HttpConfig, NodeResolver, TokenRequest};
//!
//! let nodes = NodeResolver::system().resolve("example.com").await?;
//! let http = HttpClient::new(HttpConfig::default())?;
//! let conference = ConferenceClient::new(http, nodes[0].clone(), "room");
//! let token = conference.request_token(TokenRequest::new("Alice")).await?;
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod conference;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod http;
pub mod node;
pub mod registration;
pub mod token;

pub use conference::{ConferenceClient, DTMF_DIGITS, ParticipantClient};
pub use endpoint::NodeEndpoint;
pub use error::{HttpError, HttpResult, NodeError, NodeResult};
pub use events::EventSource;
pub use http::{ApiRequest, HttpClient, HttpConfig, Reply, basic_auth};
pub use node::{ARecord, DnsLookup, HickoryDnsLookup, NodeClient, NodeResolver, SrvRecord};
pub use registration::RegistrationClient;
pub use token::{
    RegistrationDetails, Token, TokenError, TokenRequest, TokenResult, TokenService,
};

/// A boxed future for object-safe async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
