//! Conference session: token store, event stream, dispatcher, roster.
//!
//! This crate keeps a participant connected to a conference:
//! - [`TokenStore`] serializes token access and allows one refresh at a time
//! - [`TokenRefresher`] refreshes the token in the background
//! - [`EventStreamClient`] holds the event stream open across reconnects
//! - [`EventDispatcher`] fans decoded events out to subscribers
//! - [`ConferenceSession`] ties them together behind `join` / `leave`
//! - [`RegistrationSession`] does the same for a registered device alias,
//!   reporting only incoming calls
//!
//! # Example
//!
//! ```rust,no_run
//! use pexconf_client::TokenRequest;
//! use pexconf_core::ConferenceAddress;
//! use pexconf_session::ConferenceSession;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let address = ConferenceAddress::parse("room@example.com")?;
//!     let session = ConferenceSession::new(address, TokenRequest::new("Alice"))?;
//!     let mut events = session.subscribe();
//!
//!     session.join().await?;
//!     while let Some(event) = events.recv().await {
//!         println!("{}", event.name().as_str());
//!     }
//!     session.leave().await;
//!     Ok(())
//! }
//! ```

mod config;
mod dispatcher;
mod error;
mod event_stream;
mod refresher;
mod registration;
mod roster;
mod session;
mod token_store;

pub use config::SessionConfig;
pub use dispatcher::{EventDispatcher, Subscription, SubscriptionId};
pub use error::{SessionError, SessionResult, StreamError};
pub use event_stream::{EventStreamClient, StreamState};
pub use refresher::TokenRefresher;
pub use registration::{RegistrationEvent, RegistrationSession};
pub use roster::{Roster, RosterEvent};
pub use session::{ConferenceSession, SessionState};
pub use token_store::{RefreshId, RefreshTicket, TokenStore, TokenStoreState};
