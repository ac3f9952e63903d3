//! Device registration session: keeps a registration alive and reports
//! incoming calls.

use std::sync::Arc;

use pexconf_client::{RegistrationClient, TokenError, TokenService};
use pexconf_protocol::{DomainEvent, EventParser, IncomingCall, IncomingCancelled, StreamEvent};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::SessionConfig;
use crate::dispatcher::{EventDispatcher, Subscription, SubscriptionId};
use crate::error::{SessionError, SessionResult, StreamError};
use crate::event_stream::{EventStreamClient, StreamState};
use crate::refresher::TokenRefresher;
use crate::session::SessionState;
use crate::token_store::TokenStore;

/// What a registration reports to the host application.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationEvent {
    Incoming(IncomingCall),
    IncomingCancelled(IncomingCancelled),
    /// The registration ended by itself.
    Failure(SessionError),
}

/// A registered device alias.
///
/// [`register`](Self::register) obtains a registration token and listens
/// for calls until [`cancel`](Self::cancel), or until the token can no
/// longer be refreshed or the stream is rejected. In that case subscribers
/// get a [`RegistrationEvent::Failure`] and the state turns to
/// [`SessionState::Error`].
pub struct RegistrationSession {
    client: RegistrationClient,
    config: SessionConfig,
    shared: Arc<Shared>,
}

impl RegistrationSession {
    pub fn new(client: RegistrationClient) -> Self {
        let config = SessionConfig::default();
        Self {
            client: client.with_timeout(config.request_timeout),
            config,
            shared: Arc::new(Shared::new()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.client = self.client.with_timeout(config.request_timeout);
        self.config = config;
        self
    }

    pub fn alias(&self) -> &str {
        self.client.alias()
    }

    /// Registers with the device credentials and starts listening.
    #[instrument(skip_all, fields(alias = %self.client.alias()))]
    pub async fn register(&self, username: &str, password: &str) -> SessionResult<()> {
        let mut active = self.shared.active.lock().await;
        if active.is_some() {
            return Err(SessionError::AlreadyRegistered);
        }

        self.shared.set_state(SessionState::Connecting);
        match self.start(username, password).await {
            Ok(started) => {
                *active = Some(started);
                info!("registered");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "registration failed");
                self.shared.set_state(SessionState::Error(e.clone()));
                Err(e)
            }
        }
    }

    async fn start(&self, username: &str, password: &str) -> SessionResult<Active> {
        let token = tokio::time::timeout(
            self.config.token_timeout,
            self.client.request_token(username, password),
        )
        .await
        .unwrap_or(Err(TokenError::Timeout))?;

        let store =
            TokenStore::with_token(token).with_stale_threshold(self.config.stale_threshold);
        let service: Arc<dyn TokenService> = Arc::new(self.client.clone());
        let (refresher, failed) = TokenRefresher::spawn(store.clone(), service, &self.config);
        let (stream, events) =
            EventStreamClient::spawn(Arc::new(self.client.clone()), store.clone(), &self.config);

        let cancel = CancellationToken::new();
        let pump = tokio::spawn(pump(
            Arc::clone(&self.shared),
            events,
            failed,
            stream.state(),
            cancel.clone(),
        ));

        Ok(Active {
            store,
            refresher,
            stream,
            cancel,
            pump,
        })
    }

    /// Stops listening and releases the registration. Does nothing if not
    /// registered.
    #[instrument(skip_all, fields(alias = %self.client.alias()))]
    pub async fn cancel(&self) {
        let Some(mut active) = self.shared.active.lock().await.take() else {
            debug!("cancel requested while not registered");
            return;
        };

        active.cancel.cancel();
        if let Err(e) = (&mut active.pump).await {
            warn!(error = %e, "registration event task ended abnormally");
        }
        active.shut_down().await;
        self.shared.set_state(SessionState::Closed);
        info!("registration cancelled");
    }

    pub fn subscribe(&self) -> Subscription<RegistrationEvent> {
        self.shared.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn current_state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }
}

struct Active {
    store: TokenStore,
    refresher: TokenRefresher,
    stream: EventStreamClient,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

impl Active {
    async fn shut_down(mut self) {
        self.stream.close().await;
        self.refresher.stop(true).await;
        self.store.clear().await;
    }
}

struct Shared {
    state: watch::Sender<SessionState>,
    events: EventDispatcher<RegistrationEvent>,
    active: Mutex<Option<Active>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: watch::Sender::new(SessionState::Idle),
            events: EventDispatcher::new(),
            active: Mutex::new(None),
        }
    }

    fn set_state(&self, state: SessionState) {
        debug!(?state, "registration state");
        self.state.send_replace(state);
    }

    fn stream_state_changed(&self, state: &StreamState) {
        match state {
            StreamState::Streaming => self.set_state(SessionState::Connected),
            StreamState::Reconnecting { .. } => self.set_state(SessionState::Connecting),
            _ => {}
        }
    }

    /// Ends the registration on its own and tells subscribers why.
    async fn fail(&self, error: SessionError) {
        let Some(active) = self.active.lock().await.take() else {
            return;
        };
        warn!(error = %error, "registration ended");
        active.shut_down().await;
        self.set_state(SessionState::Error(error.clone()));
        self.events.dispatch(RegistrationEvent::Failure(error));
    }
}

/// Only call notifications are meaningful on a registration stream.
fn registration_event(event: DomainEvent) -> Option<RegistrationEvent> {
    match event {
        DomainEvent::Incoming(call) => Some(RegistrationEvent::Incoming(call)),
        DomainEvent::IncomingCancelled(cancelled) => {
            Some(RegistrationEvent::IncomingCancelled(cancelled))
        }
        other => {
            trace!(event = other.name().as_str(), "ignoring event on registration stream");
            None
        }
    }
}

async fn pump(
    shared: Arc<Shared>,
    mut events: mpsc::Receiver<StreamEvent>,
    mut refresh_failed: oneshot::Receiver<TokenError>,
    mut stream_state: watch::Receiver<StreamState>,
    cancel: CancellationToken,
) {
    let parser = EventParser::new();
    let mut refresher_gone = false;
    let mut stream_gone = false;
    shared.stream_state_changed(&stream_state.borrow_and_update().clone());

    let error = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = &mut refresh_failed, if !refresher_gone => match result {
                Ok(error) => break SessionError::Token(error),
                Err(_) => refresher_gone = true,
            },
            changed = stream_state.changed(), if !stream_gone => match changed {
                Ok(()) => {
                    let state = stream_state.borrow_and_update().clone();
                    shared.stream_state_changed(&state);
                }
                Err(_) => stream_gone = true,
            },
            record = events.recv() => {
                let Some(record) = record else {
                    let error = match stream_state.borrow().clone() {
                        StreamState::Closed(error) => error,
                        _ => StreamError::Closed,
                    };
                    break SessionError::Stream(error);
                };
                if let Some(event) = parser.parse(&record).and_then(registration_event) {
                    shared.events.dispatch(event);
                }
            }
        }
    };

    shared.fail(error).await;
}
