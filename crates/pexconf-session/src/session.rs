//! Conference session: join, leave and everything in between.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pexconf_client::{
    ConferenceClient, DTMF_DIGITS, HttpClient, HttpConfig, NodeEndpoint, NodeError,
    NodeResolver, ParticipantClient, Token, TokenError, TokenRequest, TokenService,
};
use pexconf_core::ConferenceAddress;
use pexconf_protocol::{ChatMessage, ConferenceStatus, DomainEvent, EventParser, StreamEvent};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::dispatcher::{EventDispatcher, Subscription, SubscriptionId};
use crate::error::{SessionError, SessionResult, StreamError};
use crate::event_stream::{EventStreamClient, StreamState};
use crate::refresher::TokenRefresher;
use crate::roster::{Roster, RosterEvent};
use crate::token_store::TokenStore;

/// What the host application sees of a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    /// Joining, or reconnecting the event stream.
    Connecting,
    Connected,
    /// The session ended on its own.
    Error(SessionError),
    /// The host left.
    Closed,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

/// A participant's session in one conference.
///
/// [`join`](Self::join) obtains a token and starts the event stream; from
/// then on the token is refreshed in the background and events are fanned
/// out to subscribers. If the token can no longer be refreshed, the stream
/// is rejected, or the node disconnects us, the session leaves by itself
/// and reports why through [`state`](Self::state).
pub struct ConferenceSession {
    address: ConferenceAddress,
    request: TokenRequest,
    config: SessionConfig,
    http: HttpClient,
    resolver: NodeResolver,
    node: tokio::sync::Mutex<Option<NodeEndpoint>>,
    shared: Arc<Shared>,
}

impl ConferenceSession {
    /// Creates a session for `address`, joining with `request`.
    pub fn new(address: ConferenceAddress, request: TokenRequest) -> SessionResult<Self> {
        let config = SessionConfig::default();
        let http =
            HttpClient::new(HttpConfig::default().with_request_timeout(config.request_timeout))?;
        Ok(Self {
            address,
            request,
            config,
            http,
            resolver: NodeResolver::system(),
            node: tokio::sync::Mutex::new(None),
            shared: Arc::new(Shared::new()),
        })
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_http(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: NodeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Uses `node` instead of resolving the conference host.
    #[must_use]
    pub fn with_node(mut self, node: NodeEndpoint) -> Self {
        self.node = tokio::sync::Mutex::new(Some(node));
        self
    }

    pub fn address(&self) -> &ConferenceAddress {
        &self.address
    }

    /// The node in use, once resolved.
    pub async fn node(&self) -> Option<NodeEndpoint> {
        self.node.lock().await.clone()
    }

    /// Joins the conference.
    ///
    /// Fails with the token challenge (PIN, extension, SSO) when the node asks
    /// for one; update the request and join again.
    #[instrument(skip_all, fields(address = %self.address))]
    pub async fn join(&self) -> SessionResult<()> {
        let mut active = self.shared.active.lock().await;
        if active.is_some() {
            return Err(SessionError::AlreadyJoined);
        }

        self.shared.set_state(SessionState::Connecting);
        match self.start().await {
            Ok(started) => {
                *active = Some(started);
                info!("joined conference");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to join conference");
                self.shared.set_state(SessionState::Error(e.clone()));
                Err(e)
            }
        }
    }

    /// Updates the token request, e.g. after a PIN challenge.
    pub fn set_request(&mut self, request: TokenRequest) {
        self.request = request;
    }

    async fn start(&self) -> SessionResult<Active> {
        let node = self.resolve_node().await?;
        let conference = ConferenceClient::new(self.http.clone(), node, self.address.alias())
            .with_timeout(self.config.request_timeout);

        let token = tokio::time::timeout(
            self.config.token_timeout,
            conference.request_token(self.request.clone()),
        )
        .await
        .unwrap_or(Err(TokenError::Timeout))?;
        debug!(participant = %token.participant_uuid, "token obtained");

        // Connected is reported once the event stream is up.
        self.shared
            .reset_view(Roster::new(Some(token.participant_uuid.clone())));

        let store = TokenStore::with_token(token).with_stale_threshold(self.config.stale_threshold);
        let service: Arc<dyn TokenService> = Arc::new(conference.clone());
        let (refresher, failed) = TokenRefresher::spawn(store.clone(), service, &self.config);
        let (stream, events) =
            EventStreamClient::spawn(Arc::new(conference.clone()), store.clone(), &self.config);

        let cancel = CancellationToken::new();
        let pump = tokio::spawn(pump(
            Arc::clone(&self.shared),
            events,
            failed,
            stream.state(),
            cancel.clone(),
        ));

        Ok(Active {
            conference,
            store,
            refresher,
            stream,
            cancel,
            pump,
        })
    }

    async fn resolve_node(&self) -> SessionResult<NodeEndpoint> {
        let mut node = self.node.lock().await;
        if let Some(ref endpoint) = *node {
            return Ok(endpoint.clone());
        }

        let host = self.address.host();
        let endpoint = self
            .resolver
            .resolve(host)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| NodeError::NodeNotFound(host.to_string()))?;
        info!(node = %endpoint, "resolved conferencing node");
        *node = Some(endpoint.clone());
        Ok(endpoint)
    }

    /// Leaves the conference: closes the event stream, releases the token and
    /// forgets it. Does nothing if not joined.
    #[instrument(skip_all, fields(address = %self.address))]
    pub async fn leave(&self) {
        let Some(mut active) = self.shared.active.lock().await.take() else {
            debug!("leave requested while not joined");
            return;
        };

        active.cancel.cancel();
        if let Err(e) = (&mut active.pump).await {
            warn!(error = %e, "session event task ended abnormally");
        }
        active.shut_down(true).await;
        self.shared.set_state(SessionState::Closed);
        info!("left conference");
    }

    /// Subscribes to domain events.
    pub fn subscribe(&self) -> Subscription<DomainEvent> {
        self.shared.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    /// Subscribes to roster changes.
    pub fn subscribe_roster(&self) -> Subscription<RosterEvent> {
        self.shared.roster_events.subscribe()
    }

    pub fn unsubscribe_roster(&self, id: SubscriptionId) -> bool {
        self.shared.roster_events.unsubscribe(id)
    }

    /// Observes the session state.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn current_state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    pub fn roster(&self) -> Roster {
        self.shared.view().roster.clone()
    }

    /// Chat messages sent and received since joining, oldest first.
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.shared.view().chat.clone()
    }

    /// The last `conference_update`, if any.
    pub fn status(&self) -> Option<ConferenceStatus> {
        self.shared.view().status
    }

    /// Sends a chat message and adds it to the local log.
    pub async fn send_chat_message(&self, text: &str) -> SessionResult<bool> {
        let (conference, token) = self.credentials().await?;
        let sent = conference.send_message(&token, text).await?;
        if sent {
            let message = ChatMessage::text(&token.display_name, &token.participant_uuid, text);
            self.shared.view().chat.push(message);
        }
        Ok(sent)
    }

    pub async fn mute_audio(&self) -> SessionResult<bool> {
        let (me, token) = self.me().await?;
        Ok(me.mute(&token).await?)
    }

    pub async fn unmute_audio(&self) -> SessionResult<bool> {
        let (me, token) = self.me().await?;
        Ok(me.unmute(&token).await?)
    }

    /// Tells the node we stopped sending video.
    pub async fn mute_video(&self) -> SessionResult<bool> {
        let (me, token) = self.me().await?;
        Ok(me.mute_video(&token).await?)
    }

    pub async fn unmute_video(&self) -> SessionResult<bool> {
        let (me, token) = self.me().await?;
        Ok(me.unmute_video(&token).await?)
    }

    pub async fn take_floor(&self) -> SessionResult<()> {
        let (me, token) = self.me().await?;
        Ok(me.take_floor(&token).await?)
    }

    pub async fn release_floor(&self) -> SessionResult<()> {
        let (me, token) = self.me().await?;
        Ok(me.release_floor(&token).await?)
    }

    /// Shows or hides live captions. Returns false without asking the node
    /// when the conference has no live captions.
    pub async fn toggle_live_captions(&self, show: bool) -> SessionResult<bool> {
        let available = self.status().is_some_and(|s| s.live_captions_available);
        if !available {
            debug!("live captions not available");
            return Ok(false);
        }
        let (me, token) = self.me().await?;
        if show {
            me.show_live_captions(&token).await?;
        } else {
            me.hide_live_captions(&token).await?;
        }
        Ok(true)
    }

    pub async fn dtmf(&self, digits: &str) -> SessionResult<bool> {
        if digits.is_empty() || !digits.chars().all(|c| DTMF_DIGITS.contains(c)) {
            return Err(SessionError::InvalidDtmf(digits.to_string()));
        }
        let (me, token) = self.me().await?;
        Ok(me.dtmf(&token, digits).await?)
    }

    pub async fn preferred_aspect_ratio(&self, ratio: f32) -> SessionResult<bool> {
        if !(ratio > 0.0 && ratio <= 2.0) {
            return Err(SessionError::InvalidAspectRatio(ratio));
        }
        let (me, token) = self.me().await?;
        Ok(me.preferred_aspect_ratio(&token, ratio).await?)
    }

    async fn credentials(&self) -> SessionResult<(ConferenceClient, Token)> {
        let (conference, store) = {
            let active = self.shared.active.lock().await;
            let active = active.as_ref().ok_or(SessionError::NotJoined)?;
            (active.conference.clone(), active.store.clone())
        };
        let token = store.current_token().await?;
        Ok((conference, token))
    }

    async fn me(&self) -> SessionResult<(ParticipantClient, Token)> {
        let (conference, token) = self.credentials().await?;
        Ok((conference.participant(&token.participant_uuid), token))
    }
}

/// Everything that exists only while joined.
struct Active {
    conference: ConferenceClient,
    store: TokenStore,
    refresher: TokenRefresher,
    stream: EventStreamClient,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

impl Active {
    async fn shut_down(mut self, release: bool) {
        self.stream.close().await;
        self.refresher.stop(release).await;
        self.store.clear().await;
    }
}

#[derive(Default)]
struct View {
    roster: Roster,
    chat: Vec<ChatMessage>,
    status: Option<ConferenceStatus>,
    /// Swallow the next `presentation_stop`.
    skip_presentation_stop: bool,
}

struct Shared {
    state: watch::Sender<SessionState>,
    events: EventDispatcher<DomainEvent>,
    roster_events: EventDispatcher<RosterEvent>,
    view: Mutex<View>,
    active: tokio::sync::Mutex<Option<Active>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: watch::Sender::new(SessionState::Idle),
            events: EventDispatcher::new(),
            roster_events: EventDispatcher::new(),
            view: Mutex::new(View::default()),
            active: tokio::sync::Mutex::new(None),
        }
    }

    fn view(&self) -> MutexGuard<'_, View> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset_view(&self, roster: Roster) {
        *self.view() = View {
            roster,
            ..View::default()
        };
    }

    fn set_state(&self, state: SessionState) {
        debug!(?state, "session state");
        self.state.send_replace(state);
    }

    /// Updates local state from `event` and fans it out. Returns the reason
    /// if the node ended the session.
    fn handle(&self, event: DomainEvent) -> Option<String> {
        let roster_change = {
            let mut view = self.view();
            match &event {
                DomainEvent::PresentationStop if view.skip_presentation_stop => {
                    view.skip_presentation_stop = false;
                    debug!("ignoring presentation_stop after connect");
                    return None;
                }
                DomainEvent::PresentationStart(_) => view.skip_presentation_stop = false,
                DomainEvent::ConferenceUpdate(status) => view.status = Some(*status),
                DomainEvent::MessageReceived(message) => view.chat.push(message.clone()),
                _ => {}
            }
            view.roster.apply(&event)
        };

        if let Some(change) = roster_change {
            self.roster_events.dispatch(change);
        }
        let disconnected = match &event {
            DomainEvent::ClientDisconnected(disconnect) => Some(disconnect.reason.clone()),
            _ => None,
        };
        self.events.dispatch(event);
        disconnected
    }

    fn stream_state_changed(&self, state: &StreamState) {
        match state {
            StreamState::Streaming => {
                self.view().skip_presentation_stop = true;
                self.set_state(SessionState::Connected);
            }
            StreamState::Reconnecting { .. } => self.set_state(SessionState::Connecting),
            _ => {}
        }
    }

    /// Leaves on behalf of the session itself.
    async fn auto_leave(&self, error: SessionError, release: bool) {
        let Some(active) = self.active.lock().await.take() else {
            return;
        };
        warn!(error = %error, "leaving conference");
        active.shut_down(release).await;
        self.set_state(SessionState::Error(error));
    }
}

/// Moves stream records to subscribers and watches for the reasons the
/// session must end.
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

    let (error, release) = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = &mut refresh_failed, if !refresher_gone => match result {
                Ok(error) => break (SessionError::Token(error), true),
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
                    break (SessionError::Stream(error), true);
                };
                let Some(event) = parser.parse(&record) else {
                    continue;
                };
                if let Some(reason) = shared.handle(event) {
                    info!(reason = %reason, "disconnected by the conference");
                    break (SessionError::Disconnected(reason), false);
                }
            }
        }
    };

    shared.auto_leave(error, release).await;
}
