//! Event stream client with reconnects.
//!
//! ```text
//! Idle ─▶ Connecting ─▶ Streaming ─▶ Reconnecting ─▶ Connecting ...
//!              │             │              │
//!              └─────────────┴──────────────┴──▶ Closed
//! ```
//!
//! Every connect takes a fresh token from the [`TokenStore`]. A dropped
//! connection is retried after `max(retry hint, floor)`; only a 401/403,
//! a token failure or the owner closing the stream ends it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use pexconf_client::{EventSource, HttpError};
use pexconf_protocol::{EventStreamParser, StreamEvent};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::error::StreamError;
use crate::token_store::TokenStore;

/// Capacity of the channel between the stream task and its consumer.
const EVENT_BUFFER: usize = 64;

/// Number of recent event ids remembered to drop replays.
const SEEN_IDS: usize = 64;

/// Connection state of the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Streaming,
    /// Waiting before the next connect attempt.
    Reconnecting { delay: Duration },
    /// Terminal.
    Closed(StreamError),
}

impl StreamState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

/// Handle to a running event stream.
pub struct EventStreamClient {
    state: watch::Receiver<StreamState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl EventStreamClient {
    /// Starts streaming events from `source`, authenticated from `store`.
    ///
    /// Records arrive on the returned receiver in wire order.
    pub fn spawn(
        source: Arc<dyn EventSource>,
        store: TokenStore,
        config: &SessionConfig,
    ) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (state_tx, state_rx) = watch::channel(StreamState::Idle);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();

        let worker = StreamWorker {
            source,
            store,
            config: config.clone(),
            state: state_tx,
            events: events_tx,
            cancel: cancel.clone(),
            parser: EventStreamParser::new(),
            last_event_id: None,
            retry_hint: None,
            seen: VecDeque::with_capacity(SEEN_IDS),
        };
        let task = tokio::spawn(worker.run());

        let client = Self {
            state: state_rx,
            cancel,
            task: Some(task),
        };
        (client, events_rx)
    }

    /// Subscribes to state changes.
    pub fn state(&self) -> watch::Receiver<StreamState> {
        self.state.clone()
    }

    pub fn current_state(&self) -> StreamState {
        self.state.borrow().clone()
    }

    /// Closes the stream, aborting any connection attempt in flight.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "event stream task ended abnormally");
        }
    }
}

impl Drop for EventStreamClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Why a single connection ended.
enum Disconnect {
    /// Reconnect after the usual delay.
    Retry,
    /// Stop for good.
    Terminal(StreamError),
}

struct StreamWorker {
    source: Arc<dyn EventSource>,
    store: TokenStore,
    config: SessionConfig,
    state: watch::Sender<StreamState>,
    events: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
    parser: EventStreamParser,
    last_event_id: Option<String>,
    retry_hint: Option<Duration>,
    seen: VecDeque<String>,
}

impl StreamWorker {
    #[instrument(skip_all, fields(alias = %self.source.alias()))]
    async fn run(mut self) {
        let cancel = self.cancel.clone();
        let reason = loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break StreamError::Closed,
                outcome = self.connect() => outcome,
            };
            if let Disconnect::Terminal(error) = outcome {
                break error;
            }

            let delay = self.config.reconnect_delay(self.retry_hint);
            self.state.send_replace(StreamState::Reconnecting { delay });
            debug!(delay_ms = delay.as_millis() as u64, "reconnecting event stream");
            tokio::select! {
                _ = cancel.cancelled() => break StreamError::Closed,
                _ = tokio::time::sleep(delay) => {}
            }
        };

        info!(reason = %reason, "event stream closed");
        self.state.send_replace(StreamState::Closed(reason));
    }

    /// Runs one connection until it drops.
    async fn connect(&mut self) -> Disconnect {
        self.state.send_replace(StreamState::Connecting);

        let token = match self.store.current_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "no valid token for the event stream");
                return Disconnect::Terminal(StreamError::Token(e));
            }
        };

        let response = match self
            .source
            .open_events(&token, self.last_event_id.as_deref())
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_auth_failure() => {
                let status = e.status_code().unwrap_or(401);
                warn!(status, "event stream rejected");
                return Disconnect::Terminal(StreamError::Unauthorized(status));
            }
            Err(e) => {
                warn!(error = %e, "failed to open event stream");
                return Disconnect::Retry;
            }
        };

        self.state.send_replace(StreamState::Streaming);
        self.parser.reset();
        debug!(last_event_id = ?self.last_event_id, "event stream connected");

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %HttpError::from(e), "event stream read failed");
                    return Disconnect::Retry;
                }
            };
            let records = match self.parser.push(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(error = %e, "event stream framing failed");
                    return Disconnect::Retry;
                }
            };
            for record in records {
                if !self.deliver(record).await {
                    return Disconnect::Terminal(StreamError::Closed);
                }
            }
        }

        debug!("event stream ended by the node");
        Disconnect::Retry
    }

    /// Forwards a record unless it is a replay. Returns false once nobody
    /// listens anymore.
    async fn deliver(&mut self, record: StreamEvent) -> bool {
        if let Some(retry) = record.retry {
            self.retry_hint = Some(Duration::from_millis(retry));
        }
        if let Some(ref id) = record.id {
            if self.seen.contains(id) {
                debug!(id = %id, "dropping replayed event");
                return true;
            }
            if self.seen.len() == SEEN_IDS {
                self.seen.pop_front();
            }
            self.seen.push_back(id.clone());
            self.last_event_id = Some(id.clone());
        }
        if record.name.is_none() && record.data.is_none() {
            return true;
        }
        self.events.send(record).await.is_ok()
    }
}
