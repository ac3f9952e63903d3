//! Single-writer store for the session token.
//!
//! At most one refresh runs at a time. Callers that ask for a refresh, or
//! for the current token, while one is pending all receive its outcome.
//! A failed refresh leaves the store failed until a later success or
//! [`TokenStore::replace`]; the previous token is never served again.
//! Neither is a token within the store's stale threshold of expiring: it
//! has to be refreshed first.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use pexconf_client::{Token, TokenError, TokenResult};
use tokio::sync::{Mutex, watch};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

type Outcome = Option<TokenResult<Token>>;

/// Observable state of a [`TokenStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStoreState {
    /// No token, either not yet populated or cleared.
    Empty,
    Valid,
    Refreshing,
    /// The last refresh failed with this error.
    Failed(TokenError),
}

#[derive(Debug)]
enum Settled {
    Empty,
    Valid(Token),
    Failed(TokenError),
}

struct Pending {
    generation: u64,
    outcome: watch::Sender<Outcome>,
    task: AbortHandle,
}

struct Inner {
    /// Last settled state. Kept while a refresh is pending so a cancel can
    /// revert to it.
    state: Settled,
    pending: Option<Pending>,
    /// Bumped by every refresh start, replace and clear.
    generation: u64,
}

/// Holds the session token and serializes refreshes.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<Mutex<Inner>>,
    stale_threshold: Duration,
}

impl TokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_state(Settled::Empty)
    }

    /// Creates a store holding `token`.
    pub fn with_token(token: Token) -> Self {
        Self::with_state(Settled::Valid(token))
    }

    fn with_state(state: Settled) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                pending: None,
                generation: 0,
            })),
            stale_threshold: Duration::ZERO,
        }
    }

    /// Builder: refuse tokens that expire within `threshold`.
    ///
    /// Defaults to zero, so only expired tokens are refused.
    #[must_use]
    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    /// Returns the current token, waiting for a pending refresh.
    ///
    /// A stale token is refused with [`TokenError::Expired`]; the store
    /// stays valid so a refresh can still replace it.
    pub async fn current_token(&self) -> TokenResult<Token> {
        let token = self.latest_token().await?;
        if token.is_stale(self.stale_threshold) {
            debug!(expires = ?token.expires(), "refusing stale token");
            return Err(TokenError::Expired);
        }
        Ok(token)
    }

    /// Like [`TokenStore::current_token`] but hands out stale tokens too.
    ///
    /// Meant for refreshing and releasing, which need the old token.
    pub async fn latest_token(&self) -> TokenResult<Token> {
        let mut outcome = {
            let inner = self.inner.lock().await;
            if let Some(ref pending) = inner.pending {
                pending.outcome.subscribe()
            } else {
                return match inner.state {
                    Settled::Empty => Err(TokenError::Expired),
                    Settled::Valid(ref token) => Ok(token.clone()),
                    Settled::Failed(ref error) => Err(error.clone()),
                };
            }
        };
        wait_for_outcome(&mut outcome).await
    }

    /// Refreshes the token with `producer`, or joins the refresh already in
    /// flight, in which case `producer` is dropped unpolled.
    pub async fn refresh<F>(&self, producer: F) -> TokenResult<Token>
    where
        F: Future<Output = TokenResult<Token>> + Send + 'static,
    {
        self.begin_refresh(producer).await.wait().await
    }

    /// Starts a refresh, or joins the one in flight, without waiting for it.
    pub async fn begin_refresh<F>(&self, producer: F) -> RefreshTicket
    where
        F: Future<Output = TokenResult<Token>> + Send + 'static,
    {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if let Some(ref pending) = inner.pending {
            debug!(generation = pending.generation, "joining in-flight token refresh");
            return RefreshTicket {
                generation: pending.generation,
                started: false,
                outcome: pending.outcome.subscribe(),
            };
        }

        inner.generation += 1;
        let generation = inner.generation;
        let (tx, rx) = watch::channel(None);
        let store = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(producer)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(TokenError::ConnectionFailed {
                        status: None,
                        message: "token refresh panicked".to_string(),
                    })
                });
            complete(&store, generation, outcome).await;
        });
        debug!(generation, "started token refresh");
        inner.pending = Some(Pending {
            generation,
            outcome: tx,
            task: task.abort_handle(),
        });
        RefreshTicket {
            generation,
            started: true,
            outcome: rx,
        }
    }

    /// Installs a new token, superseding any pending refresh.
    ///
    /// Callers waiting on the superseded refresh receive `token`.
    pub async fn replace(&self, token: Token) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.state = Settled::Valid(token.clone());
        if let Some(pending) = inner.pending.take() {
            debug!(generation = pending.generation, "token replaced during refresh");
            pending.task.abort();
            pending.outcome.send_replace(Some(Ok(token)));
        }
    }

    /// Stops a pending refresh and reverts to the last settled state.
    ///
    /// Callers waiting on it receive [`TokenError::Cancelled`]. Returns
    /// false if no refresh was pending.
    pub async fn cancel_pending_refresh(&self) -> bool {
        self.cancel_where(|_| true).await
    }

    /// Like [`TokenStore::cancel_pending_refresh`], but only if `id` is
    /// still the refresh in flight.
    pub async fn cancel_refresh(&self, id: RefreshId) -> bool {
        self.cancel_where(|p| p.generation == id.0).await
    }

    async fn cancel_where(&self, matches: impl FnOnce(&Pending) -> bool) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(pending) = inner.pending.take_if(|p| matches(p)) else {
            return false;
        };
        debug!(generation = pending.generation, "cancelling token refresh");
        pending.task.abort();
        pending
            .outcome
            .send_replace(Some(Err(TokenError::Cancelled)));
        true
    }

    /// Drops the token and any pending refresh.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.state = Settled::Empty;
        if let Some(pending) = inner.pending.take() {
            pending.task.abort();
            pending
                .outcome
                .send_replace(Some(Err(TokenError::Cancelled)));
        }
    }

    pub async fn state(&self) -> TokenStoreState {
        let inner = self.inner.lock().await;
        if inner.pending.is_some() {
            return TokenStoreState::Refreshing;
        }
        match inner.state {
            Settled::Empty => TokenStoreState::Empty,
            Settled::Valid(_) => TokenStoreState::Valid,
            Settled::Failed(ref error) => TokenStoreState::Failed(error.clone()),
        }
    }

    pub async fn is_refreshing(&self) -> bool {
        self.inner.lock().await.pending.is_some()
    }
}

/// Identifies one refresh started through [`TokenStore::begin_refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshId(u64);

/// A caller's handle on a refresh started or joined through
/// [`TokenStore::begin_refresh`].
pub struct RefreshTicket {
    generation: u64,
    started: bool,
    outcome: watch::Receiver<Outcome>,
}

impl RefreshTicket {
    /// The refresh id, if this caller started it rather than joining one.
    pub fn started(&self) -> Option<RefreshId> {
        self.started.then_some(RefreshId(self.generation))
    }

    /// Waits for the refresh outcome.
    pub async fn wait(mut self) -> TokenResult<Token> {
        wait_for_outcome(&mut self.outcome).await
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies a refresh outcome unless the refresh was superseded.
async fn complete(store: &Mutex<Inner>, generation: u64, outcome: TokenResult<Token>) {
    let mut inner = store.lock().await;
    let Some(pending) = inner.pending.take_if(|p| p.generation == generation) else {
        debug!(generation, "discarding superseded token refresh");
        return;
    };

    match outcome {
        Ok(ref token) => {
            debug!(generation, expires = ?token.expires(), "token refresh succeeded");
            inner.state = Settled::Valid(token.clone());
        }
        Err(ref error) => {
            warn!(generation, error = %error, "token refresh failed");
            inner.state = Settled::Failed(error.clone());
        }
    }
    pending.outcome.send_replace(Some(outcome));
}

async fn wait_for_outcome(outcome: &mut watch::Receiver<Outcome>) -> TokenResult<Token> {
    match outcome.wait_for(Option::is_some).await {
        Ok(value) => (*value).clone().unwrap_or(Err(TokenError::Cancelled)),
        Err(_) => Err(TokenError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn token(value: &str) -> Token {
        Token::for_tests(value, Duration::from_secs(120))
    }

    async fn wait_until_refreshing(store: &TokenStore) {
        while !store.is_refreshing().await {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_one_request() {
        let store = TokenStore::with_token(token("t0"));
        let calls = Arc::new(AtomicUsize::new(0));

        let producer = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(token("t1"))
        };

        let (a, b) = tokio::join!(
            store.refresh(producer(calls.clone())),
            store.refresh(producer(calls.clone())),
        );
        assert_eq!(a, Ok(token("t1")));
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.current_token().await, Ok(token("t1")));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_failure() {
        let store = TokenStore::with_token(token("t0"));
        let (a, b) = tokio::join!(
            store.refresh(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(TokenError::AuthenticationFailed)
            }),
            store.refresh(async { Ok(token("never")) }),
        );
        assert_eq!(a, Err(TokenError::AuthenticationFailed));
        assert_eq!(b, Err(TokenError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn failure_persists_until_replace() {
        let store = TokenStore::with_token(token("t0"));
        let result = store
            .refresh(async { Err(TokenError::status(502)) })
            .await;
        assert_eq!(result, Err(TokenError::status(502)));

        for _ in 0..3 {
            assert_eq!(store.current_token().await, Err(TokenError::status(502)));
        }
        assert_eq!(
            store.state().await,
            TokenStoreState::Failed(TokenError::status(502))
        );

        store.replace(token("t2")).await;
        assert_eq!(store.current_token().await, Ok(token("t2")));
    }

    #[tokio::test]
    async fn successful_refresh_recovers_failed_store() {
        let store = TokenStore::with_token(token("t0"));
        let _ = store.refresh(async { Err(TokenError::Timeout) }).await;
        assert_eq!(store.current_token().await, Err(TokenError::Timeout));

        store.refresh(async { Ok(token("t1")) }).await.unwrap();
        assert_eq!(store.current_token().await, Ok(token("t1")));
    }

    #[tokio::test]
    async fn cancel_reverts_to_last_valid_token() {
        let store = TokenStore::with_token(token("t0"));
        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh(std::future::pending()).await })
        };
        wait_until_refreshing(&store).await;

        let reader = {
            let store = store.clone();
            tokio::spawn(async move { store.current_token().await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert!(store.cancel_pending_refresh().await);
        assert_eq!(waiter.await.unwrap(), Err(TokenError::Cancelled));
        assert_eq!(reader.await.unwrap(), Err(TokenError::Cancelled));
        assert_eq!(store.state().await, TokenStoreState::Valid);
        assert_eq!(store.current_token().await, Ok(token("t0")));
        assert!(!store.cancel_pending_refresh().await);
    }

    #[tokio::test(start_paused = true)]
    async fn replace_wins_over_late_refresh() {
        let store = TokenStore::with_token(token("t0"));
        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .refresh(async {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        Ok(token("stale"))
                    })
                    .await
            })
        };
        wait_until_refreshing(&store).await;

        store.replace(token("fresh")).await;
        assert_eq!(waiter.await.unwrap(), Ok(token("fresh")));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.current_token().await, Ok(token("fresh")));
    }

    #[tokio::test]
    async fn late_completion_is_discarded() {
        let store = TokenStore::with_token(token("t0"));
        store.replace(token("t1")).await;
        // A completion carrying a generation older than the latest replace.
        complete(&store.inner, 0, Ok(token("old"))).await;
        assert_eq!(store.current_token().await, Ok(token("t1")));
    }

    #[tokio::test(start_paused = true)]
    async fn current_token_waits_for_refresh() {
        let store = TokenStore::with_token(token("t0"));
        let refresh = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .refresh(async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(token("t1"))
                    })
                    .await
            })
        };
        wait_until_refreshing(&store).await;
        assert_eq!(store.current_token().await, Ok(token("t1")));
        refresh.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_is_refused() {
        let store = TokenStore::with_token(Token::for_tests("t0", Duration::from_secs(2)));
        assert_eq!(store.current_token().await.unwrap().value(), "t0");

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.current_token().await, Err(TokenError::Expired));
        assert_eq!(store.state().await, TokenStoreState::Valid);
        assert_eq!(store.latest_token().await.unwrap().value(), "t0");

        store.refresh(async { Ok(token("t1")) }).await.unwrap();
        assert_eq!(store.current_token().await, Ok(token("t1")));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_threshold_refuses_early() {
        let store = TokenStore::with_token(token("t0")).with_stale_threshold(Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(105)).await;
        assert!(store.current_token().await.is_ok());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.current_token().await, Err(TokenError::Expired));
    }

    #[tokio::test]
    async fn cancel_spares_someone_elses_refresh() {
        let store = TokenStore::with_token(token("t0"));
        let first = store.begin_refresh(std::future::pending()).await;
        let joined = store.begin_refresh(async { Ok(token("never")) }).await;
        let Some(first_id) = first.started() else {
            panic!("first caller should own the refresh");
        };
        assert!(joined.started().is_none());

        assert!(store.cancel_refresh(first_id).await);
        assert!(!store.is_refreshing().await);

        // An id for a refresh that already ended does not match a newer one.
        let second = store.begin_refresh(std::future::pending()).await;
        assert!(!store.cancel_refresh(first_id).await);
        assert!(store.is_refreshing().await);
        assert!(store.cancel_refresh(second.started().unwrap()).await);
        assert_eq!(joined.wait().await, Err(TokenError::Cancelled));
        assert_eq!(first.wait().await, Err(TokenError::Cancelled));
        assert_eq!(store.current_token().await, Ok(token("t0")));
    }

    #[tokio::test]
    async fn cleared_store_has_no_token() {
        let store = TokenStore::with_token(token("t0"));
        store.clear().await;
        assert_eq!(store.state().await, TokenStoreState::Empty);
        assert_eq!(store.current_token().await, Err(TokenError::Expired));
    }
}
