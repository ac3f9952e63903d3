//! Background token refresh.

use std::sync::Arc;
use std::time::Duration;

use pexconf_client::{Token, TokenError, TokenResult, TokenService};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::token_store::TokenStore;

/// Keeps the token in a [`TokenStore`] fresh.
///
/// Each token is refreshed halfway through its lifetime, or earlier when
/// it is within `refresh_threshold` of expiring. The first failure ends the
/// task and is delivered on the receiver returned by [`TokenRefresher::spawn`].
pub struct TokenRefresher {
    store: TokenStore,
    service: Arc<dyn TokenService>,
    token_timeout: Duration,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TokenRefresher {
    /// Starts refreshing the token held by `store`.
    pub fn spawn(
        store: TokenStore,
        service: Arc<dyn TokenService>,
        config: &SessionConfig,
    ) -> (Self, oneshot::Receiver<TokenError>) {
        let (failed_tx, failed_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            store.clone(),
            Arc::clone(&service),
            config.token_timeout,
            config.refresh_threshold,
            cancel.clone(),
            failed_tx,
        ));

        let refresher = Self {
            store,
            service,
            token_timeout: config.token_timeout,
            cancel,
            task,
        };
        (refresher, failed_rx)
    }

    /// Stops refreshing and, if `release` is set, gives the token back.
    ///
    /// Release failures are logged, not returned.
    pub async fn stop(self, release: bool) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "token refresher ended abnormally");
        }
        if !release {
            return;
        }

        let token = match self.store.latest_token().await {
            Ok(token) => token,
            Err(e) => {
                debug!(error = %e, "no token to release");
                return;
            }
        };
        match with_timeout(self.token_timeout, self.service.release_token(&token)).await {
            Ok(()) => debug!("token released"),
            Err(e) => warn!(error = %e, "failed to release token"),
        }
    }
}

async fn run(
    store: TokenStore,
    service: Arc<dyn TokenService>,
    token_timeout: Duration,
    refresh_threshold: Duration,
    cancel: CancellationToken,
    failed: oneshot::Sender<TokenError>,
) {
    loop {
        let latest = tokio::select! {
            _ = cancel.cancelled() => return,
            latest = store.latest_token() => latest,
        };
        let token = match latest {
            Ok(token) => token,
            Err(e) => {
                let _ = failed.send(e);
                return;
            }
        };

        let wake = refresh_deadline(&token, refresh_threshold);
        debug!(in_secs = wake.saturating_duration_since(Instant::now()).as_secs(), "next token refresh");
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep_until(wake) => {}
        }

        let producer = {
            let service = Arc::clone(&service);
            async move { with_timeout(token_timeout, service.refresh_token(&token)).await }
        };
        let ticket = store.begin_refresh(producer).await;
        let own = ticket.started();
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                // A refresh someone else started is left to finish.
                if let Some(id) = own {
                    store.cancel_refresh(id).await;
                }
                return;
            }
            result = ticket.wait() => result,
        };

        match result {
            Ok(_) => info!("token refreshed"),
            // Superseded or cancelled elsewhere; pick up whatever the store holds now.
            Err(TokenError::Cancelled) => continue,
            Err(e) => {
                warn!(error = %e, "token refresh failed, giving up");
                let _ = failed.send(e);
                return;
            }
        }
    }
}

/// Halfway through the lifetime, or `threshold` before expiry if sooner,
/// but never before the token was issued.
fn refresh_deadline(token: &Token, threshold: Duration) -> Instant {
    let early = token
        .expires_at()
        .checked_sub(threshold)
        .unwrap_or_else(|| token.issued_at());
    token.refresh_at().min(early).max(token.issued_at())
}

async fn with_timeout<T>(
    timeout: Duration,
    future: impl std::future::Future<Output = TokenResult<T>>,
) -> TokenResult<T> {
    tokio::time::timeout(timeout, future)
        .await
        .unwrap_or(Err(TokenError::Timeout))
}
