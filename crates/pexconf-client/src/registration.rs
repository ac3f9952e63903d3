//! Device registrations.
//!
//! A registered device alias receives `incoming` and `incoming_cancelled`
//! events for calls placed to it. The token is obtained with the device's
//! credentials and then refreshed and released like a conference token.

use std::time::Duration;

use pexconf_protocol::{RefreshPayload, RegistrationTokenPayload};
use reqwest::Response;
use tracing::{debug, info, instrument};

use crate::BoxFuture;
use crate::endpoint::NodeEndpoint;
use crate::error::HttpResult;
use crate::events::{EventSource, stream_request};
use crate::http::{ApiRequest, HttpClient};
use crate::token::{Token, TokenError, TokenResult, TokenService};

/// Requests scoped to one registered device alias on one node.
#[derive(Debug, Clone)]
pub struct RegistrationClient {
    http: HttpClient,
    node: NodeEndpoint,
    alias: String,
    timeout: Option<Duration>,
}

impl RegistrationClient {
    /// Creates a client for the device `alias` on `node`.
    pub fn new(http: HttpClient, node: NodeEndpoint, alias: impl Into<String>) -> Self {
        Self {
            http,
            node,
            alias: alias.into(),
            timeout: None,
        }
    }

    /// Bounds every request made through this client.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn node(&self) -> &NodeEndpoint {
        &self.node
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    fn request(&self, action: &str) -> HttpResult<ApiRequest> {
        let request = ApiRequest::post(self.node.registration_url(&self.alias, action)?)
            .with_resource("registration");
        Ok(match self.timeout {
            Some(timeout) => request.with_timeout(timeout),
            None => request,
        })
    }

    /// Requests a registration token with the device credentials.
    ///
    /// Empty credentials are refused without a request.
    #[instrument(skip_all, fields(alias = %self.alias))]
    pub async fn request_token(&self, username: &str, password: &str) -> TokenResult<Token> {
        if username.is_empty() || password.is_empty() {
            return Err(TokenError::AuthenticationFailed);
        }
        let api = self
            .request("request_token")?
            .with_basic_auth(username, password);
        let payload: RegistrationTokenPayload = self.http.json(api).await?;
        let token = Token::from_registration(payload);
        info!(registration = %token.participant_uuid, "registration token granted");
        Ok(token)
    }

    /// Opens the registration event stream.
    #[instrument(skip_all, fields(alias = %self.alias))]
    pub async fn open_events(
        &self,
        token: &Token,
        last_event_id: Option<&str>,
    ) -> HttpResult<Response> {
        let url = self.node.registration_url(&self.alias, "events")?;
        let request = stream_request(url, "registration", token, last_event_id);
        self.http.open_stream(request).await
    }

    #[instrument(skip_all, fields(alias = %self.alias))]
    async fn refresh_token_inner(&self, token: &Token) -> TokenResult<Token> {
        let api = self.request("refresh_token")?.with_token(token.value());
        let payload: RefreshPayload = self.http.json(api).await?;
        debug!(expires = payload.expires, "registration token refreshed");
        Ok(token.updating(payload.token, Duration::from_secs(payload.expires)))
    }

    #[instrument(skip_all, fields(alias = %self.alias))]
    async fn release_token_inner(&self, token: &Token) -> TokenResult<()> {
        if token.is_expired() {
            debug!("registration token already expired, skipping release");
            return Ok(());
        }
        let api = self.request("release_token")?.with_token(token.value());
        self.http.call(api).await?;
        debug!("registration token released");
        Ok(())
    }
}

impl TokenService for RegistrationClient {
    fn refresh_token<'a>(&'a self, token: &'a Token) -> BoxFuture<'a, TokenResult<Token>> {
        Box::pin(self.refresh_token_inner(token))
    }

    fn release_token<'a>(&'a self, token: &'a Token) -> BoxFuture<'a, TokenResult<()>> {
        Box::pin(self.release_token_inner(token))
    }
}

impl EventSource for RegistrationClient {
    fn open_events<'a>(
        &'a self,
        token: &'a Token,
        last_event_id: Option<&'a str>,
    ) -> BoxFuture<'a, HttpResult<Response>> {
        Box::pin(RegistrationClient::open_events(self, token, last_event_id))
    }

    fn alias(&self) -> &str {
        &self.alias
    }
}
