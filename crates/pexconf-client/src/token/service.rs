//! Token request, refresh and release.

use std::fmt;
use std::time::Duration;

use pexconf_protocol::{RefreshPayload, TokenChallenge, TokenErrorBody, TokenPayload, TokenRequestFields};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{Token, TokenError, TokenResult};
use crate::BoxFuture;
use crate::conference::ConferenceClient;
use crate::http::Reply;

/// Refreshes and releases tokens once they are issued.
///
/// How a token is first obtained differs per service; see
/// [`ConferenceClient::request_token`] and
/// [`RegistrationClient::request_token`](crate::RegistrationClient::request_token).
pub trait TokenService: Send + Sync {
    /// Exchanges a token for a fresh one.
    fn refresh_token<'a>(&'a self, token: &'a Token) -> BoxFuture<'a, TokenResult<Token>>;

    /// Gives a token back to the node, ending the session it belongs to.
    fn release_token<'a>(&'a self, token: &'a Token) -> BoxFuture<'a, TokenResult<()>>;
}

/// What the caller supplies to obtain a token.
#[derive(Clone, Default)]
pub struct TokenRequest {
    pub display_name: String,
    /// PIN, if the user entered one. An empty PIN is sent as `none`.
    pub pin: Option<String>,
    pub conference_extension: Option<String>,
    /// UUID of the chosen identity provider.
    pub chosen_idp: Option<String>,
    pub sso_token: Option<String>,
    pub direct_media: bool,
}

impl TokenRequest {
    /// Creates a request for the given display name.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(pin.into());
        self
    }

    #[must_use]
    pub fn with_conference_extension(mut self, extension: impl Into<String>) -> Self {
        self.conference_extension = Some(extension.into());
        self
    }

    #[must_use]
    pub fn with_identity_provider(mut self, uuid: impl Into<String>) -> Self {
        self.chosen_idp = Some(uuid.into());
        self
    }

    #[must_use]
    pub fn with_sso_token(mut self, sso_token: impl Into<String>) -> Self {
        self.sso_token = Some(sso_token.into());
        self
    }

    #[must_use]
    pub fn with_direct_media(mut self, direct_media: bool) -> Self {
        self.direct_media = direct_media;
        self
    }

    /// The `pin` header value, if any.
    fn pin_header(&self) -> Option<&str> {
        self.pin
            .as_deref()
            .map(|pin| if pin.is_empty() { "none" } else { pin })
    }

    fn fields(&self) -> TokenRequestFields {
        TokenRequestFields {
            display_name: self.display_name.clone(),
            conference_extension: self.conference_extension.clone(),
            chosen_idp: self.chosen_idp.clone(),
            sso_token: self.sso_token.clone(),
            direct_media: self.direct_media,
        }
    }
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("display_name", &self.display_name)
            .field("pin", &self.pin.as_ref().map(|_| "[REDACTED]"))
            .field("conference_extension", &self.conference_extension)
            .field("chosen_idp", &self.chosen_idp)
            .field("sso_token", &self.sso_token.as_ref().map(|_| "[REDACTED]"))
            .field("direct_media", &self.direct_media)
            .finish()
    }
}

/// The `result` of a 403 from `request_token`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChallengeBody {
    Challenge(TokenErrorBody),
    /// Plain text such as `"Invalid PIN"`.
    Message(String),
}

fn challenge_error(body: ChallengeBody, pin_supplied: bool) -> TokenError {
    let body = match body {
        ChallengeBody::Challenge(body) => body,
        ChallengeBody::Message(_) if pin_supplied => return TokenError::InvalidPin,
        ChallengeBody::Message(message) => return TokenError::TokenDecodingFailed(message),
    };

    match body.challenge() {
        Some(TokenChallenge::Pin { .. }) if pin_supplied => TokenError::InvalidPin,
        Some(TokenChallenge::Pin { guest_pin }) => TokenError::PinRequired { guest_pin },
        Some(TokenChallenge::ConferenceExtension(kind)) => {
            TokenError::ConferenceExtensionRequired(kind)
        }
        Some(TokenChallenge::IdentityProviders(idps)) => {
            TokenError::SsoIdentityProviderRequired(idps)
        }
        Some(TokenChallenge::Redirect { idp, url }) => {
            TokenError::SsoIdentityProviderRedirect { idp, url }
        }
        None => TokenError::TokenDecodingFailed("403 without a known challenge".to_string()),
    }
}

impl ConferenceClient {
    /// Requests a new token for the conference.
    #[instrument(skip_all, fields(alias = %self.alias(), display_name = %request.display_name))]
    pub async fn request_token(&self, request: TokenRequest) -> TokenResult<Token> {
        let mut api = self
            .request("request_token")?
            .with_json(&request.fields())?;
        if let Some(pin) = request.pin_header() {
            api = api.with_header("pin", pin);
        }

        let (reply, status) = self
            .http()
            .execute::<TokenPayload, ChallengeBody>(api)
            .await?;

        match reply {
            Reply::Success(payload) => {
                let token = Token::from_payload(payload);
                info!(participant = %token.participant_uuid, role = ?token.role, "token granted");
                Ok(token)
            }
            Reply::Challenge(body) => {
                let error = challenge_error(body, request.pin.is_some());
                debug!(status = %status, error = %error, "token request challenged");
                Err(error)
            }
        }
    }

    #[instrument(skip_all, fields(alias = %self.alias()))]
    async fn refresh_token_inner(&self, token: &Token) -> TokenResult<Token> {
        let api = self.request("refresh_token")?.with_token(token.value());
        let payload: RefreshPayload = self.http().json(api).await?;
        debug!(expires = payload.expires, "token refreshed");
        Ok(token.updating(payload.token, Duration::from_secs(payload.expires)))
    }

    #[instrument(skip_all, fields(alias = %self.alias()))]
    async fn release_token_inner(&self, token: &Token) -> TokenResult<()> {
        if token.is_expired() {
            debug!("token already expired, skipping release");
            return Ok(());
        }
        let api = self.request("release_token")?.with_token(token.value());
        self.http().call(api).await?;
        debug!("token released");
        Ok(())
    }
}

impl TokenService for ConferenceClient {
    fn refresh_token<'a>(&'a self, token: &'a Token) -> BoxFuture<'a, TokenResult<Token>> {
        Box::pin(self.refresh_token_inner(token))
    }

    fn release_token<'a>(&'a self, token: &'a Token) -> BoxFuture<'a, TokenResult<()>> {
        Box::pin(self.release_token_inner(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::NodeEndpoint;
    use crate::http::{HttpClient, HttpConfig};
    use crate::node::{FakeDns, NodeResolver, encode_srv};
    use pexconf_core::ConferenceAddress;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN_PATH: &str = "/api/client/v2/conferences/room/request_token";

    fn client(server: &MockServer) -> ConferenceClient {
        ConferenceClient::new(
            HttpClient::new(HttpConfig::default()).unwrap(),
            NodeEndpoint::parse(&server.uri()).unwrap(),
            "room",
        )
    }

    fn granted() -> serde_json::Value {
        serde_json::json!({
            "status": "success",
            "result": {
                "token": "t-1",
                "expires": "120",
                "participant_uuid": "p-1",
                "display_name": "Alice",
                "role": "GUEST",
                "chat_enabled": true
            }
        })
    }

    async fn challenge(server: &MockServer, result: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({"status": "success", "result": result})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn request_token_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(header("pin", "1234"))
            .and(body_json(serde_json::json!({"display_name": "Alice", "direct_media": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(granted()))
            .expect(1)
            .mount(&server)
            .await;

        let token = client(&server)
            .request_token(TokenRequest::new("Alice").with_pin("1234"))
            .await
            .unwrap();
        assert_eq!(token.value(), "t-1");
        assert_eq!(token.participant_uuid, "p-1");
        assert_eq!(token.expires(), Duration::from_secs(120));
        assert!(token.chat_enabled);
    }

    #[tokio::test]
    async fn empty_pin_is_sent_as_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(header("pin", "none"))
            .respond_with(ResponseTemplate::new(200).set_body_json(granted()))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .request_token(TokenRequest::new("Alice").with_pin(""))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pin_required_without_pin() {
        let server = MockServer::start().await;
        challenge(&server, serde_json::json!({"pin": "required", "guest_pin": "required"})).await;

        let result = client(&server).request_token(TokenRequest::new("Bob")).await;
        assert_eq!(result, Err(TokenError::PinRequired { guest_pin: true }));
    }

    #[tokio::test]
    async fn pin_required_with_pin_is_invalid_pin() {
        let server = MockServer::start().await;
        challenge(&server, serde_json::json!({"pin": "required", "guest_pin": "none"})).await;

        let result = client(&server)
            .request_token(TokenRequest::new("Bob").with_pin("0000"))
            .await;
        assert_eq!(result, Err(TokenError::InvalidPin));
    }

    #[tokio::test]
    async fn plain_text_rejection_with_pin_is_invalid_pin() {
        let server = MockServer::start().await;
        challenge(&server, serde_json::json!("Invalid PIN")).await;

        let result = client(&server)
            .request_token(TokenRequest::new("Bob").with_pin("0000"))
            .await;
        assert_eq!(result, Err(TokenError::InvalidPin));
    }

    #[tokio::test]
    async fn sso_and_extension_challenges() {
        let server = MockServer::start().await;
        challenge(&server, serde_json::json!({"conference_extension": "standard"})).await;
        let result = client(&server).request_token(TokenRequest::new("Bob")).await;
        assert_eq!(
            result,
            Err(TokenError::ConferenceExtensionRequired("standard".into()))
        );

        let server = MockServer::start().await;
        challenge(&server, serde_json::json!({"idp": [{"name": "Okta", "uuid": "i-1"}]})).await;
        let result = client(&server).request_token(TokenRequest::new("Bob")).await;
        assert!(matches!(
            result,
            Err(TokenError::SsoIdentityProviderRequired(idps)) if idps[0].uuid == "i-1"
        ));
    }

    #[tokio::test]
    async fn undecodable_challenge_is_decoding_failure() {
        let server = MockServer::start().await;
        Mock::given(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("<html>denied</html>"))
            .mount(&server)
            .await;

        let result = client(&server).request_token(TokenRequest::new("Bob")).await;
        assert!(matches!(result, Err(TokenError::TokenDecodingFailed(_))));
    }

    #[tokio::test]
    async fn status_mapping() {
        for (status, expected) in [
            (401, TokenError::AuthenticationFailed),
            (404, TokenError::ConferenceNotFound),
            (500, TokenError::status(500)),
        ] {
            let server = MockServer::start().await;
            Mock::given(path(TOKEN_PATH))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;
            let result = client(&server).request_token(TokenRequest::new("Bob")).await;
            assert_eq!(result, Err(expected));
        }
    }

    #[tokio::test]
    async fn refresh_and_release() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/client/v2/conferences/room/refresh_token"))
            .and(header("token", "old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"status": "success", "result": {"token": "new", "expires": "240"}}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/client/v2/conferences/room/release_token"))
            .and(header_exists("token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "success", "result": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let token = Token::for_tests("old", Duration::from_secs(120));
        let refreshed = client.refresh_token(&token).await.unwrap();
        assert_eq!(refreshed.value(), "new");
        assert_eq!(refreshed.expires(), Duration::from_secs(240));
        assert_eq!(refreshed.participant_uuid, token.participant_uuid);

        client.release_token(&refreshed).await.unwrap();
    }

    #[tokio::test]
    async fn refresh_rejected() {
        let server = MockServer::start().await;
        Mock::given(path("/api/client/v2/conferences/room/refresh_token"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let token = Token::for_tests("old", Duration::from_secs(120));
        let result = client(&server).refresh_token(&token).await;
        assert_eq!(result, Err(TokenError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn release_skips_expired_token() {
        let server = MockServer::start().await;
        Mock::given(path("/api/client/v2/conferences/room/release_token"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let token = Token::for_tests("old", Duration::ZERO);
        client(&server).release_token(&token).await.unwrap();
    }

    #[tokio::test]
    async fn resolve_then_pin_challenge() {
        let address: ConferenceAddress = "room@example.com".parse().unwrap();
        let dns = FakeDns::default().with_srv(
            "_pexapp._tcp.example.com",
            vec![encode_srv(10, 10, 443, "px01.vc.example.com")],
        );
        let endpoints = NodeResolver::new(Arc::new(dns))
            .resolve(address.host())
            .await
            .unwrap();
        assert_eq!(endpoints[0].to_string(), "https://px01.vc.example.com");

        // The node itself is served locally.
        let server = MockServer::start().await;
        challenge(&server, serde_json::json!({"pin": "required", "guest_pin": "none"})).await;
        let client = ConferenceClient::new(
            HttpClient::new(HttpConfig::default()).unwrap(),
            NodeEndpoint::parse(&server.uri()).unwrap(),
            address.alias(),
        );
        let result = client.request_token(TokenRequest::new("Guest")).await;
        assert_eq!(result, Err(TokenError::PinRequired { guest_pin: false }));
    }
}
