//! Conference and participant requests.

use std::time::Duration;

use pexconf_protocol::{AspectRatioFields, DtmfFields, MessageFields};
use reqwest::Response;
use tracing::{debug, instrument};

use crate::BoxFuture;
use crate::endpoint::NodeEndpoint;
use crate::error::{HttpError, HttpResult};
use crate::events::{EventSource, stream_request};
use crate::http::{ApiRequest, HttpClient};
use crate::token::Token;

/// Characters accepted by [`ParticipantClient::dtmf`].
pub const DTMF_DIGITS: &str = "0123456789*#ABCD";

/// Requests scoped to one conference on one node.
#[derive(Debug, Clone)]
pub struct ConferenceClient {
    http: HttpClient,
    node: NodeEndpoint,
    alias: String,
    timeout: Option<Duration>,
}

impl ConferenceClient {
    /// Creates a client for `alias` on `node`.
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

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn node(&self) -> &NodeEndpoint {
        &self.node
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// A POST to `conferences/{alias}/{action}`.
    pub(crate) fn request(&self, action: &str) -> HttpResult<ApiRequest> {
        let request = ApiRequest::post(self.node.conference_url(&self.alias, action)?)
            .with_resource("conference");
        Ok(match self.timeout {
            Some(timeout) => request.with_timeout(timeout),
            None => request,
        })
    }

    /// Opens the conference event stream.
    ///
    /// `last_event_id` is sent as `Last-Event-ID` so the node can resume
    /// after a reconnect.
    #[instrument(skip_all, fields(alias = %self.alias))]
    pub async fn open_events(
        &self,
        token: &Token,
        last_event_id: Option<&str>,
    ) -> HttpResult<Response> {
        let url = self.node.conference_url(&self.alias, "events")?;
        let request = stream_request(url, "conference", token, last_event_id);
        self.http.open_stream(request).await
    }

    /// Sends a plain-text chat message to the conference.
    #[instrument(skip_all, fields(alias = %self.alias))]
    pub async fn send_message(&self, token: &Token, text: &str) -> HttpResult<bool> {
        let request = self
            .request("message")?
            .with_token(token.value())
            .with_json(&MessageFields::text(text))?;
        self.http.json(request).await
    }

    /// Requests scoped to one participant.
    pub fn participant(&self, id: impl Into<String>) -> ParticipantClient {
        ParticipantClient {
            conference: self.clone(),
            id: id.into(),
        }
    }
}

impl EventSource for ConferenceClient {
    fn open_events<'a>(
        &'a self,
        token: &'a Token,
        last_event_id: Option<&'a str>,
    ) -> BoxFuture<'a, HttpResult<Response>> {
        Box::pin(ConferenceClient::open_events(self, token, last_event_id))
    }

    fn alias(&self) -> &str {
        &self.alias
    }
}

/// Requests scoped to one participant of a conference.
#[derive(Debug, Clone)]
pub struct ParticipantClient {
    conference: ConferenceClient,
    id: String,
}

impl ParticipantClient {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn request(&self, action: &str, token: &Token) -> HttpResult<ApiRequest> {
        let url = self
            .conference
            .node
            .participant_url(&self.conference.alias, &self.id, action)?;
        let request = ApiRequest::post(url)
            .with_resource("participant")
            .with_token(token.value());
        Ok(match self.conference.timeout {
            Some(timeout) => request.with_timeout(timeout),
            None => request,
        })
    }

    async fn flag(&self, action: &str, token: &Token) -> HttpResult<bool> {
        let result = self.conference.http.json(self.request(action, token)?).await?;
        debug!(participant = %self.id, action, result, "participant request");
        Ok(result)
    }

    async fn call(&self, action: &str, token: &Token) -> HttpResult<()> {
        self.conference.http.call(self.request(action, token)?).await?;
        debug!(participant = %self.id, action, "participant request");
        Ok(())
    }

    /// Mutes the participant's audio.
    pub async fn mute(&self, token: &Token) -> HttpResult<bool> {
        self.flag("mute", token).await
    }

    pub async fn unmute(&self, token: &Token) -> HttpResult<bool> {
        self.flag("unmute", token).await
    }

    /// Tells the node the participant stopped sending video.
    pub async fn mute_video(&self, token: &Token) -> HttpResult<bool> {
        self.flag("video_muted", token).await
    }

    pub async fn unmute_video(&self, token: &Token) -> HttpResult<bool> {
        self.flag("video_unmuted", token).await
    }

    /// Asks for the presentation floor.
    pub async fn take_floor(&self, token: &Token) -> HttpResult<()> {
        self.call("take_floor", token).await
    }

    pub async fn release_floor(&self, token: &Token) -> HttpResult<()> {
        self.call("release_floor", token).await
    }

    pub async fn show_live_captions(&self, token: &Token) -> HttpResult<()> {
        self.call("show_live_captions", token).await
    }

    pub async fn hide_live_captions(&self, token: &Token) -> HttpResult<()> {
        self.call("hide_live_captions", token).await
    }

    /// Sends DTMF digits, validated against [`DTMF_DIGITS`].
    pub async fn dtmf(&self, token: &Token, digits: &str) -> HttpResult<bool> {
        if digits.is_empty() || !digits.chars().all(|c| DTMF_DIGITS.contains(c)) {
            return Err(HttpError::InvalidRequest(format!(
                "invalid DTMF digits {digits:?}"
            )));
        }
        let request = self.request("dtmf", token)?.with_json(&DtmfFields {
            digits: digits.to_string(),
        })?;
        self.conference.http.json(request).await
    }

    /// Sets the preferred video aspect ratio, in `(0, 2]`.
    pub async fn preferred_aspect_ratio(&self, token: &Token, ratio: f32) -> HttpResult<bool> {
        if !(ratio > 0.0 && ratio <= 2.0) {
            return Err(HttpError::InvalidRequest(format!(
                "aspect ratio {ratio} out of range"
            )));
        }
        let request = self
            .request("preferred_aspect_ratio", token)?
            .with_json(&AspectRatioFields { aspect_ratio: ratio })?;
        self.conference.http.json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpConfig;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE: &str = "/api/client/v2/conferences/room";

    fn client(server: &MockServer) -> ConferenceClient {
        ConferenceClient::new(
            HttpClient::new(HttpConfig::default()).unwrap(),
            NodeEndpoint::parse(&server.uri()).unwrap(),
            "room",
        )
    }

    fn ok(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_json(serde_json::json!({"status": "success", "result": result}))
    }

    fn token() -> Token {
        Token::for_tests("t-1", Duration::from_secs(120))
    }

    #[tokio::test]
    async fn sends_chat_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/message")))
            .and(header("token", "t-1"))
            .and(body_json(serde_json::json!({"type": "text/plain", "payload": "hi"})))
            .respond_with(ok(serde_json::json!(true)))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server).send_message(&token(), "hi").await.unwrap());
    }

    #[tokio::test]
    async fn participant_requests() {
        let server = MockServer::start().await;
        for action in ["video_muted", "mute"] {
            Mock::given(method("POST"))
                .and(path(format!("{BASE}/participants/p-1/{action}")))
                .respond_with(ok(serde_json::json!(true)))
                .expect(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/participants/p-1/show_live_captions")))
            .respond_with(ok(serde_json::json!(null)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{BASE}/participants/p-1/dtmf")))
            .and(body_json(serde_json::json!({"digits": "12#"})))
            .respond_with(ok(serde_json::json!(true)))
            .expect(1)
            .mount(&server)
            .await;

        let participant = client(&server).participant("p-1");
        let token = token();
        assert!(participant.mute_video(&token).await.unwrap());
        assert!(participant.mute(&token).await.unwrap());
        participant.show_live_captions(&token).await.unwrap();
        assert!(participant.dtmf(&token, "12#").await.unwrap());
    }

    #[tokio::test]
    async fn rejects_invalid_input_locally() {
        let server = MockServer::start().await;
        let participant = client(&server).participant("p-1");
        let token = token();

        assert!(matches!(
            participant.dtmf(&token, "12x").await,
            Err(HttpError::InvalidRequest(_))
        ));
        assert!(matches!(
            participant.dtmf(&token, "").await,
            Err(HttpError::InvalidRequest(_))
        ));
        assert!(matches!(
            participant.preferred_aspect_ratio(&token, 0.0).await,
            Err(HttpError::InvalidRequest(_))
        ));
        assert!(matches!(
            participant.preferred_aspect_ratio(&token, 2.5).await,
            Err(HttpError::InvalidRequest(_))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn event_stream_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE}/events")))
            .and(header("token", "t-1"))
            .and(header("accept", "text/event-stream"))
            .and(header("last-event-id", "42"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string("event: presentation_stop\ndata: null\n\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server).open_events(&token(), Some("42")).await.unwrap();
        let body = response.text().await.unwrap();
        assert!(body.contains("presentation_stop"));
    }

    #[tokio::test]
    async fn event_stream_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(path(format!("{BASE}/events")))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let result = client(&server).open_events(&token(), None).await;
        assert!(matches!(result, Err(HttpError::Forbidden)));
    }
}
