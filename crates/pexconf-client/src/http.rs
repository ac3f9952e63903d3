//! HTTP conventions shared by every conference API call.
//!
//! All calls go through [`HttpClient`], which attaches the identifying
//! `User-Agent`, applies the per-request timeout and classifies responses:
//!
//! | Status | Outcome |
//! |--------|---------|
//! | 200 | body decoded as `Envelope<T>` |
//! | 401 | [`HttpError::Unauthorized`] |
//! | 403 | challenge body decoded as `Envelope<C>`, or [`HttpError::Forbidden`] |
//! | 404 | [`HttpError::ResourceNotFound`] |
//! | other | [`HttpError::UnacceptableStatusCode`] |

use std::fmt;
use std::time::Duration;

use base64::Engine;
use pexconf_protocol::Envelope;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, trace};
use url::Url;

use crate::error::{HttpError, HttpResult};

/// Configuration for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Value of the `User-Agent` header sent on every request.
    pub user_agent: String,

    /// Default timeout for a whole request/response exchange.
    pub request_timeout: Duration,

    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
}

impl HttpConfig {
    /// Default request timeout in seconds.
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Default connect timeout in seconds.
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the default request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("pexconf/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(Self::DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(Self::DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Timeout policy of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestTimeout {
    Default,
    Fixed(Duration),
    /// Long-lived responses such as the event stream.
    Unbounded,
}

/// A request against the conference API.
#[derive(Clone)]
pub struct ApiRequest {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    resource: String,
    timeout: RequestTimeout,
}

impl ApiRequest {
    /// Creates a request for `url`.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            resource: "resource".to_string(),
            timeout: RequestTimeout::Default,
        }
    }

    /// Creates a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a POST request.
    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Authenticates the request with a conference token.
    #[must_use]
    pub fn with_token(self, token: &str) -> Self {
        self.with_header("token", token)
    }

    /// Authenticates the request with HTTP Basic credentials.
    #[must_use]
    pub fn with_basic_auth(self, username: &str, password: &str) -> Self {
        self.with_header(AUTHORIZATION.as_str(), basic_auth(username, password))
    }

    /// Serializes `body` as the JSON request body.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> HttpResult<Self> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| HttpError::InvalidRequest(format!("failed to encode body: {e}")))?;
        self.body = Some(bytes);
        Ok(self)
    }

    /// Names the resource reported by a 404.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = RequestTimeout::Fixed(timeout);
        self
    }

    /// Disables the request timeout, for streaming responses.
    #[must_use]
    pub fn without_timeout(mut self) -> Self {
        self.timeout = RequestTimeout::Unbounded;
        self
    }

    /// The request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The resource name reported by a 404.
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &header_names)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

/// Outcome of an endpoint that answers 403 with a structured challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T, C> {
    /// 200 with the decoded `result`.
    Success(T),
    /// 403 with the decoded challenge `result`.
    Challenge(C),
}

/// HTTP client for the conference API.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
}

impl HttpClient {
    /// Creates a client with the given configuration.
    pub fn new(config: HttpConfig) -> HttpResult<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| HttpError::transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Sends a request without looking at the response status.
    pub async fn send(&self, request: ApiRequest) -> HttpResult<Response> {
        let ApiRequest {
            method,
            url,
            headers,
            body,
            timeout,
            ..
        } = request;

        trace!(method = %method, url = %url, "sending request");

        let mut builder = self.client.request(method, url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }
        builder = match timeout {
            RequestTimeout::Default => builder.timeout(self.config.request_timeout),
            RequestTimeout::Fixed(duration) => builder.timeout(duration),
            RequestTimeout::Unbounded => builder,
        };

        Ok(builder.send().await?)
    }

    /// Sends a request whose 403 carries a challenge of type `C`.
    ///
    /// Returns the decoded reply together with the status code it came with.
    pub async fn execute<T, C>(&self, request: ApiRequest) -> HttpResult<(Reply<T, C>, StatusCode)>
    where
        T: DeserializeOwned,
        C: DeserializeOwned,
    {
        let resource = request.resource.clone();
        let request = request.with_header(ACCEPT.as_str(), "application/json");
        let response = self.send(request).await?;
        let status = response.status();
        debug!(status = %status, resource = %resource, "received response");

        if status == StatusCode::FORBIDDEN {
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::ChallengeDecodeFailed(e.to_string()))?;
            let envelope: Envelope<C> = serde_json::from_str(&body)
                .map_err(|e| HttpError::ChallengeDecodeFailed(e.to_string()))?;
            return Ok((Reply::Challenge(envelope.result), status));
        }

        let response = check_status(response, &resource)?;
        let body = response.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(HttpError::decoding)?;
        Ok((Reply::Success(envelope.result), status))
    }

    /// Sends a request and decodes the `result` of a successful envelope.
    ///
    /// A 403 maps to [`HttpError::Forbidden`].
    pub async fn json<T: DeserializeOwned>(&self, request: ApiRequest) -> HttpResult<T> {
        let resource = request.resource.clone();
        let request = request.with_header(ACCEPT.as_str(), "application/json");
        let response = check_status(self.send(request).await?, &resource)?;
        let body = response.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(HttpError::decoding)?;
        Ok(envelope.result)
    }

    /// Sends a request whose result is irrelevant beyond success.
    pub async fn call(&self, request: ApiRequest) -> HttpResult<()> {
        self.json::<IgnoredAny>(request).await.map(|_| ())
    }

    /// Opens a streaming response, classifying the status first.
    pub async fn open_stream(&self, request: ApiRequest) -> HttpResult<Response> {
        let resource = request.resource.clone();
        let response = self.send(request.without_timeout()).await?;
        debug!(status = %response.status(), resource = %resource, "stream response");
        check_status(response, &resource)
    }
}

/// Generates a Basic authentication header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{username}:{password}");
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    format!("Basic {encoded}")
}

/// Maps every non-200 status to its error.
fn check_status(response: Response, resource: &str) -> HttpResult<Response> {
    match response.status() {
        StatusCode::OK => Ok(response),
        StatusCode::UNAUTHORIZED => Err(HttpError::Unauthorized),
        StatusCode::FORBIDDEN => Err(HttpError::Forbidden),
        StatusCode::NOT_FOUND => Err(HttpError::ResourceNotFound(resource.to_string())),
        other => Err(HttpError::UnacceptableStatusCode(other.as_u16())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Challenge {
        reason: String,
    }

    fn client() -> HttpClient {
        HttpClient::new(HttpConfig::default().with_user_agent("pexconf-test/1.0")).unwrap()
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn basic_auth_header() {
        assert_eq!(basic_auth("alice", "secret"), "Basic YWxpY2U6c2VjcmV0");
        let request = ApiRequest::post(Url::parse("https://node/").unwrap())
            .with_basic_auth("alice", "secret");
        assert!(!format!("{request:?}").contains("YWxpY2U6c2VjcmV0"));
    }

    #[test]
    fn debug_hides_header_values() {
        let request = ApiRequest::get(Url::parse("https://example.com/x").unwrap())
            .with_token("secret-token");
        let debug = format!("{request:?}");
        assert!(debug.contains("token"));
        assert!(!debug.contains("secret-token"));
    }

    #[tokio::test]
    async fn decodes_success_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("user-agent", "pexconf-test/1.0"))
            .and(header("token", "t-1"))
            .and(body_json(serde_json::json!({"value": 1})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "success", "result": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = ApiRequest::post(url(&server, "/echo"))
            .with_token("t-1")
            .with_json(&serde_json::json!({"value": 1}))
            .unwrap();
        assert!(client().json::<bool>(request).await.unwrap());
    }

    #[tokio::test]
    async fn classifies_status_codes() {
        let server = MockServer::start().await;
        for (p, status) in [("/401", 401), ("/403", 403), ("/404", 404), ("/502", 502)] {
            Mock::given(path(p))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;
        }

        let client = client();
        let get = |p: &str| ApiRequest::get(url(&server, p)).with_resource("conference");
        assert_eq!(
            client.json::<bool>(get("/401")).await,
            Err(HttpError::Unauthorized)
        );
        assert_eq!(client.json::<bool>(get("/403")).await, Err(HttpError::Forbidden));
        assert_eq!(
            client.json::<bool>(get("/404")).await,
            Err(HttpError::ResourceNotFound("conference".into()))
        );
        assert_eq!(
            client.json::<bool>(get("/502")).await,
            Err(HttpError::UnacceptableStatusCode(502))
        );
    }

    #[tokio::test]
    async fn success_with_wrong_body_is_decoding_failure() {
        let server = MockServer::start().await;
        Mock::given(path("/bad"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client().json::<bool>(ApiRequest::get(url(&server, "/bad"))).await;
        assert!(matches!(result, Err(HttpError::DecodingFailed(_))));
    }

    #[tokio::test]
    async fn forbidden_decodes_challenge() {
        let server = MockServer::start().await;
        Mock::given(path("/challenge"))
            .respond_with(ResponseTemplate::new(403).set_body_json(
                serde_json::json!({"status": "success", "result": {"reason": "pin"}}),
            ))
            .mount(&server)
            .await;
        Mock::given(path("/garbled"))
            .respond_with(ResponseTemplate::new(403).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client();
        let (reply, status) = client
            .execute::<bool, Challenge>(ApiRequest::get(url(&server, "/challenge")))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            reply,
            Reply::Challenge(Challenge {
                reason: "pin".into()
            })
        );

        let garbled = client
            .execute::<bool, Challenge>(ApiRequest::get(url(&server, "/garbled")))
            .await;
        assert!(matches!(garbled, Err(HttpError::ChallengeDecodeFailed(_))));
    }

    #[tokio::test]
    async fn per_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "success", "result": true}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let request =
            ApiRequest::get(url(&server, "/slow")).with_timeout(Duration::from_millis(50));
        assert_eq!(client().json::<bool>(request).await, Err(HttpError::Timeout));
    }

    #[tokio::test]
    async fn transport_failure() {
        let request = ApiRequest::get(Url::parse("http://127.0.0.1:9/unreachable").unwrap());
        let result = client().json::<bool>(request).await;
        assert!(matches!(
            result,
            Err(HttpError::Transport(_)) | Err(HttpError::Timeout)
        ));
    }
}
