//! Endpoints that serve a server-sent event stream.

use reqwest::Response;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use url::Url;

use crate::BoxFuture;
use crate::error::HttpResult;
use crate::http::ApiRequest;
use crate::token::Token;

/// Opens the event stream of a conference or a registration.
pub trait EventSource: Send + Sync {
    /// Opens the stream authenticated with `token`.
    ///
    /// `last_event_id` is sent as `Last-Event-ID` so the node can resume
    /// after a reconnect.
    fn open_events<'a>(
        &'a self,
        token: &'a Token,
        last_event_id: Option<&'a str>,
    ) -> BoxFuture<'a, HttpResult<Response>>;

    /// Alias the stream belongs to, for logs.
    fn alias(&self) -> &str;
}

/// A GET for an event stream at `url`.
pub(crate) fn stream_request(
    url: Url,
    resource: &str,
    token: &Token,
    last_event_id: Option<&str>,
) -> ApiRequest {
    let request = ApiRequest::get(url)
        .with_resource(resource)
        .with_token(token.value())
        .with_header(ACCEPT.as_str(), "text/event-stream")
        .with_header(CACHE_CONTROL.as_str(), "no-cache");
    match last_event_id {
        Some(id) => request.with_header("Last-Event-ID", id),
        None => request,
    }
}
