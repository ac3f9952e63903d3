//! Node endpoints and API URL construction.

use std::fmt;

use pexconf_protocol::API_PATH;
use url::Url;

use crate::error::{HttpError, HttpResult, NodeError, NodeResult};

/// Base URL of a conferencing node.
///
/// Always absolute http(s) with a path ending in `/`, so API paths can be
/// joined onto it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeEndpoint {
    url: Url,
}

impl NodeEndpoint {
    /// Parses a node base URL such as `https://px01.vc.example.com`.
    pub fn parse(value: &str) -> NodeResult<Self> {
        let url = Url::parse(value).map_err(|_| NodeError::InvalidAddress(value.to_string()))?;
        Self::from_url(url)
    }

    /// Wraps an already parsed URL.
    pub fn from_url(mut url: Url) -> NodeResult<Self> {
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(NodeError::InvalidAddress(url.to_string()));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self { url })
    }

    /// The node base URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Builds `{node}/api/client/v2/{path}`.
    pub fn api_url(&self, path: &str) -> HttpResult<Url> {
        self.url
            .join(&format!("{API_PATH}/{path}"))
            .map_err(|e| HttpError::InvalidRequest(format!("invalid API path {path:?}: {e}")))
    }

    /// Builds `{node}/api/client/v2/conferences/{alias}/{action}`.
    pub fn conference_url(&self, alias: &str, action: &str) -> HttpResult<Url> {
        self.api_url(&format!(
            "conferences/{}/{}",
            urlencoding::encode(alias),
            action
        ))
    }

    /// Builds `{node}/api/client/v2/registrations/{alias}/{action}`.
    pub fn registration_url(&self, alias: &str, action: &str) -> HttpResult<Url> {
        self.api_url(&format!(
            "registrations/{}/{}",
            urlencoding::encode(alias),
            action
        ))
    }

    /// Builds `{node}/api/client/v2/conferences/{alias}/participants/{id}/{action}`.
    pub fn participant_url(&self, alias: &str, participant: &str, action: &str) -> HttpResult<Url> {
        self.conference_url(
            alias,
            &format!("participants/{}/{}", urlencoding::encode(participant), action),
        )
    }
}

impl fmt::Display for NodeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str().trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trailing_slash() {
        let node = NodeEndpoint::parse("https://px01.vc.example.com").unwrap();
        assert_eq!(node.url().as_str(), "https://px01.vc.example.com/");
        assert_eq!(node.to_string(), "https://px01.vc.example.com");

        let prefixed = NodeEndpoint::parse("https://example.com/pexip?x=1").unwrap();
        assert_eq!(prefixed.url().as_str(), "https://example.com/pexip/");
    }

    #[test]
    fn rejects_non_http() {
        assert!(NodeEndpoint::parse("ftp://example.com").is_err());
        assert!(NodeEndpoint::parse("not a url").is_err());
    }

    #[test]
    fn builds_api_urls() {
        let node = NodeEndpoint::parse("https://px01.vc.example.com").unwrap();
        assert_eq!(
            node.api_url("status").unwrap().as_str(),
            "https://px01.vc.example.com/api/client/v2/status"
        );
        assert_eq!(
            node.conference_url("meet alice", "request_token").unwrap().as_str(),
            "https://px01.vc.example.com/api/client/v2/conferences/meet%20alice/request_token"
        );
        assert_eq!(
            node.participant_url("room", "p-1", "video_muted").unwrap().as_str(),
            "https://px01.vc.example.com/api/client/v2/conferences/room/participants/p-1/video_muted"
        );
        assert_eq!(
            node.registration_url("alice@example.com", "events").unwrap().as_str(),
            "https://px01.vc.example.com/api/client/v2/registrations/alice%40example.com/events"
        );
    }
}
