//! Node availability checks.

use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::endpoint::NodeEndpoint;
use crate::error::{HttpError, NodeResult};
use crate::http::{ApiRequest, HttpClient};

/// Queries node-level endpoints.
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: HttpClient,
}

impl NodeClient {
    /// Creates a node client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Returns true if the node accepts calls, false if it is in maintenance.
    #[instrument(skip(self), fields(node = %node))]
    pub async fn status(&self, node: &NodeEndpoint) -> NodeResult<bool> {
        let request = ApiRequest::get(node.api_url("status")?).with_resource("node");
        let response = self.http.send(request).await?;

        let available = match response.status() {
            StatusCode::OK => true,
            StatusCode::SERVICE_UNAVAILABLE => false,
            StatusCode::NOT_FOUND => return Err(HttpError::ResourceNotFound("node".into()).into()),
            other => return Err(HttpError::UnacceptableStatusCode(other.as_u16()).into()),
        };
        debug!(available, "node status");
        Ok(available)
    }
}
