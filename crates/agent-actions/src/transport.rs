//! Outbound HTTP for actions.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Response, StatusCode};
use tracing::debug;
use url::Url;

use crate::action::HttpMethod;
use crate::error::ActionError;
use crate::ssrf::check_public_endpoint;

/// Maximum response body kept for success-message rendering (256KB).
const MAX_RESPONSE_BYTES: usize = 256 * 1024;

/// Redirects followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// A fully rendered outbound request.
#[derive(Clone)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl OutboundRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

// Header values and bodies carry resolved secrets.
impl fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<_> = self.headers.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("OutboundRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &header_names)
            .field("body_len", &self.body.as_ref().map(String::len))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Status and body of an outbound response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundResponse {
    pub status: u16,
    pub body: String,
}

impl OutboundResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends rendered action requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request. Non-2xx statuses are returned, not raised.
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, ActionError>;
}

/// [`HttpTransport`] backed by reqwest.
///
/// Redirects are followed here rather than by reqwest, so every hop passes
/// the private-endpoint check.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    allow_private_endpoints: bool,
}

impl ReqwestTransport {
    /// Create a transport that refuses private and internal endpoints.
    pub fn new() -> Result<Self, ActionError> {
        let client = Client::builder()
            .user_agent(concat!("chat-orchestrator/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::none())
            .build()?;
        Ok(Self {
            client,
            allow_private_endpoints: false,
        })
    }

    /// Permit endpoints on private networks (local development).
    pub fn allow_private_endpoints(mut self, allow: bool) -> Self {
        self.allow_private_endpoints = allow;
        self
    }

    async fn checked_url(&self, url: &str) -> Result<Url, ActionError> {
        if self.allow_private_endpoints {
            Url::parse(url).map_err(|e| ActionError::BlockedEndpoint(format!("invalid URL: {}", e)))
        } else {
            check_public_endpoint(url).await
        }
    }

    /// The checked request following `hop`, or `None` when `status` is final.
    async fn next_hop(
        &self,
        hop: &Hop,
        status: StatusCode,
        location: Option<&str>,
    ) -> Result<Option<Hop>, ActionError> {
        let Some(mut next) = hop.redirected(status, location)? else {
            return Ok(None);
        };
        next.url = self.checked_url(next.url.as_str()).await?;
        Ok(Some(next))
    }
}

/// One request in a redirect chain.
struct Hop {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl Hop {
    /// Apply a redirect answer, `None` unless `status` is 301, 302, 303, 307 or 308.
    fn redirected(&self, status: StatusCode, location: Option<&str>) -> Result<Option<Hop>, ActionError> {
        let rewrites_to_get = match status {
            StatusCode::SEE_OTHER => self.method != Method::HEAD,
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => self.method == Method::POST,
            StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT => false,
            _ => return Ok(None),
        };

        let location = location.ok_or_else(|| {
            ActionError::Redirect(format!("status {} without Location", status.as_u16()))
        })?;
        let url = self
            .url
            .join(location)
            .map_err(|e| ActionError::Redirect(format!("invalid Location '{}': {}", location, e)))?;

        // Template headers may hold secrets under any name.
        let mut headers = if url.origin() == self.url.origin() {
            self.headers.clone()
        } else {
            Vec::new()
        };
        let (method, body) = if rewrites_to_get {
            headers.retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));
            (Method::GET, None)
        } else {
            (self.method.clone(), self.body.clone())
        };

        Ok(Some(Hop {
            method,
            url,
            headers,
            body,
        }))
    }
}

/// Read at most `limit` bytes of body, abandoning the rest.
async fn read_limited(mut response: Response, limit: usize) -> Result<String, ActionError> {
    let mut kept = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit - kept.len();
        if chunk.len() >= room {
            kept.extend_from_slice(&chunk[..room]);
            break;
        }
        kept.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&kept).into_owned())
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, ActionError> {
        let url = self.checked_url(&request.url).await?;
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Patch => Method::PATCH,
        };
        let mut hop = Hop {
            method,
            url,
            headers: request.headers,
            body: request.body,
        };

        let mut redirects = 0;
        loop {
            let mut builder = self
                .client
                .request(hop.method.clone(), hop.url.clone())
                .timeout(request.timeout);
            for (name, value) in &hop.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &hop.body {
                builder = builder.body(body.clone());
            }

            let response = builder.send().await?;
            let status = response.status();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);

            match self.next_hop(&hop, status, location.as_deref()).await? {
                Some(next) => {
                    redirects += 1;
                    if redirects > MAX_REDIRECTS {
                        return Err(ActionError::Redirect(format!(
                            "more than {} redirects",
                            MAX_REDIRECTS
                        )));
                    }
                    debug!("Action endpoint {} redirected to {}", hop.url, next.url);
                    hop = next;
                }
                None => {
                    let body = read_limited(response, MAX_RESPONSE_BYTES).await?;
                    debug!(
                        "Action endpoint {} answered {} ({} bytes kept)",
                        hop.url,
                        status.as_u16(),
                        body.len()
                    );
                    return Ok(OutboundResponse {
                        status: status.as_u16(),
                        body,
                    });
                }
            }
        }
    }
}
