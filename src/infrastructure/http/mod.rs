//! `reqwest` adapters for the upstream services.

mod authentication;
mod instruments;
mod orders;

pub use authentication::HttpAuthenticationServer;
pub use instruments::HttpInstrumentStore;
pub use orders::HttpOrderAttachmentClient;

use crate::domain::ports::PortResult;
use crate::error::UpstreamError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

/// Base URL plus a shared connection pool.
#[derive(Clone)]
pub(crate) struct Upstream {
    base_url: String,
    http: reqwest::Client,
}

impl Upstream {
    pub(crate) fn new(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    ///
    /// Empty and dot segments are refused so caller-supplied ids cannot
    /// leave the resource they name.
    pub(crate) fn url(&self, segments: &[&str]) -> PortResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| UpstreamError::InvalidRequest(format!("{}: {e}", self.base_url)))?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                UpstreamError::InvalidRequest(format!("{} cannot carry a path", self.base_url))
            })?;
            path.pop_if_empty();
            for segment in segments {
                if matches!(*segment, "" | "." | "..") {
                    return Err(UpstreamError::InvalidRequest(format!(
                        "refusing path segment {segment:?}"
                    )));
                }
                path.push(segment);
            }
        }
        Ok(url)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) async fn post_json<B, T>(&self, segments: &[&str], body: &B) -> PortResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.http.post(self.url(segments)?).json(body).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Builds the pooled client shared by every adapter.
pub fn build_client() -> PortResult<reqwest::Client> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .build()
        .map_err(|e| UpstreamError::Transport(e.to_string()))
}

/// Returns the response on 2xx, otherwise an error carrying status and body.
pub(crate) async fn ensure_success(response: reqwest::Response) -> PortResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Status { status, body })
}
