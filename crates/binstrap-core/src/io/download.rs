//! Artifact download.
//!
//! Resolves the versioned download URL and performs the HTTP GET. The body
//! is handed onward as a live byte stream; writing it anywhere is the
//! extractor's job, so peak memory stays independent of archive size.

use std::io;

use futures::TryStreamExt;
use reqwest::{Client, Response};
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

/// Failures while fetching a release asset.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{status} from {url}")]
    Status {
        /// Status line text, e.g. `404 Not Found`.
        status: String,
        /// URL that was requested.
        url: String,
    },
}

/// Download URL for a release asset: `<base>/v<version>/<asset>`.
pub fn asset_url(base: &str, version: &str, asset: &str) -> String {
    format!("{}/v{version}/{asset}", base.trim_end_matches('/'))
}

/// Issue the GET and return the live response.
///
/// A non-success status is fatal for this attempt; the caller retries only
/// by re-running the whole readiness operation.
pub async fn start_download(client: &Client, url: &str) -> Result<Response, DownloadError> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            status: response.status().to_string(),
            url: url.to_string(),
        });
    }

    Ok(response)
}

/// Adapt a response body into an `AsyncRead` for the extractor.
pub fn stream_reader(response: Response) -> impl AsyncRead + Send + Unpin {
    StreamReader::new(Box::pin(
        response.bytes_stream().map_err(io::Error::other),
    ))
}
