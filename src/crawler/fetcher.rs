//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - GET requests carrying the parent page as referer
//! - Cancellation of in-flight requests and body transfers
//! - Error classification (transport failure vs. non-success status)
//!
//! The client carries no overall deadline. The request phase is bounded by
//! the configured timeout, and a body transfer only fails once no data has
//! arrived for that long, so large resources can take as long as they need.

use crate::config::CrawlerConfig;
use crate::state::PageInfo;
use crate::{SinkError, WebdlError};
use reqwest::header::REFERER;
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration (user agent)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// A successful response whose body has not been read yet
///
/// Reads observe the cancellation token of the run that issued the request,
/// so a transfer stops as soon as the run is cancelled. Each read waits at
/// most `idle` for the next chunk.
#[derive(Debug)]
pub struct Body {
    url: String,
    response: Response,
    idle: Duration,
    cancel: CancellationToken,
}

impl Body {
    /// Streams the remaining body into `writer`, returning the byte count
    ///
    /// Fails with [`SinkError::Stalled`] when no chunk arrives within the
    /// idle timeout; a transfer that keeps delivering data never times out.
    pub async fn copy_to<W>(&mut self, writer: &mut W) -> Result<u64, SinkError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let idle = self.idle;
        let mut written = 0u64;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(SinkError::Cancelled),
                chunk = tokio::time::timeout(idle, self.response.chunk()) => match chunk {
                    Ok(chunk) => chunk?,
                    Err(_) => return Err(SinkError::Stalled(idle)),
                },
            };

            match chunk {
                Some(bytes) => {
                    writer.write_all(&bytes).await?;
                    written += bytes.len() as u64;
                }
                None => break,
            }
        }
        writer.flush().await?;
        Ok(written)
    }

    /// Reads the whole body into memory
    pub async fn into_bytes(mut self) -> Result<Vec<u8>, SinkError> {
        let mut buf = Vec::new();
        self.copy_to(&mut buf).await?;
        Ok(buf)
    }

    /// Reads the whole body as UTF-8 text, replacing invalid sequences
    pub async fn text(mut self) -> Result<String, WebdlError> {
        let mut buf = Vec::new();
        match self.copy_to(&mut buf).await {
            Ok(_) => Ok(String::from_utf8_lossy(&buf).into_owned()),
            Err(SinkError::Cancelled) => Err(WebdlError::Cancelled),
            Err(SinkError::Body(source)) => Err(WebdlError::Http {
                url: self.url,
                source,
            }),
            Err(SinkError::Stalled(after)) => Err(WebdlError::Timeout {
                url: self.url,
                after,
            }),
            Err(source) => Err(WebdlError::Sink {
                url: self.url,
                source,
            }),
        }
    }
}

/// Issues a GET for `info.url`
///
/// When the entry was discovered on another page, that page's URL is sent as
/// the `Referer` header. The request is abandoned as soon as `cancel` fires.
/// `timeout` bounds the wait for the response headers and, per chunk, the
/// body transfer.
///
/// # Returns
///
/// * `Ok(Body)` - A 2xx response, body unread
/// * `Err(WebdlError::Cancelled)` - The run was cancelled first
/// * `Err(WebdlError::Timeout)` - No response headers within `timeout`
/// * `Err(WebdlError::Http)` - Transport failure (DNS, connect, ...)
/// * `Err(WebdlError::Status)` - The server answered with a non-success status
pub async fn fetch(
    client: &Client,
    info: &PageInfo,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Body, WebdlError> {
    let url = info.url.to_string();

    let mut request = client.get(info.url.clone());
    if let Some(referer) = info.referer() {
        request = request.header(REFERER, referer.as_str());
    }

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(WebdlError::Cancelled),
        response = tokio::time::timeout(timeout, request.send()) => match response {
            Ok(response) => response.map_err(|source| WebdlError::Http {
                url: url.clone(),
                source,
            })?,
            Err(_) => {
                return Err(WebdlError::Timeout {
                    url: url.clone(),
                    after: timeout,
                })
            }
        },
    };

    let status = response.status();
    if !status.is_success() {
        return Err(WebdlError::Status {
            url,
            status: status.as_u16(),
        });
    }

    Ok(Body {
        url,
        response,
        idle: timeout,
        cancel: cancel.clone(),
    })
}
