//! Detection upstream client
//!
//! Forwards a [`MediaFile`] to the external detection service as a single
//! multipart part and classifies every failure into the relay's taxonomy.
//!
//! # Example
//!
//! ```no_run
//! use beyblade_arena::media::MediaFile;
//! use beyblade_arena::upstream::{DetectionUpstream, HttpUpstream};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let upstream = HttpUpstream::new(
//!     "http://localhost:8000/beyblade-detection",
//!     "file",
//!     Duration::from_secs(300),
//! )?;
//! let file = MediaFile::new("launch.mp4", "video/mp4", Bytes::from_static(b"..."));
//! let reply = upstream.detect(&file).await?;
//! println!("{} bytes of {}", reply.body.len(), reply.content_type.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use crate::media::MediaFile;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Upstream errors
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Upstream timed out")]
    Timeout,

    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    #[error("Upstream rejected upload: {status} {reason}")]
    Rejected { status: u16, reason: String },

    #[error("Upstream failure: {0}")]
    Internal(String),
}

impl UpstreamError {
    /// Classify a reqwest error raised before any response arrived
    fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_builder() {
            Self::Internal(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }

    /// Classify a reqwest error raised while reading a response body
    fn from_body(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Internal(err.to_string())
        }
    }
}

/// A successful (2xx) upstream reply
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Detection service seam
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DetectionUpstream: Send + Sync {
    /// Send one file for detection. Never retried.
    async fn detect(&self, file: &MediaFile) -> Result<UpstreamReply, UpstreamError>;
}

/// reqwest-backed detection upstream
pub struct HttpUpstream {
    url: String,
    field_name: String,
    http_client: reqwest::Client,
}

impl HttpUpstream {
    /// Create an upstream client with a bound on the whole exchange
    pub fn new(
        url: impl Into<String>,
        field_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Internal(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            field_name: field_name.into(),
            http_client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_form(&self, file: &MediaFile) -> Form {
        let part = Part::stream_with_length(file.content().clone(), file.size())
            .file_name(file.name().to_string());
        let part = match part.mime_str(file.content_type()) {
            Ok(part) => part,
            Err(e) => {
                tracing::warn!(
                    content_type = %file.content_type(),
                    error = %e,
                    "Unparseable content type, forwarding without one"
                );
                Part::stream_with_length(file.content().clone(), file.size())
                    .file_name(file.name().to_string())
            }
        };

        Form::new().part(self.field_name.clone(), part)
    }
}

#[async_trait]
impl DetectionUpstream for HttpUpstream {
    #[tracing::instrument(
        name = "upstream.detect",
        skip(self, file),
        fields(
            upstream.url = %self.url,
            upload.file_name = %file.name(),
            upload.bytes = file.size(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn detect(&self, file: &MediaFile) -> Result<UpstreamReply, UpstreamError> {
        let start_time = Instant::now();

        let response = self
            .http_client
            .post(&self.url)
            .multipart(self.build_form(file))
            .send()
            .await
            .map_err(UpstreamError::from_send)?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if !status.is_success() {
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.bytes().await.map_err(UpstreamError::from_body)?;

        tracing::info!(
            status = status.as_u16(),
            bytes = body.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Detection upstream replied"
        );

        Ok(UpstreamReply {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}
