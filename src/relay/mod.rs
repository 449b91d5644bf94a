//! Upload relay
//!
//! Takes one multipart upload, forwards its file field to the detection
//! upstream and maps every outcome to either the upstream payload or a
//! [`RelayError`] with a JSON envelope.

use crate::media::MediaFile;
use crate::metrics;
use crate::upstream::{DetectionUpstream, UpstreamError, UpstreamReply};
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub mod form;

/// Header naming the kind of relay error on error responses
pub const ERROR_KIND_HEADER: &str = "x-relay-error";

pub const NO_FILE_MESSAGE: &str = "No file provided";
pub const TIMEOUT_MESSAGE: &str = "Battle timeout! The arena took too long to respond.";
pub const UNREACHABLE_MESSAGE: &str = "Cannot reach the battle arena! Check your connection.";
pub const GENERIC_MESSAGE: &str = "Launch failed! Prepare for retry!";
pub const LAUNCHED_MESSAGE: &str = "Video launched into Beyblade detection arena!";

/// Message shown when the upstream answers with a non-2xx status
pub fn rejected_message(status: impl std::fmt::Display, reason: &str) -> String {
    format!("Arena rejected the battle: {} {}", status, reason)
        .trim_end()
        .to_string()
}

/// Relay errors, one per user-visible failure case
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("{}", NO_FILE_MESSAGE)]
    NoFileProvided,

    #[error("{}", TIMEOUT_MESSAGE)]
    UpstreamTimeout,

    #[error("{}", rejected_message(.status, .reason))]
    UpstreamRejected { status: u16, reason: String },

    #[error("{}", UNREACHABLE_MESSAGE)]
    UpstreamUnreachable,

    #[error("{}", GENERIC_MESSAGE)]
    InternalFailure,
}

impl RelayError {
    /// HTTP status returned to the caller
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NoFileProvided => 400,
            Self::UpstreamTimeout => 408,
            Self::UpstreamRejected { status, .. } => *status,
            Self::UpstreamUnreachable => 503,
            Self::InternalFailure => 500,
        }
    }

    /// Stable identifier sent in [`ERROR_KIND_HEADER`]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoFileProvided => "no-file",
            Self::UpstreamTimeout => "timeout",
            Self::UpstreamRejected { .. } => "rejected",
            Self::UpstreamUnreachable => "unreachable",
            Self::InternalFailure => "internal",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.to_string(),
        }
    }
}

impl From<UpstreamError> for RelayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Timeout => Self::UpstreamTimeout,
            UpstreamError::Unreachable(_) => Self::UpstreamUnreachable,
            UpstreamError::Rejected { status, reason } => Self::UpstreamRejected { status, reason },
            UpstreamError::Internal(_) => Self::InternalFailure,
        }
    }
}

/// JSON body of every relay error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
}

/// JSON body returned by the envelope route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchReport {
    pub success: bool,
    pub job_id: String,
    pub filename: String,
    pub size: u64,
    pub message: String,
    pub detection_result: serde_json::Value,
}

impl LaunchReport {
    pub fn new(file: &MediaFile, reply: &UpstreamReply) -> Self {
        Self {
            success: true,
            job_id: synthetic_job_id(),
            filename: file.name().to_string(),
            size: file.size(),
            message: LAUNCHED_MESSAGE.to_string(),
            detection_result: detection_value(reply),
        }
    }
}

/// `job_<unix millis>_<9 alphanumerics>`. Nothing stores it.
pub fn synthetic_job_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "job_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        &suffix[..9]
    )
}

/// Upstream payload as JSON: parsed JSON, UTF-8 text, or null for binary
fn detection_value(reply: &UpstreamReply) -> serde_json::Value {
    if let Ok(value) = serde_json::from_slice(&reply.body) {
        return value;
    }
    let is_text = reply
        .content_type
        .as_deref()
        .map(|ct| ct.starts_with("text/"))
        .unwrap_or(false);
    match std::str::from_utf8(&reply.body) {
        Ok(text) if is_text => serde_json::Value::String(text.to_string()),
        _ => serde_json::Value::Null,
    }
}

/// The relay itself: intake, forward, classify
#[derive(Clone)]
pub struct Relay {
    upstream: Arc<dyn DetectionUpstream>,
}

impl Relay {
    pub fn new(upstream: Arc<dyn DetectionUpstream>) -> Self {
        Self { upstream }
    }

    /// Extract `field_name` from a multipart body and forward it
    ///
    /// The upstream is never called when the field is missing.
    pub async fn relay<S, O, E>(
        &self,
        route: &'static str,
        content_type: Option<&str>,
        body: S,
        field_name: &str,
    ) -> Result<(MediaFile, UpstreamReply), RelayError>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let file = match form::extract_file(content_type, body, field_name).await {
            Ok(file) => file,
            Err(e) => {
                metrics::record_relay_outcome(route, e.kind());
                return Err(e);
            }
        };

        let reply = self.forward(route, &file).await?;
        Ok((file, reply))
    }

    /// Forward an already extracted file
    #[tracing::instrument(
        name = "relay.forward",
        skip(self, route, file),
        fields(
            relay.route = route,
            upload.file_name = %file.name(),
            upload.content_type = %file.content_type(),
            upload.bytes = file.size()
        ),
        err
    )]
    pub async fn forward(
        &self,
        route: &'static str,
        file: &MediaFile,
    ) -> Result<UpstreamReply, RelayError> {
        let start_time = Instant::now();
        let result = self.upstream.detect(file).await;
        metrics::record_upstream_duration(start_time.elapsed().as_secs_f64());

        match result {
            Ok(reply) => {
                metrics::record_relay_outcome(route, "success");
                metrics::record_forwarded_bytes(file.size());
                tracing::info!(
                    status = reply.status,
                    reply_bytes = reply.body.len(),
                    "Upload relayed"
                );
                Ok(reply)
            }
            Err(e) => {
                tracing::error!(error = %e, "Upload relay failed");
                let err = RelayError::from(e);
                metrics::record_relay_outcome(route, err.kind());
                metrics::record_error(err.kind());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MockDetectionUpstream;

    const BOUNDARY: &str = "relay-boundary";

    fn request_body(field: &str) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"spin.mp4\"\r\n\
             Content-Type: video/mp4\r\n\r\nspin\r\n--{b}--\r\n",
            b = BOUNDARY,
        );
        futures::stream::once(async move { Ok(Bytes::from(body)) })
    }

    fn content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    fn ok_reply() -> UpstreamReply {
        UpstreamReply {
            status: 200,
            content_type: Some("video/mp4".into()),
            body: Bytes::from_static(b"annotated"),
        }
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(RelayError::NoFileProvided.status_code(), 400);
        assert_eq!(RelayError::UpstreamTimeout.status_code(), 408);
        assert_eq!(RelayError::UpstreamUnreachable.status_code(), 503);
        assert_eq!(RelayError::InternalFailure.status_code(), 500);
        let rejected = RelayError::UpstreamRejected {
            status: 422,
            reason: "Unprocessable Entity".into(),
        };
        assert_eq!(rejected.status_code(), 422);
        assert_eq!(
            rejected.envelope().error,
            "Arena rejected the battle: 422 Unprocessable Entity"
        );
    }

    #[test]
    fn test_upstream_error_mapping() {
        assert_eq!(
            RelayError::from(UpstreamError::Timeout),
            RelayError::UpstreamTimeout
        );
        assert_eq!(
            RelayError::from(UpstreamError::Unreachable("refused".into())),
            RelayError::UpstreamUnreachable
        );
        assert_eq!(
            RelayError::from(UpstreamError::Internal("boom".into())),
            RelayError::InternalFailure
        );
    }

    #[test]
    fn test_synthetic_job_id_shape() {
        let id = synthetic_job_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "job");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn test_detection_value() {
        let json = UpstreamReply {
            status: 200,
            content_type: Some("application/json".into()),
            body: Bytes::from_static(br#"{"beyblades":2}"#),
        };
        assert_eq!(detection_value(&json)["beyblades"], 2);

        let text = UpstreamReply {
            status: 200,
            content_type: Some("text/plain".into()),
            body: Bytes::from_static(b"two tops"),
        };
        assert_eq!(detection_value(&text), "two tops");

        assert!(detection_value(&ok_reply()).is_null());
    }

    #[tokio::test]
    async fn test_relay_forwards_file_field() {
        let mut upstream = MockDetectionUpstream::new();
        upstream
            .expect_detect()
            .withf(|file| file.name() == "spin.mp4" && file.content().as_ref() == b"spin")
            .times(1)
            .returning(|_| Ok(ok_reply()));

        let relay = Relay::new(Arc::new(upstream));
        let (file, reply) = relay
            .relay("detect", Some(&content_type()), request_body("file"), "file")
            .await
            .unwrap();

        assert_eq!(file.content_type(), "video/mp4");
        assert_eq!(reply, ok_reply());
    }

    #[tokio::test]
    async fn test_relay_without_file_never_calls_upstream() {
        let mut upstream = MockDetectionUpstream::new();
        upstream.expect_detect().times(0);

        let relay = Relay::new(Arc::new(upstream));
        let err = relay
            .relay("detect", Some(&content_type()), request_body("other"), "file")
            .await
            .unwrap_err();

        assert_eq!(err, RelayError::NoFileProvided);
    }

    #[tokio::test]
    async fn test_relay_maps_upstream_rejection() {
        let mut upstream = MockDetectionUpstream::new();
        upstream.expect_detect().returning(|_| {
            Err(UpstreamError::Rejected {
                status: 415,
                reason: "Unsupported Media Type".into(),
            })
        });

        let relay = Relay::new(Arc::new(upstream));
        let err = relay
            .relay("detect", Some(&content_type()), request_body("file"), "file")
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 415);
        assert_eq!(err.kind(), "rejected");
    }
}
