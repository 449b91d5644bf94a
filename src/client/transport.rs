//! HTTP transport from the client to the relay

use super::progress::{tracked_chunks, ProgressSender};
use super::TransferError;
use crate::media::MediaFile;
use crate::relay::{
    rejected_message, ErrorEnvelope, ERROR_KIND_HEADER, GENERIC_MESSAGE, TIMEOUT_MESSAGE,
    UNREACHABLE_MESSAGE,
};
use crate::router::DETECTION_PATH;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::time::Duration;

/// Client-side bound; a little longer than the relay's own upstream timeout
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(310);

/// Successful relay reply
#[derive(Debug, Clone, PartialEq)]
pub struct RelayReply {
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Uploads files to a relay
pub struct RelayClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl RelayClient {
    /// `relay_url` is the relay's base URL, e.g. `http://localhost:3000`
    pub fn new(relay_url: &str, timeout: Duration) -> Result<Self, TransferError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to build HTTP client");
                TransferError::Failed(GENERIC_MESSAGE.to_string())
            })?;

        Ok(Self {
            endpoint: format!("{}{}", relay_url.trim_end_matches('/'), DETECTION_PATH),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST `file` as the `file` field, reporting progress on `progress`
    #[tracing::instrument(
        name = "client.upload",
        skip(self, file, progress),
        fields(endpoint = %self.endpoint, upload.file_name = %file.name(), upload.bytes = file.size()),
        err
    )]
    pub async fn upload(
        &self,
        file: &MediaFile,
        progress: ProgressSender,
    ) -> Result<RelayReply, TransferError> {
        let body = reqwest::Body::wrap_stream(tracked_chunks(file.content().clone(), progress));
        let part = Part::stream_with_length(body, file.size())
            .file_name(file.name().to_string())
            .mime_str(file.content_type())
            .map_err(|e| {
                tracing::error!(error = %e, "Invalid content type on selected file");
                TransferError::Failed(GENERIC_MESSAGE.to_string())
            })?;

        let response = self
            .http_client
            .post(&self.endpoint)
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransferError::Timeout(TIMEOUT_MESSAGE.to_string())
            } else {
                tracing::error!(error = %e, "Failed to read relay reply");
                TransferError::Failed(GENERIC_MESSAGE.to_string())
            }
        })?;

        if !status.is_success() {
            let kind = headers
                .get(ERROR_KIND_HEADER)
                .and_then(|v| v.to_str().ok());
            return Err(classify_rejection(status, kind, &body));
        }

        Ok(RelayReply {
            content_type: headers
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string()),
            body,
        })
    }
}

fn classify_send_error(err: reqwest::Error) -> TransferError {
    if err.is_timeout() {
        TransferError::Timeout(TIMEOUT_MESSAGE.to_string())
    } else if err.is_connect() || err.is_request() {
        tracing::warn!(error = %err, "Relay unreachable");
        TransferError::Unreachable(UNREACHABLE_MESSAGE.to_string())
    } else {
        tracing::error!(error = %err, "Upload request failed");
        TransferError::Failed(GENERIC_MESSAGE.to_string())
    }
}

/// Map a non-2xx relay reply
///
/// The error kind header decides the category when present, the status
/// otherwise. The envelope message is shown when there is one.
pub fn classify_rejection(
    status: reqwest::StatusCode,
    kind: Option<&str>,
    body: &[u8],
) -> TransferError {
    let envelope_message = serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error)
        .filter(|m| !m.is_empty());
    let code = status.as_u16();

    let kind = kind.unwrap_or(match code {
        408 => "timeout",
        503 => "unreachable",
        500 => "internal",
        _ => "rejected",
    });

    match kind {
        "timeout" => TransferError::Timeout(
            envelope_message.unwrap_or_else(|| TIMEOUT_MESSAGE.to_string()),
        ),
        "unreachable" => TransferError::Unreachable(
            envelope_message.unwrap_or_else(|| UNREACHABLE_MESSAGE.to_string()),
        ),
        "internal" => TransferError::Failed(
            envelope_message.unwrap_or_else(|| GENERIC_MESSAGE.to_string()),
        ),
        _ => TransferError::Rejected {
            status: code,
            message: envelope_message.unwrap_or_else(|| {
                rejected_message(code, status.canonical_reason().unwrap_or(""))
            }),
        },
    }
}
