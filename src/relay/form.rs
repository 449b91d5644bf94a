//! Multipart intake
//!
//! Streams a `multipart/form-data` body with `multer` and extracts the one
//! field the route expects.

use super::RelayError;
use crate::media::{MediaFile, OCTET_STREAM};
use bytes::Bytes;
use futures::Stream;

/// File name used when the part carries none
pub const DEFAULT_FILE_NAME: &str = "upload.bin";

/// Extract the field named `field_name` as a [`MediaFile`]
///
/// Anything that prevents finding the field (no content type, no boundary,
/// malformed body, field absent) is `NoFileProvided`.
pub async fn extract_file<S, O, E>(
    content_type: Option<&str>,
    body: S,
    field_name: &str,
) -> Result<MediaFile, RelayError>
where
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let content_type = content_type.ok_or_else(|| {
        tracing::debug!("Upload request has no content type");
        RelayError::NoFileProvided
    })?;

    let boundary = multer::parse_boundary(content_type).map_err(|e| {
        tracing::debug!(error = %e, "Upload request is not multipart");
        RelayError::NoFileProvided
    })?;

    let mut multipart = multer::Multipart::new(body, boundary);

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                tracing::debug!(field = field_name, "Multipart body has no file field");
                return Err(RelayError::NoFileProvided);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed multipart body");
                return Err(RelayError::NoFileProvided);
            }
        };

        if field.name() != Some(field_name) {
            continue;
        }

        let name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string();
        let declared_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| OCTET_STREAM.to_string());

        let content = field.bytes().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read file field");
            RelayError::NoFileProvided
        })?;

        return Ok(MediaFile::new(name, declared_type, content));
    }
}
