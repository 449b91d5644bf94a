//! Media file value type
//!
//! A `MediaFile` is the single representation of an uploaded or selected
//! file: name, declared content type and the bytes themselves. The relay
//! builds unchecked values from multipart fields; the client validates its
//! selection once with [`MediaFile::ensure_video`].

use bytes::Bytes;
use std::path::Path;
use thiserror::Error;

/// Content type used when nothing better is known
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Media errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to read media file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Please select a valid video file: '{name}' is {content_type}")]
    NotVideo { name: String, content_type: String },

    #[error("Invalid file name: {0}")]
    InvalidName(String),
}

/// A file with its declared content type
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    name: String,
    content_type: String,
    content: Bytes,
}

impl MediaFile {
    /// Create a media file without validating its content type
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, content: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            content,
        }
    }

    /// Read a file from disk, detecting its content type
    ///
    /// Magic bytes win over the extension; unknown files are
    /// `application/octet-stream`.
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, MediaError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MediaError::InvalidName(path.display().to_string()))?
            .to_string();

        let content = Bytes::from(tokio::fs::read(path).await?);
        let content_type = sniff_content_type(&content, &name);

        Ok(Self {
            name,
            content_type,
            content,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Size in mebibytes, for display
    pub fn size_mb(&self) -> f64 {
        self.size() as f64 / (1024.0 * 1024.0)
    }

    pub fn is_video(&self) -> bool {
        is_video_type(&self.content_type)
    }

    /// Reject anything whose declared type is not `video/*`
    pub fn ensure_video(&self) -> Result<(), MediaError> {
        if self.is_video() {
            Ok(())
        } else {
            Err(MediaError::NotVideo {
                name: self.name.clone(),
                content_type: self.content_type.clone(),
            })
        }
    }
}

/// True for `video/*` content types, ignoring parameters and case
pub fn is_video_type(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("video/")
}

/// Detect a content type from magic bytes, falling back to the extension
pub fn sniff_content_type(content: &[u8], name: &str) -> String {
    if let Some(kind) = infer::get(content) {
        return kind.mime_type().to_string();
    }

    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => OCTET_STREAM,
    }
    .to_string()
}

/// File extension for a video content type, defaulting to mp4
pub fn video_extension(content_type: &str) -> &'static str {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "video/quicktime" => "mov",
        "video/x-msvideo" => "avi",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        "video/x-m4v" => "m4v",
        _ => "mp4",
    }
}
