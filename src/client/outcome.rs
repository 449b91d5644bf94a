//! Turning a relay reply into something playable

use super::transport::RelayReply;
use crate::media::{is_video_type, video_extension, MediaFile};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Public sample clip shown when the arena returns nothing playable
pub const DEFAULT_PLACEHOLDER_URL: &str =
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4";

/// JSON keys that may name the processed video
const URL_KEYS: [&str; 3] = ["outputUrl", "output_url", "url"];

/// Result errors
#[derive(Error, Debug)]
pub enum ResultError {
    #[error("Failed to save the arena video: {0}")]
    IoError(#[from] std::io::Error),

    #[error("The arena returned no playable video")]
    Unusable,
}

/// Where the processed video can be played from
#[derive(Debug, Clone, PartialEq)]
pub enum ResultReference {
    /// Video bytes written to a local file
    Saved(PathBuf),
    /// URL named by a JSON reply
    Remote(String),
    /// Fallback clip, not the arena's output
    Placeholder(String),
}

impl std::fmt::Display for ResultReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Saved(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{}", url),
            Self::Placeholder(url) => write!(f, "{} (placeholder)", url),
        }
    }
}

/// Derives a [`ResultReference`] from relay replies
#[derive(Debug, Clone)]
pub struct ResultResolver {
    output_dir: PathBuf,
    placeholder: Option<String>,
}

impl ResultResolver {
    pub fn new(output_dir: impl Into<PathBuf>, placeholder: Option<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            placeholder,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Save video payloads, follow JSON URLs, else fall back
    pub async fn resolve(
        &self,
        reply: &RelayReply,
        source: &MediaFile,
    ) -> Result<ResultReference, ResultError> {
        if let Some(content_type) = playable_type(reply) {
            let path = self.output_path(source, &content_type);
            tokio::fs::create_dir_all(&self.output_dir).await?;
            tokio::fs::write(&path, &reply.body).await?;
            tracing::info!(path = %path.display(), bytes = reply.body.len(), "Saved arena video");
            return Ok(ResultReference::Saved(path));
        }

        if let Some(url) = json_url(&reply.body) {
            return Ok(ResultReference::Remote(url));
        }

        match &self.placeholder {
            Some(url) => {
                tracing::warn!(
                    content_type = ?reply.content_type,
                    bytes = reply.body.len(),
                    "Arena reply is not playable, showing placeholder clip"
                );
                Ok(ResultReference::Placeholder(url.clone()))
            }
            None => Err(ResultError::Unusable),
        }
    }

    fn output_path(&self, source: &MediaFile, content_type: &str) -> PathBuf {
        let stem = Path::new(source.name())
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("arena");
        self.output_dir
            .join(format!("{}-detected.{}", stem, video_extension(content_type)))
    }
}

/// Content type of a non-empty video payload, declared or sniffed
fn playable_type(reply: &RelayReply) -> Option<String> {
    if reply.body.is_empty() {
        return None;
    }
    if let Some(declared) = reply.content_type.as_deref() {
        let essence = declared.split(';').next().unwrap_or(declared).trim();
        if is_video_type(essence) {
            return Some(essence.to_ascii_lowercase());
        }
    }
    infer::get(&reply.body)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Video)
        .map(|kind| kind.mime_type().to_string())
}

fn json_url(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    URL_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
        .map(|url| url.to_string())
}
