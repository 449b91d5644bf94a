//! Upload progress events
//!
//! The transport emits a sequence of [`ProgressEvent`]s on an unbounded
//! channel; the session updater consumes them. Sending never blocks.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

/// Size of the chunks the transport streams to the relay
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Bytes handed to the connection so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub bytes_sent: u64,
    pub bytes_total: u64,
}

impl ProgressEvent {
    /// Whole percentage, clamped to 0..=100. Unknown totals read as 0.
    pub fn percent(&self) -> u8 {
        if self.bytes_total == 0 {
            return 0;
        }
        let sent = self.bytes_sent.min(self.bytes_total) as f64;
        (sent * 100.0 / self.bytes_total as f64).round() as u8
    }
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Create a progress subscription
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Stream `content` in [`CHUNK_SIZE`] pieces, reporting each one as it is
/// pulled by the HTTP body
pub fn tracked_chunks(
    content: Bytes,
    progress: ProgressSender,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let total = content.len() as u64;
    let mut chunks = Vec::with_capacity(content.len() / CHUNK_SIZE + 1);
    let mut offset = 0;
    while offset < content.len() {
        let end = (offset + CHUNK_SIZE).min(content.len());
        chunks.push(content.slice(offset..end));
        offset = end;
    }

    let mut sent = 0u64;
    futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        // A dropped receiver only means nobody is watching
        let _ = progress.send(ProgressEvent {
            bytes_sent: sent,
            bytes_total: total,
        });
        Ok(chunk)
    })
}
