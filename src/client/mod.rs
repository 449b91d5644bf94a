//! Upload client
//!
//! Drives one upload attempt at a time against the relay: file selection,
//! progress, the final result, and reset.
//!
//! # Example
//!
//! ```no_run
//! use beyblade_arena::client::{run_attempt, RelayClient, ResultResolver, UploadSession};
//! use beyblade_arena::client::transport::DEFAULT_CLIENT_TIMEOUT;
//! use beyblade_arena::media::MediaFile;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = UploadSession::new();
//! session.select_file(MediaFile::from_path("launch.mp4").await?)?;
//!
//! let client = RelayClient::new("http://localhost:3000", DEFAULT_CLIENT_TIMEOUT)?;
//! let resolver = ResultResolver::new("arena-output", None);
//! run_attempt(&mut session, &client, &resolver, |status| {
//!     println!("{:?} {}% {}", status.phase, status.progress, status.message);
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod outcome;
pub mod progress;
pub mod session;
pub mod transport;

use crate::media::MediaError;
use thiserror::Error;

pub use outcome::{ResultError, ResultReference, ResultResolver};
pub use progress::{progress_channel, ProgressEvent};
pub use session::{AttemptTicket, Phase, UploadSession, UploadStatus};
pub use transport::{RelayClient, RelayReply};

/// Failure category shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Unreachable,
    Rejected { status: u16 },
    Generic,
}

/// Why an upload attempt failed; the text is what the user sees
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Unreachable(String),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    Failed(String),
}

impl TransferError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Unreachable(_) => FailureKind::Unreachable,
            Self::Rejected { status, .. } => FailureKind::Rejected { status: *status },
            Self::Failed(_) => FailureKind::Generic,
        }
    }
}

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("No video selected")]
    NoFileSelected,

    #[error("An upload is already in progress")]
    AlreadyUploading,

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Run one attempt for the selected file to completion
///
/// Progress events and the transfer are polled together on the calling
/// task. `on_update` sees every status change. Returns the final status.
pub async fn run_attempt<F>(
    session: &mut UploadSession,
    client: &RelayClient,
    resolver: &ResultResolver,
    mut on_update: F,
) -> Result<UploadStatus, ClientError>
where
    F: FnMut(&UploadStatus),
{
    let (ticket, file) = session.start()?;
    on_update(session.status());

    let (progress_tx, mut progress_rx) = progress_channel();
    let upload = client.upload(&file, progress_tx);
    tokio::pin!(upload);

    let outcome = loop {
        tokio::select! {
            biased;
            Some(event) = progress_rx.recv() => {
                if session.apply_progress(ticket, event) {
                    on_update(session.status());
                }
            }
            outcome = &mut upload => break outcome,
        }
    };

    // Events queued before the reply still belong to this attempt
    while let Ok(event) = progress_rx.try_recv() {
        if session.apply_progress(ticket, event) {
            on_update(session.status());
        }
    }

    let result = match outcome {
        Ok(reply) => resolver.resolve(&reply, &file).await.map_err(|e| {
            tracing::warn!(error = %e, "Arena reply could not be used");
            TransferError::Failed(e.to_string())
        }),
        Err(e) => Err(e),
    };

    match result {
        Ok(reference) => {
            session.complete(ticket, reference);
        }
        Err(e) => {
            session.fail(ticket, &e);
        }
    }
    on_update(session.status());

    Ok(session.status().clone())
}
