//! Upload session state
//!
//! One session holds the selected file and the status of the current
//! attempt. Each `start` bumps a generation counter and returns a ticket;
//! updates presented with an older ticket are dropped, so a late reply for
//! an abandoned attempt never overwrites what a newer one shows.

use super::outcome::ResultReference;
use super::progress::ProgressEvent;
use super::{ClientError, FailureKind, TransferError};
use crate::media::MediaFile;

pub const UPLOADING_MESSAGE: &str = "Launching into Beyblade detection arena...";
pub const COMPLETED_MESSAGE: &str = "Beyblade detection battle completed! Victory achieved!";

/// Attempt phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Uploading,
    Completed,
    Error,
}

/// What the UI renders
#[derive(Debug, Clone, PartialEq)]
pub struct UploadStatus {
    pub phase: Phase,
    pub progress: u8,
    pub message: String,
    pub result: Option<ResultReference>,
    pub failure: Option<FailureKind>,
}

impl UploadStatus {
    fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            progress: 0,
            message: String::new(),
            result: None,
            failure: None,
        }
    }
}

/// Identifies the attempt an update belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptTicket {
    generation: u64,
}

/// The client's single current attempt
#[derive(Debug)]
pub struct UploadSession {
    generation: u64,
    selected: Option<MediaFile>,
    status: UploadStatus,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadSession {
    pub fn new() -> Self {
        Self {
            generation: 0,
            selected: None,
            status: UploadStatus::idle(),
        }
    }

    pub fn status(&self) -> &UploadStatus {
        &self.status
    }

    pub fn selected(&self) -> Option<&MediaFile> {
        self.selected.as_ref()
    }

    /// Replace the selection with `file`, starting a fresh idle attempt
    ///
    /// Non-video files are refused and leave the session untouched.
    pub fn select_file(&mut self, file: MediaFile) -> Result<(), ClientError> {
        file.ensure_video()?;
        self.generation += 1;
        self.selected = Some(file);
        self.status = UploadStatus::idle();
        Ok(())
    }

    /// Begin uploading the selected file
    pub fn start(&mut self) -> Result<(AttemptTicket, MediaFile), ClientError> {
        if self.status.phase == Phase::Uploading {
            return Err(ClientError::AlreadyUploading);
        }
        let file = self.selected.clone().ok_or(ClientError::NoFileSelected)?;

        self.generation += 1;
        self.status = UploadStatus {
            phase: Phase::Uploading,
            progress: 0,
            message: UPLOADING_MESSAGE.to_string(),
            result: None,
            failure: None,
        };

        Ok((
            AttemptTicket {
                generation: self.generation,
            },
            file,
        ))
    }

    /// True while `ticket` names the attempt currently uploading
    pub fn is_current(&self, ticket: AttemptTicket) -> bool {
        ticket.generation == self.generation && self.status.phase == Phase::Uploading
    }

    /// Fold one progress event in. Progress never moves backwards.
    pub fn apply_progress(&mut self, ticket: AttemptTicket, event: ProgressEvent) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let progress = event.percent().max(self.status.progress);
        self.status.progress = progress;
        self.status.message = format!("Launching into battle arena... {}%", progress);
        true
    }

    pub fn complete(&mut self, ticket: AttemptTicket, result: ResultReference) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!("Dropping result of a stale attempt");
            return false;
        }
        self.status = UploadStatus {
            phase: Phase::Completed,
            progress: 100,
            message: COMPLETED_MESSAGE.to_string(),
            result: Some(result),
            failure: None,
        };
        true
    }

    pub fn fail(&mut self, ticket: AttemptTicket, error: &TransferError) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(error = %error, "Dropping failure of a stale attempt");
            return false;
        }
        self.status = UploadStatus {
            phase: Phase::Error,
            progress: 0,
            message: error.to_string(),
            result: None,
            failure: Some(error.kind()),
        };
        true
    }

    /// Clear the selection and the attempt. Idempotent.
    ///
    /// An in-flight transfer is not cancelled; its ticket just stops
    /// matching.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.selected = None;
        self.status = UploadStatus::idle();
    }
}
