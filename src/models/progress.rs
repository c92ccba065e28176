//! Execution progress and state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Executor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    NotStarted,
    CopyingFiles,
    VerifyingIntegrity,
    CreatingLink,
    UpdatingRegistry,
    Completed,
    Failed,
    Cancelled,
}

impl MigrationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MigrationState::Completed | MigrationState::Failed | MigrationState::Cancelled
        )
    }

    /// Whether `next` is a legal successor of this state.
    ///
    /// Stages may be skipped (no verification, no registry update) but never
    /// revisited.
    pub fn can_transition_to(self, next: MigrationState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            MigrationState::Failed | MigrationState::Cancelled => true,
            MigrationState::NotStarted => false,
            _ => next.ordinal() > self.ordinal(),
        }
    }

    fn ordinal(self) -> u8 {
        match self {
            MigrationState::NotStarted => 0,
            MigrationState::CopyingFiles => 1,
            MigrationState::VerifyingIntegrity => 2,
            MigrationState::CreatingLink => 3,
            MigrationState::UpdatingRegistry => 4,
            MigrationState::Completed => 5,
            MigrationState::Failed | MigrationState::Cancelled => 6,
        }
    }
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MigrationState::NotStarted => "not started",
            MigrationState::CopyingFiles => "copying files",
            MigrationState::VerifyingIntegrity => "verifying integrity",
            MigrationState::CreatingLink => "creating link",
            MigrationState::UpdatingRegistry => "updating registry",
            MigrationState::Completed => "completed",
            MigrationState::Failed => "failed",
            MigrationState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Progress snapshot emitted during execution. Not retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationProgress {
    /// 0 to 100.
    pub percent: u8,
    pub state: MigrationState,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<PathBuf>,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl MigrationProgress {
    pub fn new(state: MigrationState, message: impl Into<String>, bytes_transferred: u64, total_bytes: u64) -> Self {
        let percent = if total_bytes == 0 {
            if state == MigrationState::Completed { 100 } else { 0 }
        } else {
            ((bytes_transferred.min(total_bytes) as u128 * 100) / total_bytes as u128) as u8
        };
        Self {
            percent,
            state,
            message: message.into(),
            current_file: None,
            bytes_transferred,
            total_bytes,
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.current_file = Some(file.into());
        self
    }
}

/// Fire-and-forget progress sink. Sends never block; a dropped receiver is ignored.
pub type ProgressSink = tokio::sync::mpsc::UnboundedSender<MigrationProgress>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use MigrationState::*;
        assert!(NotStarted.can_transition_to(CopyingFiles));
        assert!(CopyingFiles.can_transition_to(CreatingLink));
        assert!(CreatingLink.can_transition_to(Failed));
        assert!(VerifyingIntegrity.can_transition_to(Cancelled));
        assert!(!CreatingLink.can_transition_to(CopyingFiles));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Cancelled.can_transition_to(CopyingFiles));
    }

    #[test]
    fn test_progress_percent() {
        let p = MigrationProgress::new(MigrationState::CopyingFiles, "x", 525, 1050);
        assert_eq!(p.percent, 50);
        let p = MigrationProgress::new(MigrationState::CopyingFiles, "x", 0, 0);
        assert_eq!(p.percent, 0);
        let p = MigrationProgress::new(MigrationState::Completed, "x", 0, 0);
        assert_eq!(p.percent, 100);
    }
}
