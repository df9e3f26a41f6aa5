//! Error taxonomy for the view engine
//!
//! Out-of-range configuration is never an error here: setters clamp and
//! log instead. Transient sensor or media hiccups are absorbed by the engine
//! and never reach this type.

use thiserror::Error;

/// Errors surfaced by [`ViewEngine`](crate::ViewEngine) operations and
/// delivered to listeners through `did_fail`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    /// Source or license could not be accepted or opened
    #[error("Initialization failed: {0}")]
    Initialization(String),
    /// Media collaborator reported an unrecoverable decode failure
    #[error("Decode failed: {0}")]
    Decode(String),
    /// Operation is not valid in the current playback state
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// Render sink did not complete a frame within one frame interval
    #[error("No frame completed in time for snapshot")]
    SnapshotTimeout,
}

impl ViewError {
    /// Shorthand for an [`ViewError::InvalidState`] with a formatted reason
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        ViewError::InvalidState(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ViewError::invalid_state("play() while Failed");
        assert_eq!(err.to_string(), "Invalid state: play() while Failed");
        assert_eq!(
            ViewError::Decode("corrupt packet".into()).to_string(),
            "Decode failed: corrupt packet"
        );
    }
}
