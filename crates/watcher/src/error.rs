//! Error taxonomy for the coordinator and the trigger contract.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors a platform trigger can report to the coordinator.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// The path carries no native registration.
    #[error("path is not registered with the native facility")]
    NotWatched,

    /// The blocking wait was interrupted; the caller retries.
    #[error("interrupted system call")]
    Interrupted,

    /// A raw notification did not map to a live watch (typically a race
    /// with removal).
    #[error("notification does not resolve to a live watch")]
    Unresolved,

    /// Any other native facility failure.
    #[error("native facility error: {0}")]
    Native(#[from] io::Error),
}

impl TriggerError {
    /// Whether the failure was the filesystem object vanishing underneath
    /// the registration.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Native(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

/// Caller-facing errors of the coordinator.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The path does not exist on the filesystem.
    #[error("path does not exist: {path}")]
    NotFound {
        /// Path that failed to stat.
        path: PathBuf,
        /// The underlying stat failure.
        #[source]
        source: io::Error,
    },

    /// The path is not present in the watch table.
    #[error("path is not watched: {0}")]
    NotWatched(PathBuf),

    /// Registering or unregistering native interest failed.
    #[error("native registration failed for {path}: {source}")]
    Registration {
        /// Path whose registration failed.
        path: PathBuf,
        /// The trigger's failure.
        #[source]
        source: TriggerError,
    },

    /// The native facility could not be acquired at startup. Fatal: no
    /// watcher is constructed.
    #[error("native facility unavailable: {0}")]
    Init(#[source] TriggerError),

    /// Stopping or releasing the native facility failed.
    #[error("shutting down the native facility failed: {0}")]
    Shutdown(#[source] TriggerError),

    /// A directory listing or other filesystem call failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl WatchError {
    /// Whether the underlying failure was the filesystem object vanishing.
    ///
    /// Used to classify transient races during reconciliation, where a
    /// path disappearing between the notification and the re-scan is an
    /// expected outcome rather than a fault.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Registration { source, .. } => source.is_not_found(),
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_not_found_classification() {
        let vanished = TriggerError::Native(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(vanished.is_not_found());
        assert!(!TriggerError::NotWatched.is_not_found());
        assert!(!TriggerError::Native(io::Error::other("boom")).is_not_found());
    }

    #[test]
    fn test_watch_error_not_found_classification() {
        let err = WatchError::Registration {
            path: PathBuf::from("/tmp/x"),
            source: TriggerError::Native(io::Error::new(io::ErrorKind::NotFound, "gone")),
        };
        assert!(err.is_not_found());
        assert!(!WatchError::NotWatched(PathBuf::from("/tmp/x")).is_not_found());
    }
}
