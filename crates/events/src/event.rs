//! The portable event record delivered to consumers.

use crate::mask::EventMask;
use std::path::PathBuf;
use std::sync::Arc;

/// A single filesystem change, expressed in the portable vocabulary.
///
/// `R` is the raw notification type of the platform trigger that produced
/// it. Events synthesized from one native notification share the same raw
/// payload; events derived purely from bookkeeping (per-child rename
/// synthesis) carry none.
#[derive(Debug)]
pub struct Event<R> {
    /// Absolute path the event concerns.
    pub path: PathBuf,
    /// Portable kinds (and any requested native flavors) that fired.
    pub kinds: EventMask,
    /// Whether the path was known to be a directory.
    pub is_dir: bool,
    /// The native notification this event was derived from, if any.
    pub payload: Option<Arc<R>>,
}

impl<R> Event<R> {
    /// Create an event carrying a shared native payload.
    #[must_use]
    pub fn new(path: PathBuf, kinds: EventMask, is_dir: bool, payload: Arc<R>) -> Self {
        Self {
            path,
            kinds,
            is_dir,
            payload: Some(payload),
        }
    }

    /// Create an event with no native payload.
    #[must_use]
    pub fn synthesized(path: PathBuf, kinds: EventMask, is_dir: bool) -> Self {
        Self {
            path,
            kinds,
            is_dir,
            payload: None,
        }
    }
}

// Cloning shares the payload; `R` itself need not be `Clone`.
impl<R> Clone for Event<R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            kinds: self.kinds,
            is_dir: self.is_dir,
            payload: self.payload.clone(),
        }
    }
}
