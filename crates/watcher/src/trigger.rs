//! The contract a platform's native event facility must satisfy.
//!
//! kqueue, FEN and event ports all share the same shape: a path is
//! registered with an encoded flag mask, a blocking call yields raw
//! notifications, and a notification must be resolved back to the watch
//! it belongs to. One concrete implementation exists per OS family and is
//! selected at build time; the coordinator is generic over it.

use crate::error::TriggerError;
use crate::table::WatchRecord;
use rescan_events::TranslationTable;
use std::fs;
use std::path::{Path, PathBuf};

/// Opaque per-watch native state (a file descriptor, a port association,
/// or whatever the platform hands back). Only the trigger that allocated
/// it may interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

/// Minimal capability set the coordinator needs from a native facility.
///
/// The trigger keeps its own index from native identifiers to path keys;
/// it never holds references into the coordinator's watch table. All
/// methods take `&self`: the facility is shared between the monitor
/// thread (`wait`) and callers registering interest under the
/// coordinator's lock.
pub trait Trigger: Send + Sync + 'static {
    /// Raw notification type produced by the native facility.
    type Raw: Send + Sync + 'static;

    /// Acquire the native facility handle. A failure here is fatal.
    fn init(&self) -> Result<(), TriggerError>;

    /// The platform's flag table.
    fn translation(&self) -> &TranslationTable;

    /// Allocate native state for a path not yet known to the table.
    fn new_watch_state(&self, path: &Path, meta: &fs::Metadata)
    -> Result<NativeHandle, TriggerError>;

    /// Add the handle to the trigger's reverse index once registration
    /// succeeded.
    fn record(&self, handle: NativeHandle, path: &Path);

    /// Drop the record's handle from the reverse index.
    fn delete(&self, record: &WatchRecord);

    /// (Re)register interest for the record's path with the given encoded
    /// native mask. Idempotent for an unchanged mask.
    fn register(
        &self,
        meta: &fs::Metadata,
        record: &WatchRecord,
        raw_mask: u64,
    ) -> Result<(), TriggerError>;

    /// Remove native interest. Fails with [`TriggerError::NotWatched`] if
    /// the registration is already gone.
    fn unregister(&self, record: &WatchRecord) -> Result<(), TriggerError>;

    /// Map a raw notification back to the owning path key and the native
    /// flags that fired.
    fn resolve(&self, raw: &Self::Raw) -> Result<(PathBuf, u64), TriggerError>;

    /// Block until the next notification or a stop request.
    fn wait(&self) -> Result<Self::Raw, TriggerError>;

    /// Whether the outcome of [`Trigger::wait`] is the intentional
    /// shutdown wakeup rather than a real notification or transient error.
    fn is_stop(&self, outcome: &Result<Self::Raw, TriggerError>) -> bool;

    /// Request that the wait loop unblock.
    fn stop(&self) -> Result<(), TriggerError>;

    /// Release the native facility handle. Only safe once `stop` has been
    /// observed to take effect.
    fn close(&self) -> Result<(), TriggerError>;
}
