//! The authoritative table of watched paths.
//!
//! Owned exclusively by the coordinator and mutated only under its lock.
//! A record exists while some interest remains for its path (or while a
//! registration is in flight); the path is the identity, so the table
//! holds at most one record per path.

use crate::trigger::NativeHandle;
use rescan_events::EventMask;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Which of a record's two masks an operation addresses.
///
/// A path can be watched in its own right (a caller asked for it, the
/// `Directory` role even when it is a file) and as a member of a watched
/// directory (the `Child` role). The two interests are tracked
/// independently so a partial unwatch leaves the other intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchRole {
    /// Interest requested of the path itself.
    Directory,
    /// Interest inherited from a watched parent directory.
    Child,
    /// Both at once (full teardown).
    Both,
}

/// State for one watched filesystem path.
#[derive(Debug)]
pub struct WatchRecord {
    /// Absolute path; the record's identity.
    pub path: PathBuf,
    /// Last-known metadata snapshot. Decides file-vs-directory synthesis.
    pub meta: fs::Metadata,
    /// Events requested of this path acting as a directory.
    pub dir_mask: EventMask,
    /// Events requested of this path as a non-directory child.
    pub nondir_mask: EventMask,
    /// Opaque native state owned by the trigger.
    pub handle: NativeHandle,
}

impl WatchRecord {
    /// Create a record with no interest yet; callers merge a mask in
    /// before registering.
    #[must_use]
    pub fn new(path: PathBuf, meta: fs::Metadata, handle: NativeHandle) -> Self {
        Self {
            path,
            meta,
            dir_mask: EventMask::empty(),
            nondir_mask: EventMask::empty(),
            handle,
        }
    }

    /// Whether the path was a directory at the last snapshot.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.meta.is_dir()
    }

    /// Union of both roles' interest.
    #[must_use]
    pub fn requested(&self) -> EventMask {
        self.dir_mask | self.nondir_mask
    }

    /// OR a mask into the given role.
    pub fn merge(&mut self, role: WatchRole, mask: EventMask) {
        match role {
            WatchRole::Directory => self.dir_mask |= mask,
            WatchRole::Child => self.nondir_mask |= mask,
            WatchRole::Both => {
                self.dir_mask |= mask;
                self.nondir_mask |= mask;
            }
        }
    }

    /// Clear the given role's mask.
    pub fn clear(&mut self, role: WatchRole) {
        match role {
            WatchRole::Directory => self.dir_mask = EventMask::empty(),
            WatchRole::Child => self.nondir_mask = EventMask::empty(),
            WatchRole::Both => {
                self.dir_mask = EventMask::empty();
                self.nondir_mask = EventMask::empty();
            }
        }
    }
}

/// Path-keyed map of watch records.
#[derive(Debug, Default)]
pub struct WatchTable {
    records: HashMap<PathBuf, WatchRecord>,
}

impl WatchTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&WatchRecord> {
        self.records.get(path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut WatchRecord> {
        self.records.get_mut(path)
    }

    /// Insert a record, keyed by its path.
    pub fn insert(&mut self, record: WatchRecord) {
        self.records.insert(record.path.clone(), record);
    }

    pub fn remove(&mut self, path: &Path) -> Option<WatchRecord> {
        self.records.remove(path)
    }

    /// Snapshot of every tracked path.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.records.keys().cloned().collect()
    }

    /// Snapshot of every tracked path strictly below `dir`.
    ///
    /// Subtree teardown deletes from the table while walking it, so the
    /// matching keys are collected up front.
    #[must_use]
    pub fn descendants_of(&self, dir: &Path) -> Vec<PathBuf> {
        self.records
            .keys()
            .filter(|p| p.as_path() != dir && p.starts_with(dir))
            .cloned()
            .collect()
    }
}
