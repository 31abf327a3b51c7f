//! An in-process [`Trigger`] for exercising the coordinator without a
//! native facility.
//!
//! The mock keeps the same reverse index a real trigger would (native
//! identifier to path) and delivers notifications through a channel, so
//! the monitor thread blocks on `wait` exactly as it would in production.
//! Fault injection covers the races the coordinator must absorb: a
//! registration failing because the object vanished, teardown of a watch
//! that refuses to unregister, and a facility that cannot initialize.

use crate::error::TriggerError;
use crate::table::WatchRecord;
use crate::trigger::{NativeHandle, Trigger};
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use rescan_events::{EventMask, FlagPair, TranslationTable};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const NOTE_DELETE: EventMask = EventMask::from_bits_retain(1 << 16);
pub const NOTE_WRITE: EventMask = EventMask::from_bits_retain(1 << 17);
pub const NOTE_RENAME: EventMask = EventMask::from_bits_retain(1 << 18);
pub const NOTE_ATTRIB: EventMask = EventMask::from_bits_retain(1 << 19);
pub const NOTE_EXTEND: EventMask = EventMask::from_bits_retain(1 << 20);

pub const RAW_DELETE: u64 = 0x01;
pub const RAW_WRITE: u64 = 0x02;
pub const RAW_EXTEND: u64 = 0x04;
pub const RAW_ATTRIB: u64 = 0x08;
pub const RAW_RENAME: u64 = 0x20;

// kqueue-flavored flag table: attrib is native-only, extend is a second
// write flavor.
static TEST_TABLE: TranslationTable = TranslationTable::new(&[
    FlagPair {
        native: NOTE_DELETE,
        portable: EventMask::REMOVE,
        raw: RAW_DELETE,
    },
    FlagPair {
        native: NOTE_WRITE,
        portable: EventMask::WRITE,
        raw: RAW_WRITE,
    },
    FlagPair {
        native: NOTE_RENAME,
        portable: EventMask::RENAME,
        raw: RAW_RENAME,
    },
    FlagPair {
        native: NOTE_ATTRIB,
        portable: EventMask::empty(),
        raw: RAW_ATTRIB,
    },
    FlagPair {
        native: NOTE_EXTEND,
        portable: EventMask::WRITE,
        raw: RAW_EXTEND,
    },
]);

/// Raw notification type of the mock facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockRaw {
    /// Shutdown wakeup.
    Stop,
    /// Flags fired for the watch behind `handle`.
    Fired { handle: u64, flags: u64 },
}

#[derive(Default)]
struct MockState {
    next_handle: u64,
    paths: HashMap<u64, PathBuf>,
    handles: HashMap<PathBuf, u64>,
    masks: HashMap<u64, u64>,
    fail_register: HashSet<PathBuf>,
    fail_unregister: HashSet<PathBuf>,
    fail_init: bool,
    closed: bool,
}

struct MockInner {
    raw_tx: Sender<MockRaw>,
    raw_rx: Receiver<MockRaw>,
    state: Mutex<MockState>,
}

/// The coordinator-facing half of the mock.
pub struct MockTrigger {
    inner: Arc<MockInner>,
}

/// The test-facing half: fires notifications and injects faults.
#[derive(Clone)]
pub struct MockHandle {
    inner: Arc<MockInner>,
}

/// Create a connected trigger/handle pair.
pub fn mock_trigger() -> (MockTrigger, MockHandle) {
    let (raw_tx, raw_rx) = unbounded();
    let inner = Arc::new(MockInner {
        raw_tx,
        raw_rx,
        state: Mutex::new(MockState::default()),
    });
    (
        MockTrigger {
            inner: Arc::clone(&inner),
        },
        MockHandle { inner },
    )
}

impl MockHandle {
    /// Deliver `flags` for the watch currently registered at `path`.
    pub fn fire(&self, path: &Path, flags: u64) {
        let handle = {
            let state = self.inner.state.lock();
            *state.handles.get(path).expect("path is not watched")
        };
        self.fire_handle(handle, flags);
    }

    /// Deliver `flags` for an arbitrary native identifier, watched or not.
    pub fn fire_handle(&self, handle: u64, flags: u64) {
        self.inner
            .raw_tx
            .send(MockRaw::Fired { handle, flags })
            .expect("monitor is gone");
    }

    /// Make every subsequent registration of `path` fail as vanished.
    pub fn fail_register_on(&self, path: &Path) {
        self.inner
            .state
            .lock()
            .fail_register
            .insert(path.to_path_buf());
    }

    /// Make every subsequent unregistration of `path` fail.
    pub fn fail_unregister_on(&self, path: &Path) {
        self.inner
            .state
            .lock()
            .fail_unregister
            .insert(path.to_path_buf());
    }

    /// Make facility initialization fail.
    pub fn fail_init(&self) {
        self.inner.state.lock().fail_init = true;
    }

    /// Whether `path` currently has native state allocated.
    pub fn is_watched(&self, path: &Path) -> bool {
        self.inner.state.lock().handles.contains_key(path)
    }

    /// The encoded mask `path` is registered with, if any.
    pub fn registered_mask(&self, path: &Path) -> Option<u64> {
        let state = self.inner.state.lock();
        let handle = state.handles.get(path)?;
        state.masks.get(handle).copied()
    }

    /// Number of paths with native state allocated.
    pub fn watch_count(&self) -> usize {
        self.inner.state.lock().handles.len()
    }

    /// Whether the facility handle was released.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }
}

impl Trigger for MockTrigger {
    type Raw = MockRaw;

    fn init(&self) -> Result<(), TriggerError> {
        if self.inner.state.lock().fail_init {
            return Err(TriggerError::Native(io::Error::other(
                "mock facility unavailable",
            )));
        }
        Ok(())
    }

    fn translation(&self) -> &TranslationTable {
        &TEST_TABLE
    }

    fn new_watch_state(
        &self,
        _path: &Path,
        _meta: &fs::Metadata,
    ) -> Result<NativeHandle, TriggerError> {
        let mut state = self.inner.state.lock();
        let handle = state.next_handle;
        state.next_handle += 1;
        Ok(NativeHandle(handle))
    }

    fn record(&self, handle: NativeHandle, path: &Path) {
        let mut state = self.inner.state.lock();
        state.paths.insert(handle.0, path.to_path_buf());
        state.handles.insert(path.to_path_buf(), handle.0);
    }

    fn delete(&self, record: &WatchRecord) {
        let mut state = self.inner.state.lock();
        state.paths.remove(&record.handle.0);
        state.handles.remove(&record.path);
        state.masks.remove(&record.handle.0);
    }

    fn register(
        &self,
        _meta: &fs::Metadata,
        record: &WatchRecord,
        raw_mask: u64,
    ) -> Result<(), TriggerError> {
        let mut state = self.inner.state.lock();
        if state.fail_register.contains(&record.path) {
            return Err(TriggerError::Native(io::Error::new(
                io::ErrorKind::NotFound,
                "mock path vanished",
            )));
        }
        state.masks.insert(record.handle.0, raw_mask);
        Ok(())
    }

    fn unregister(&self, record: &WatchRecord) -> Result<(), TriggerError> {
        let mut state = self.inner.state.lock();
        if state.fail_unregister.contains(&record.path) {
            return Err(TriggerError::Native(io::Error::other(
                "mock refuses to unregister",
            )));
        }
        if state.masks.remove(&record.handle.0).is_none() {
            return Err(TriggerError::NotWatched);
        }
        Ok(())
    }

    fn resolve(&self, raw: &MockRaw) -> Result<(PathBuf, u64), TriggerError> {
        let MockRaw::Fired { handle, flags } = raw else {
            return Err(TriggerError::Unresolved);
        };
        let state = self.inner.state.lock();
        state
            .paths
            .get(handle)
            .map(|path| (path.clone(), *flags))
            .ok_or(TriggerError::Unresolved)
    }

    fn wait(&self) -> Result<MockRaw, TriggerError> {
        self.inner
            .raw_rx
            .recv()
            .map_err(|_| TriggerError::Interrupted)
    }

    fn is_stop(&self, outcome: &Result<MockRaw, TriggerError>) -> bool {
        matches!(outcome, Ok(MockRaw::Stop))
    }

    fn stop(&self) -> Result<(), TriggerError> {
        self.inner
            .raw_tx
            .send(MockRaw::Stop)
            .map_err(|_| TriggerError::Native(io::Error::other("monitor is gone")))
    }

    fn close(&self) -> Result<(), TriggerError> {
        self.inner.state.lock().closed = true;
        Ok(())
    }
}
