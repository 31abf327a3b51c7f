//! The watch coordinator: public surface, monitor loop and directory
//! reconciliation.
//!
//! Trigger-style facilities only watch objects registered explicitly, so
//! a directory watch means "something changed in here" and nothing more.
//! The coordinator closes the gap: it expands a directory watch to the
//! directory's immediate children, re-scans on contents-changed
//! notifications to tell creations from removals, and propagates a
//! rename of a watched directory to every descendant still tracked.

use crate::error::{TriggerError, WatchError};
use crate::table::{WatchRecord, WatchRole, WatchTable};
use crate::trigger::Trigger;
use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use rescan_events::{Event, EventMask};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Coordinator tunables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Capacity of the outbound event channel. Zero gives a rendezvous
    /// channel: a slow consumer delays, but never drops, processing of
    /// subsequent native notifications. Consumers must keep draining
    /// until [`Coordinator::close`] returns.
    #[serde(default)]
    pub event_capacity: usize,
}

/// Outcome of registering interest in a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registered {
    /// The path was not previously watched.
    New,
    /// The path was already watched; the mask was merged in.
    Merged,
}

struct Shared<T: Trigger> {
    trigger: T,
    table: Mutex<WatchTable>,
    events: Sender<Event<T::Raw>>,
}

/// The watch coordinator.
///
/// Construction spawns a dedicated monitor thread that blocks on the
/// trigger's `wait` and feeds the event channel. All public operations
/// serialize on a single lock with the table-mutating portion of event
/// processing.
pub struct Coordinator<T: Trigger> {
    shared: Arc<Shared<T>>,
    stopped: Receiver<()>,
    monitor: Option<JoinHandle<()>>,
    closed: bool,
}

impl<T: Trigger> Coordinator<T> {
    /// Initialize the native facility and start the monitor thread.
    ///
    /// Returns the coordinator together with the ordered event channel.
    /// An initialization failure is fatal: no watcher is constructed.
    pub fn new(
        trigger: T,
        config: Config,
    ) -> Result<(Self, Receiver<Event<T::Raw>>), WatchError> {
        trigger.init().map_err(WatchError::Init)?;

        let (event_tx, event_rx) = bounded(config.event_capacity);
        let (stopped_tx, stopped_rx) = bounded(1);
        let shared = Arc::new(Shared {
            trigger,
            table: Mutex::new(WatchTable::new()),
            events: event_tx,
        });

        let monitor = thread::Builder::new()
            .name("rescan-monitor".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || shared.monitor(stopped_tx)
            })?;

        Ok((
            Self {
                shared,
                stopped: stopped_rx,
                monitor: Some(monitor),
                closed: false,
            },
            event_rx,
        ))
    }

    /// Watch a path for the given event kinds.
    ///
    /// Fails with [`WatchError::NotFound`] if the path does not exist. A
    /// directory is expanded: every immediate child is registered as a
    /// non-directory watch carrying the same mask. Watching an
    /// already-watched path merges the mask instead of replacing it.
    pub fn watch(&self, path: &Path, mask: EventMask) -> Result<(), WatchError> {
        let meta = stat(path)?;
        let mut table = self.shared.table.lock();
        self.shared.watch_tree(&mut table, path, mask, &meta)
    }

    /// Stop watching a path.
    ///
    /// The path must still exist: callers unwatch before a path vanishes
    /// from the filesystem for reliable cleanup. For a directory, direct
    /// children are unwatched first, tolerating children already gone
    /// from the table.
    pub fn unwatch(&self, path: &Path) -> Result<(), WatchError> {
        let meta = stat(path)?;
        let mut table = self.shared.table.lock();
        self.shared.unwatch_tree(&mut table, path, &meta)
    }

    /// Replace a path's mask: unwatch, then watch again with `new_mask`.
    ///
    /// Best effort: if the unwatch fails, prior state is untouched. If
    /// the re-watch fails after a successful unwatch, the error is
    /// propagated and the path is left unmonitored; the caller must
    /// re-verify it. The old mask is accepted for surface symmetry only,
    /// since the unwatch step clears all prior interest.
    pub fn rewatch(
        &self,
        path: &Path,
        _old_mask: EventMask,
        new_mask: EventMask,
    ) -> Result<(), WatchError> {
        let meta = stat(path)?;
        let mut table = self.shared.table.lock();
        self.shared.unwatch_tree(&mut table, path, &meta)?;
        self.shared.watch_tree(&mut table, path, new_mask, &meta)
    }

    /// Paths currently tracked by the watch table.
    #[must_use]
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.shared.table.lock().paths()
    }

    /// Stop the monitor thread, unwatch every remaining entry and release
    /// the native facility.
    ///
    /// Always terminates once the worker acknowledges the stop signal.
    /// Individual unwatch failures during teardown are logged and the
    /// first is returned, but they never abort teardown of the remaining
    /// entries.
    pub fn close(&mut self) -> Result<(), WatchError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.shared.trigger.stop().map_err(WatchError::Shutdown)?;
        // The worker acknowledges once the stop wakeup is observed.
        let _ = self.stopped.recv();
        if let Some(handle) = self.monitor.take() {
            let _ = handle.join();
        }

        let mut table = self.shared.table.lock();
        let mut first_err: Option<WatchError> = None;
        for path in table.paths() {
            match self.shared.unwatch_one(&mut table, &path, WatchRole::Both) {
                Ok(()) | Err(WatchError::NotWatched(_)) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unwatch failed during teardown");
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Err(e) = self.shared.trigger.close() {
            warn!(error = %e, "closing native facility failed");
            first_err.get_or_insert(WatchError::Shutdown(e));
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<T: Trigger> Drop for Coordinator<T> {
    fn drop(&mut self) {
        if !self.closed
            && let Err(e) = self.close()
        {
            warn!(error = %e, "close during drop failed");
        }
    }
}

impl<T: Trigger> Shared<T> {
    /// Register `path` itself and, if it is a directory, its immediate
    /// children under the child role.
    fn watch_tree(
        &self,
        table: &mut WatchTable,
        path: &Path,
        mask: EventMask,
        meta: &fs::Metadata,
    ) -> Result<(), WatchError> {
        self.watch_one(table, path, mask, WatchRole::Directory, meta)?;
        if meta.is_dir() {
            for entry in fs::read_dir(path)? {
                let entry = entry?;
                let child_meta = entry.metadata()?;
                self.watch_one(table, &entry.path(), mask, WatchRole::Child, &child_meta)?;
            }
        }
        Ok(())
    }

    /// Clear interest in `path`, children first for a directory.
    fn unwatch_tree(
        &self,
        table: &mut WatchTable,
        path: &Path,
        meta: &fs::Metadata,
    ) -> Result<(), WatchError> {
        if meta.is_dir() {
            for entry in fs::read_dir(path)? {
                let entry = entry?;
                match self.unwatch_one(table, &entry.path(), WatchRole::Child) {
                    Ok(()) | Err(WatchError::NotWatched(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        self.unwatch_one(table, path, WatchRole::Directory)
    }

    /// Merge interest for a single path and (re)register it natively.
    fn watch_one(
        &self,
        table: &mut WatchTable,
        path: &Path,
        mask: EventMask,
        role: WatchRole,
        meta: &fs::Metadata,
    ) -> Result<Registered, WatchError> {
        let registration = |source| WatchError::Registration {
            path: path.to_path_buf(),
            source,
        };
        let translation = self.trigger.translation();

        if let Some(record) = table.get_mut(path) {
            record.merge(role, mask);
            let raw = translation.encode(record.requested(), meta.is_dir());
            self.trigger
                .register(meta, record, raw)
                .map_err(registration)?;
            return Ok(Registered::Merged);
        }

        let handle = self
            .trigger
            .new_watch_state(path, meta)
            .map_err(registration)?;
        let mut record = WatchRecord::new(path.to_path_buf(), meta.clone(), handle);
        record.merge(role, mask);
        let raw = translation.encode(record.requested(), meta.is_dir());
        self.trigger
            .register(meta, &record, raw)
            .map_err(registration)?;
        self.trigger.record(handle, path);
        table.insert(record);
        Ok(Registered::New)
    }

    /// Clear one role's interest for a single path. Re-registers with the
    /// remaining mask if the other role still holds interest, otherwise
    /// deletes the record.
    fn unwatch_one(
        &self,
        table: &mut WatchTable,
        path: &Path,
        role: WatchRole,
    ) -> Result<(), WatchError> {
        let Some(record) = table.get_mut(path) else {
            return Err(WatchError::NotWatched(path.to_path_buf()));
        };
        record.clear(role);
        match self.trigger.unregister(record) {
            Ok(()) => {}
            Err(TriggerError::NotWatched) => {
                return Err(WatchError::NotWatched(path.to_path_buf()));
            }
            Err(source) => {
                return Err(WatchError::Registration {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
        if record.requested().is_empty() {
            self.trigger.delete(record);
            table.remove(path);
        } else {
            let meta = record.meta.clone();
            let raw = self
                .trigger
                .translation()
                .encode(record.requested(), record.is_dir());
            self.trigger
                .register(&meta, record, raw)
                .map_err(|source| WatchError::Registration {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        Ok(())
    }

    /// The dedicated wait loop. Runs until the trigger reports the stop
    /// wakeup, which is acknowledged through `stopped`.
    fn monitor(&self, stopped: Sender<()>) {
        loop {
            let outcome = self.trigger.wait();
            if self.trigger.is_stop(&outcome) {
                let _ = stopped.send(());
                return;
            }
            match outcome {
                Err(TriggerError::Interrupted) => {}
                Err(e) => warn!(error = %e, "native wait failed"),
                Ok(raw) => {
                    for event in self.process(raw) {
                        if self.events.send(event).is_err() {
                            // Receiver gone; processing continues so the
                            // table stays coherent.
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Handle one native notification: resolve, decode, refresh the
    /// registration, synthesize portable events and update the table.
    fn process(&self, raw: T::Raw) -> Vec<Event<T::Raw>> {
        let translation = self.trigger.translation();
        let mut table = self.table.lock();

        let (path, fired) = match self.trigger.resolve(&raw) {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!(error = %e, "notification did not resolve to a watch");
                return Vec::new();
            }
        };
        let Some((requested, is_dir)) = table.get(&path).map(|r| (r.requested(), r.is_dir()))
        else {
            debug!(path = %path.display(), "notification for a path no longer tracked");
            return Vec::new();
        };

        let decoded = translation.decode(fired, requested);
        let removal = translation.raw_for(EventMask::REMOVE | EventMask::RENAME);
        let contents_changed = translation.raw_for(EventMask::WRITE);

        if fired & removal == 0 {
            // The object survived: refresh the registration, since a
            // directory whose membership changed may need a new mask.
            if let Ok(meta) = fs::metadata(&path)
                && let Some(record) = table.get_mut(&path)
            {
                let raw_mask = translation.encode(requested, meta.is_dir());
                match self.trigger.register(&meta, record, raw_mask) {
                    Ok(()) => record.meta = meta,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "refresh failed, dropping watch");
                        self.trigger.delete(record);
                        table.remove(&path);
                        return Vec::new();
                    }
                }
            }
        }

        // Nothing observable to report.
        if decoded.is_empty() && (!is_dir || fired & contents_changed == 0) {
            return Vec::new();
        }

        let payload = Arc::new(raw);
        let events = if is_dir {
            self.reconcile_dir(&mut table, &path, fired, decoded, &payload)
        } else {
            vec![Event::new(path.clone(), decoded, false, Arc::clone(&payload))]
        };

        if fired & removal != 0
            && let Some(record) = table.remove(&path)
        {
            self.trigger.delete(&record);
        }
        events
    }

    /// Directory reconciliation: tear down the subtree on remove/rename,
    /// or re-scan the directory on a contents change.
    fn reconcile_dir(
        &self,
        table: &mut WatchTable,
        path: &Path,
        fired: u64,
        decoded: EventMask,
        payload: &Arc<T::Raw>,
    ) -> Vec<Event<T::Raw>> {
        let translation = self.trigger.translation();
        let mut events = Vec::new();

        if fired & translation.raw_for(EventMask::REMOVE | EventMask::RENAME) != 0 {
            // Directory removal carries a spurious write flavor on these
            // facilities; strip every write request bit from the event.
            let kinds = decoded & !translation.mask_for(EventMask::WRITE);
            if !kinds.is_empty() {
                events.push(Event::new(path.to_path_buf(), kinds, true, Arc::clone(payload)));
            }
            if fired & translation.raw_for(EventMask::RENAME) != 0 {
                // The facility does not re-notify for files whose parent
                // moved; synthesize per-descendant renames ourselves.
                let rename = translation.mask_for(EventMask::RENAME);
                for child in table.descendants_of(path) {
                    let Some(record) = table.remove(&child) else {
                        continue;
                    };
                    match self.trigger.unregister(&record) {
                        Ok(()) | Err(TriggerError::NotWatched) => {}
                        Err(e) if e.is_not_found() => {}
                        Err(e) => {
                            warn!(path = %child.display(), error = %e, "failed to stop watching moved path");
                        }
                    }
                    self.trigger.delete(&record);
                    if record.requested().intersects(rename) {
                        events.push(Event::synthesized(
                            record.path.clone(),
                            record.requested() & rename,
                            record.is_dir(),
                        ));
                    }
                }
            }
            return events;
        }

        if fired & translation.raw_for(EventMask::WRITE) != 0 {
            let Some(parent_mask) = table.get(path).map(|r| r.dir_mask) else {
                return events;
            };
            // A directory tracked only as a child of a watched parent
            // carries no directory interest of its own; re-scanning it
            // would insert interest-free records for its entries.
            if parent_mask.is_empty() {
                return events;
            }
            let entries = match fs::read_dir(path) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    // Directory vanished; its removal notification is
                    // expected imminently.
                    return events;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "directory rescan failed");
                    return events;
                }
            };
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "unreadable directory entry");
                        continue;
                    }
                };
                let child = entry.path();
                let child_meta = match entry.metadata() {
                    Ok(meta) => meta,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        if parent_mask.contains(EventMask::REMOVE) {
                            // The listing's file type is still at hand
                            // even though the entry is gone.
                            let was_dir = entry.file_type().is_ok_and(|t| t.is_dir());
                            events.push(Event::new(
                                child,
                                EventMask::REMOVE,
                                was_dir,
                                Arc::clone(payload),
                            ));
                        }
                        continue;
                    }
                    Err(e) => {
                        warn!(path = %child.display(), error = %e, "stat of directory entry failed");
                        continue;
                    }
                };
                match self.watch_one(table, &child, parent_mask, WatchRole::Child, &child_meta) {
                    Ok(Registered::Merged) => {}
                    Ok(Registered::New) => {
                        if parent_mask.contains(EventMask::CREATE) {
                            events.push(Event::new(
                                child,
                                EventMask::CREATE,
                                child_meta.is_dir(),
                                Arc::clone(payload),
                            ));
                        }
                    }
                    Err(e) if e.is_not_found() => {
                        if parent_mask.contains(EventMask::REMOVE) {
                            events.push(Event::new(
                                child,
                                EventMask::REMOVE,
                                child_meta.is_dir(),
                                Arc::clone(payload),
                            ));
                        }
                    }
                    Err(e) => {
                        warn!(path = %child.display(), error = %e, "watching directory entry failed");
                    }
                }
            }
        }
        events
    }
}

fn stat(path: &Path) -> Result<fs::Metadata, WatchError> {
    fs::metadata(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            WatchError::NotFound {
                path: path.to_path_buf(),
                source,
            }
        } else {
            WatchError::Io(source)
        }
    })
}
