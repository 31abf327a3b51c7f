//! Watch coordination for trigger-style native event facilities.
//!
//! kqueue, FEN and event ports report that *something* happened to a
//! registered object, but they do not watch directories recursively and
//! they have no notion of "a file was created". This crate layers a
//! coordinator on top of such a facility: directory watches are expanded
//! to their immediate children, contents-changed notifications are
//! reconciled against a fresh directory listing to synthesize Create and
//! Remove events, and a rename of a watched directory fans out to every
//! descendant still tracked.
//!
//! The native facility is abstracted behind the [`Trigger`] trait; one
//! implementation exists per platform and the [`Coordinator`] is generic
//! over it. Delivered [`Event`]s carry the portable kinds that fired plus
//! any requested native flavors, and share the raw native notification
//! they were derived from.

mod coordinator;
mod error;
mod table;
#[cfg(test)]
mod testing;
mod trigger;

pub use crate::coordinator::{Config, Coordinator};
pub use crate::error::{TriggerError, WatchError};
pub use crate::table::{WatchRecord, WatchRole, WatchTable};
pub use crate::trigger::{NativeHandle, Trigger};
pub use rescan_events::{Event, EventMask, FlagPair, TranslationTable};
