//! Portable event mask flags.
//!
//! The low bits are the portable vocabulary shared by every platform.
//! Bits above them are free for platform triggers to define request flags
//! for native-only event flavors (attribute changes, size extension, and
//! the like); those bits pass through translation untouched, so the mask
//! type retains unknown bits instead of truncating them.

use bitflags::bitflags;

bitflags! {
    /// Set of event kinds a caller is interested in, or a set of kinds
    /// carried by a delivered event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u64 {
        /// Entry created inside a watched directory.
        const CREATE = 1 << 0;
        /// Watched object was deleted.
        const REMOVE = 1 << 1;
        /// Data was written to the watched object.
        const WRITE = 1 << 2;
        /// Watched object was renamed or moved away.
        const RENAME = 1 << 3;

        /// All portable kinds.
        const PORTABLE = Self::CREATE.bits()
            | Self::REMOVE.bits()
            | Self::WRITE.bits()
            | Self::RENAME.bits();

        // Platform triggers define request bits for their native-only
        // flavors above the portable range.
        const _ = !0;
    }
}
