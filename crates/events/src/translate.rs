//! Translation between the portable vocabulary and a platform's native
//! bitmask.
//!
//! On trigger-style facilities a portable kind maps to at most one native
//! flag, but a native flag may be requestable two ways: through the
//! portable kind it stands for, or through a platform-specific request bit
//! for callers that want the native flavor verbatim. Creation has no
//! native flag at all on these platforms; it is observed by rescanning a
//! directory whose contents-changed flag fired.

use crate::mask::EventMask;

/// One native flag together with the mask bits that request it.
#[derive(Debug, Clone, Copy)]
pub struct FlagPair {
    /// Platform-specific request bit for this flag, if the platform
    /// exposes one (empty for flags only reachable via a portable kind).
    pub native: EventMask,
    /// Portable kind this flag stands for (empty for native-only flags).
    pub portable: EventMask,
    /// Bit value of the flag in the kernel's raw bitmask.
    pub raw: u64,
}

/// A platform's complete flag table. Supplied by the trigger
/// implementation; all operations are pure.
#[derive(Debug, Clone, Copy)]
pub struct TranslationTable {
    pairs: &'static [FlagPair],
}

impl TranslationTable {
    /// Build a table from a platform's flag pairs.
    #[must_use]
    pub const fn new(pairs: &'static [FlagPair]) -> Self {
        Self { pairs }
    }

    /// Encode a requested mask into the native bitmask to register.
    ///
    /// Total over all masks: a mask with no native representation encodes
    /// to zero, which registers valid (if silent) interest.
    #[must_use]
    pub fn encode(&self, mask: EventMask, is_dir: bool) -> u64 {
        let mut raw = 0;
        for pair in self.pairs {
            if mask.intersects(pair.native | pair.portable) {
                raw |= pair.raw;
            }
        }
        // Creation inside a directory is only observable via the
        // contents-changed flag.
        if is_dir && mask.contains(EventMask::CREATE) {
            raw |= self.raw_for(EventMask::WRITE);
        }
        raw
    }

    /// Decode fired native flags against what the caller requested.
    ///
    /// A fired flag contributes only the bits (portable kind or native
    /// request bit) the caller actually asked for; nothing is invented.
    #[must_use]
    pub fn decode(&self, fired: u64, requested: EventMask) -> EventMask {
        let mut out = EventMask::empty();
        for pair in self.pairs {
            if fired & pair.raw != 0 {
                out |= requested & (pair.native | pair.portable);
            }
        }
        out
    }

    /// Raw bits of every native flag tied to any of the given kinds.
    #[must_use]
    pub fn raw_for(&self, kinds: EventMask) -> u64 {
        self.pairs
            .iter()
            .filter(|pair| (pair.native | pair.portable).intersects(kinds))
            .fold(0, |raw, pair| raw | pair.raw)
    }

    /// The given kinds widened with every request bit tied to them.
    ///
    /// Used to strip all write flavors from a directory-removal event.
    #[must_use]
    pub fn mask_for(&self, kinds: EventMask) -> EventMask {
        self.pairs
            .iter()
            .filter(|pair| (pair.native | pair.portable).intersects(kinds))
            .fold(kinds, |mask, pair| mask | pair.native | pair.portable)
    }
}
