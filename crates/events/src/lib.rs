//! Rescan events - portable event vocabulary for trigger-style watchers.
//!
//! This crate provides:
//! - [`EventMask`] bitflags for the portable event kinds
//! - [`Event`] records delivered to consumers
//! - [`TranslationTable`] mapping portable masks to a platform's native
//!   bitmask and back
//!
//! # Example
//!
//! ```rust
//! use rescan_events::{EventMask, FlagPair, TranslationTable};
//!
//! // A minimal platform table: one native flag per portable kind.
//! static TABLE: TranslationTable = TranslationTable::new(&[
//!     FlagPair { native: EventMask::empty(), portable: EventMask::REMOVE, raw: 0x1 },
//!     FlagPair { native: EventMask::empty(), portable: EventMask::WRITE, raw: 0x2 },
//!     FlagPair { native: EventMask::empty(), portable: EventMask::RENAME, raw: 0x4 },
//! ]);
//!
//! let raw = TABLE.encode(EventMask::REMOVE | EventMask::WRITE, false);
//! assert_eq!(raw, 0x3);
//!
//! // Only requested kinds decode back out.
//! let decoded = TABLE.decode(0x1 | 0x4, EventMask::REMOVE);
//! assert_eq!(decoded, EventMask::REMOVE);
//! ```

mod event;
mod mask;
mod translate;

// Re-export main types at crate root
pub use event::Event;
pub use mask::EventMask;
pub use translate::{FlagPair, TranslationTable};
