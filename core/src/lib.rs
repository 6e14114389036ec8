//! Navigation core of a comic-book reader.
//!
//! Archives and image files are loaded into a [`Book`]: an ordered run of page collections
//! read as one continuous sequence, skipping pages that failed to extract. A
//! [`ReadingSession`] owns the live book and maps reader actions onto it.

#![deny(missing_debug_implementations)]

pub mod book;
pub mod fs;
pub mod load;
pub mod log;
pub mod session;
pub mod store;
pub mod types;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

pub use book::{Book, PageAppender, PageCollection, Position, PositionError};
pub use load::{LoadError, LoadOptions, LoadWarning, LoadedBook, Loader, MemorySource, PageSource};
pub use session::{ReadingSession, ReadingStatus, Spread};
pub use store::{ReaderSettings, SettingsStore};
pub use types::{ArchiveKind, FitMode, PageBuffer, SeekDirection, is_valid_page, page_buffer};

/// Returns the version of the core crate for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
