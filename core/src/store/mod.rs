//! Persistent reader state.

pub mod settings;

pub use settings::{ReaderSettings, SettingsStore};

pub type Result<T> = crate::Result<T>;
