//! Shared data structures exchanged between the navigation core, the loader, and the shell.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Raw bytes of one page as produced by the extraction service.
///
/// Pages are shared, never copied: navigation hands out clones of the same `Arc`, so callers can
/// compare buffers by identity with [`Arc::ptr_eq`].
pub type PageBuffer = Arc<[u8]>;

/// Build a [`PageBuffer`] from owned bytes.
pub fn page_buffer(bytes: impl Into<Vec<u8>>) -> PageBuffer {
    Arc::from(bytes.into())
}

/// Returns `true` when the slot holds a page worth displaying.
///
/// Null slots, buffers shorter than two bytes, and buffers starting with two zero bytes are
/// placeholders left behind by failed decompression.
pub fn is_valid_page(page: Option<&[u8]>) -> bool {
    match page {
        Some(bytes) if bytes.len() >= 2 => !(bytes[0] == 0 && bytes[1] == 0),
        _ => false,
    }
}

/// Direction of a skip-invalid walk through a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Backward,
}

impl SeekDirection {
    pub(crate) fn step(self) -> isize {
        match self {
            SeekDirection::Forward => 1,
            SeekDirection::Backward => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Rar,
    Unknown,
}

impl ArchiveKind {
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()).map(|s| s.to_ascii_lowercase()) {
            Some(ref ext) if ext == "cbz" || ext == "zip" => ArchiveKind::Zip,
            Some(ref ext) if ext == "cbr" || ext == "rar" => ArchiveKind::Rar,
            _ => ArchiveKind::Unknown,
        }
    }

    /// Identify an archive by its leading bytes, falling back to the extension when the file
    /// cannot be read or matches no known signature. Renamed `.cbr` files holding a zip are
    /// common.
    pub fn sniff(path: &Path) -> Self {
        let mut magic = [0u8; 7];
        let read = File::open(path).and_then(|mut file| file.read(&mut magic));
        match read {
            Ok(len) => Self::from_magic(&magic[..len]).unwrap_or_else(|| Self::detect(path)),
            Err(_) => Self::detect(path),
        }
    }

    fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
            Some(ArchiveKind::Zip)
        } else if bytes.starts_with(b"Rar!\x1a\x07") {
            Some(ArchiveKind::Rar)
        } else {
            None
        }
    }
}

/// What a selection of paths handed to the loader consists of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Archives,
    Images,
}

/// Display fit preference persisted alongside bookmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FitMode {
    #[default]
    Original,
    FitHeight,
    FitWidth,
    FitScreen,
}

impl FitMode {
    /// Cycle through the fit modes in the order the viewer toggles them.
    pub fn toggled(self) -> Self {
        match self {
            FitMode::Original => FitMode::FitHeight,
            FitMode::FitHeight => FitMode::FitWidth,
            FitMode::FitWidth => FitMode::FitScreen,
            FitMode::FitScreen => FitMode::Original,
        }
    }
}
