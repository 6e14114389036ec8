//! Persistable reading position (bookmark).

use serde::{Deserialize, Serialize};

/// Why a position could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("bookmark lists no files")]
    NoFiles,
    #[error("file number {file_number} is out of range for {file_count} files")]
    FileOutOfRange { file_number: usize, file_count: usize },
}

/// Snapshot of where the reader is: every file of the book, which one is current, and the
/// zero-based page inside it.
///
/// Paths are kept exactly as captured, native separators included. Nothing here touches the
/// filesystem; checking that the files still exist is up to whoever reloads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PositionRecord", into = "PositionRecord")]
pub struct Position {
    files: Vec<String>,
    file_number: usize,
    page_number: usize,
}

/// Wire shape of a [`Position`]; validated on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRecord {
    files: Vec<String>,
    file_number: usize,
    page_number: usize,
}

impl TryFrom<PositionRecord> for Position {
    type Error = PositionError;

    fn try_from(record: PositionRecord) -> Result<Self, Self::Error> {
        Position::new(record.files, record.file_number, record.page_number)
    }
}

impl From<Position> for PositionRecord {
    fn from(position: Position) -> Self {
        Self {
            files: position.files,
            file_number: position.file_number,
            page_number: position.page_number,
        }
    }
}

impl Position {
    pub fn new(
        files: Vec<String>,
        file_number: usize,
        page_number: usize,
    ) -> Result<Self, PositionError> {
        if files.is_empty() {
            return Err(PositionError::NoFiles);
        }
        if file_number >= files.len() {
            return Err(PositionError::FileOutOfRange { file_number, file_count: files.len() });
        }
        Ok(Self { files, file_number, page_number })
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Zero-based index into [`files`](Self::files).
    pub fn file_number(&self) -> usize {
        self.file_number
    }

    /// Zero-based page inside the current file.
    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn current_file(&self) -> &str {
        &self.files[self.file_number]
    }

    /// Directory part of the current file, trailing separator included.
    ///
    /// Returns an empty string for a bare file name.
    pub fn directory(&self) -> &str {
        let path = self.current_file();
        match path.rfind(['/', '\\']) {
            Some(split) => &path[..=split],
            None => "",
        }
    }

    /// Current file name without directory and without its last extension.
    pub fn base_name(&self) -> &str {
        let path = self.current_file();
        let name = &path[self.directory().len()..];
        match name.rfind('.') {
            Some(dot) if dot > 0 => &name[..dot],
            _ => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(files: &[&str], file_number: usize) -> Position {
        Position::new(files.iter().map(|s| s.to_string()).collect(), file_number, 4).unwrap()
    }

    #[test]
    fn derives_directory_and_base_name_with_native_separators() {
        let windows = position(&["C:\\comics\\one.cbz", "C:\\comics\\two.cbr"], 1);
        assert_eq!(windows.directory(), "C:\\comics\\");
        assert_eq!(windows.base_name(), "two");

        let unix = position(&["/home/me/comics/vol.1.cbz"], 0);
        assert_eq!(unix.directory(), "/home/me/comics/");
        assert_eq!(unix.base_name(), "vol.1");
    }

    #[test]
    fn bare_names_have_no_directory() {
        let bare = position(&["README"], 0);
        assert_eq!(bare.directory(), "");
        assert_eq!(bare.base_name(), "README");

        let hidden = position(&[".cbz"], 0);
        assert_eq!(hidden.base_name(), ".cbz");
    }

    #[test]
    fn rejects_out_of_range_file_number() {
        let err = Position::new(vec!["a.cbz".into()], 1, 0).unwrap_err();
        assert_eq!(err, PositionError::FileOutOfRange { file_number: 1, file_count: 1 });
        assert_eq!(Position::new(Vec::new(), 0, 0).unwrap_err(), PositionError::NoFiles);
    }

    #[test]
    fn serializes_with_camel_case_field_contract() {
        let position = position(&["a.cbz", "b.cbz"], 1);
        let json = serde_json::to_value(&position).unwrap();
        assert_eq!(json["files"][1], "b.cbz");
        assert_eq!(json["fileNumber"], 1);
        assert_eq!(json["pageNumber"], 4);

        let back: Position = serde_json::from_value(json).unwrap();
        assert_eq!(back, position);
    }

    #[test]
    fn deserialization_validates_file_number() {
        let raw = r#"{"files":["a.cbz"],"fileNumber":3,"pageNumber":0}"#;
        let err = serde_json::from_str::<Position>(raw).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
