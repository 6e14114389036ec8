//! Neighbouring archives in the same directory, for reading on past the end of a book.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{Result, util};

/// The archive sorted right after `current` in its directory.
pub fn next_in_directory(current: &Path) -> Result<Option<PathBuf>> {
    let (siblings, position) = archives_around(current)?;
    Ok(position.and_then(|index| siblings.get(index + 1).cloned()))
}

/// The archive sorted right before `current` in its directory.
pub fn previous_in_directory(current: &Path) -> Result<Option<PathBuf>> {
    let (siblings, position) = archives_around(current)?;
    Ok(position
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| siblings.get(index).cloned()))
}

/// Archive files next to `current`, ordered by file name, and where `current` sits among them.
fn archives_around(current: &Path) -> Result<(Vec<PathBuf>, Option<usize>)> {
    let directory = match current.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut archives: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(directory).with_context(|| format!("listing {:?}", directory))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if util::is_supported_archive(&path) {
            archives.push(path);
        }
    }
    archives.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let position = current
        .file_name()
        .and_then(|name| archives.iter().position(|path| path.file_name() == Some(name)));
    Ok((archives, position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"PK").unwrap();
        }
    }

    #[test]
    fn finds_neighbours_in_name_order() {
        let dir = tempdir().unwrap();
        touch(dir.path(), &["b.cbz", "a.cbr", "c.zip", "cover.jpg", "d.txt"]);
        let current = dir.path().join("b.cbz");

        assert_eq!(next_in_directory(&current).unwrap(), Some(dir.path().join("c.zip")));
        assert_eq!(previous_in_directory(&current).unwrap(), Some(dir.path().join("a.cbr")));
    }

    #[test]
    fn edges_and_unknown_files_have_no_neighbour() {
        let dir = tempdir().unwrap();
        touch(dir.path(), &["a.cbz", "b.cbz"]);

        assert_eq!(previous_in_directory(&dir.path().join("a.cbz")).unwrap(), None);
        assert_eq!(next_in_directory(&dir.path().join("b.cbz")).unwrap(), None);
        assert_eq!(next_in_directory(&dir.path().join("zzz.cbz")).unwrap(), None);
    }
}
