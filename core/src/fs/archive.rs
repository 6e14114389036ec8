//! ZIP/CBZ archive extraction.

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, warn};
use zip::read::ZipArchive;

use crate::load::PageSource;
use crate::types::ArchiveKind;

use super::{Result, util};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Outer,
    Nested(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryClass {
    Image,
    Text,
    Archive,
}

#[derive(Debug, Clone)]
struct ListedEntry {
    index: usize,
    path: PathBuf,
    class: EntryClass,
}

#[derive(Debug, Clone)]
struct EntryRef {
    container: Container,
    index: usize,
    path: PathBuf,
}

/// Pages of a zip-based comic archive, extracted lazily in natural name order.
///
/// A zip/cbz stored inside the archive is opened in memory and its images are spliced in at
/// the position of the nested entry. Only one level of nesting is expanded.
pub struct ZipPages {
    location: String,
    archive: ZipArchive<File>,
    nested: Vec<ZipArchive<Cursor<Vec<u8>>>>,
    pages: Vec<EntryRef>,
    info: Option<EntryRef>,
}

impl fmt::Debug for ZipPages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipPages")
            .field("location", &self.location)
            .field("pages", &self.pages.len())
            .field("nested", &self.nested.len())
            .finish()
    }
}

impl ZipPages {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening archive {:?}", path))?;
        let mut archive =
            ZipArchive::new(file).with_context(|| format!("reading archive {:?}", path))?;

        let mut nested = Vec::new();
        let mut pages = Vec::new();
        let mut info = None;

        for entry in list_entries(&mut archive)? {
            match entry.class {
                EntryClass::Image => pages.push(EntryRef {
                    container: Container::Outer,
                    index: entry.index,
                    path: entry.path,
                }),
                EntryClass::Text => {
                    info = Some(EntryRef {
                        container: Container::Outer,
                        index: entry.index,
                        path: entry.path,
                    })
                }
                EntryClass::Archive => {
                    let Some(mut inner) = open_nested(&mut archive, &entry) else {
                        continue;
                    };
                    let slot = Container::Nested(nested.len());
                    for inner_entry in list_entries(&mut inner)? {
                        let entry_ref = EntryRef {
                            container: slot,
                            index: inner_entry.index,
                            path: inner_entry.path,
                        };
                        match inner_entry.class {
                            EntryClass::Image => pages.push(entry_ref),
                            EntryClass::Text => info = Some(entry_ref),
                            EntryClass::Archive => {
                                debug!(
                                    target: "fs::archive",
                                    entry = ?entry_ref.path,
                                    "ignoring doubly nested archive"
                                )
                            }
                        }
                    }
                    nested.push(inner);
                }
            }
        }

        debug!(
            target: "fs::archive",
            path = ?path,
            pages = pages.len(),
            nested = nested.len(),
            "opened archive"
        );
        Ok(Self { location: path.to_string_lossy().into_owned(), archive, nested, pages, info })
    }

    /// Archive-relative names of the pages, in reading order.
    pub fn page_names(&self) -> impl Iterator<Item = &Path> {
        self.pages.iter().map(|entry| entry.path.as_path())
    }

    fn read_entry(&mut self, container: Container, index: usize) -> Result<Vec<u8>> {
        match container {
            Container::Outer => read_index(&mut self.archive, index),
            Container::Nested(slot) => {
                let archive = self
                    .nested
                    .get_mut(slot)
                    .ok_or_else(|| anyhow!("nested archive {slot} missing"))?;
                read_index(archive, index)
            }
        }
    }
}

impl PageSource for ZipPages {
    fn location(&self) -> &str {
        &self.location
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn read_page(&mut self, index: usize) -> Result<Vec<u8>> {
        let entry = self
            .pages
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("page {index} out of range for {}", self.location))?;
        self.read_entry(entry.container, entry.index)
            .with_context(|| format!("extracting {:?} from {}", entry.path, self.location))
    }

    fn info_text(&mut self) -> Result<Option<String>> {
        let Some(entry) = self.info.clone() else {
            return Ok(None);
        };
        let bytes = self.read_entry(entry.container, entry.index)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

fn open_nested(
    archive: &mut ZipArchive<File>,
    entry: &ListedEntry,
) -> Option<ZipArchive<Cursor<Vec<u8>>>> {
    if ArchiveKind::detect(&entry.path) != ArchiveKind::Zip {
        warn!(target: "fs::archive", entry = ?entry.path, "nested archive format not supported");
        return None;
    }

    let opened = read_index(archive, entry.index)
        .and_then(|bytes| ZipArchive::new(Cursor::new(bytes)).map_err(anyhow::Error::from));
    match opened {
        Ok(inner) => Some(inner),
        Err(err) => {
            warn!(target: "fs::archive", entry = ?entry.path, "skipping nested archive: {err:#}");
            None
        }
    }
}

fn read_index<R: Read + Seek>(archive: &mut ZipArchive<R>, index: usize) -> Result<Vec<u8>> {
    let mut file = archive.by_index(index)?;
    let mut bytes = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn list_entries<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<ListedEntry>> {
    let mut entries = Vec::new();

    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }

        let Some(enclosed) = file.enclosed_name() else {
            continue;
        };
        let Some(path) = util::sanitize_zip_path(enclosed) else {
            continue;
        };
        if util::is_hidden(&path) {
            continue;
        }

        let class = if util::is_supported_image(&path) {
            EntryClass::Image
        } else if util::is_info_text(&path) {
            EntryClass::Text
        } else if util::is_supported_archive(&path) {
            EntryClass::Archive
        } else {
            continue;
        };
        entries.push(ListedEntry { index, path, class });
    }

    entries.sort_by(|a, b| util::natural_cmp_path(&a.path, &b.path));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::CompressionMethod;
    use zip::write::FileOptions;

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for &(name, bytes) in files {
            if name.ends_with('/') {
                zip.add_directory(name.trim_end_matches('/'), options).unwrap();
            } else {
                zip.start_file(name, options).unwrap();
                zip.write_all(bytes).unwrap();
            }
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn lists_image_entries_in_natural_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("demo.cbz");
        std::fs::write(
            &path,
            zip_bytes(&[
                ("10.jpg", "ten".as_bytes()),
                ("2.png", "two".as_bytes()),
                ("001.jpeg", "one".as_bytes()),
                ("x.bin", "?".as_bytes()),
            ]),
        )
        .unwrap();

        let mut pages = ZipPages::open(&path).expect("open archive");
        let names: Vec<String> =
            pages.page_names().map(|p| p.to_string_lossy().replace('\\', "/")).collect();
        assert_eq!(names, vec!["001.jpeg", "2.png", "10.jpg"]);
        assert_eq!(pages.read_page(2).unwrap(), b"ten");
        assert!(pages.read_page(3).is_err());
        assert!(pages.info_text().unwrap().is_none());
    }

    #[test]
    fn skips_directories_and_hidden_files_and_reads_info_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("demo.cbz");
        std::fs::write(
            &path,
            zip_bytes(&[
                ("pages/", "".as_bytes()),
                (".hidden.png", "no".as_bytes()),
                ("pages/cover.png", "cover".as_bytes()),
                ("pages/.thumb.jpg", "no".as_bytes()),
                ("release.nfo", "ripped with care".as_bytes()),
            ]),
        )
        .unwrap();

        let mut pages = ZipPages::open(&path).unwrap();
        assert_eq!(pages.page_count(), 1);
        assert_eq!(pages.info_text().unwrap().as_deref(), Some("ripped with care"));
    }

    #[test]
    fn expands_nested_archive_in_place() {
        let inner =
            zip_bytes(&[("b1.png", "inner-1".as_bytes()), ("b2.png", "inner-2".as_bytes())]);
        let dir = tempdir().unwrap();
        let path = dir.path().join("omnibus.cbz");
        let outer = zip_bytes(&[
            ("a.png", "outer-a".as_bytes()),
            ("b.cbz", inner.as_slice()),
            ("c.png", "outer-c".as_bytes()),
        ]);
        std::fs::write(&path, outer).unwrap();

        let mut pages = ZipPages::open(&path).unwrap();
        let contents: Vec<Vec<u8>> =
            (0..pages.page_count()).map(|i| pages.read_page(i).unwrap()).collect();
        assert_eq!(
            contents,
            vec![b"outer-a".to_vec(), b"inner-1".to_vec(), b"inner-2".to_vec(), b"outer-c".to_vec()]
        );
    }

    #[test]
    fn rejects_files_that_are_not_zip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.cbz");
        std::fs::write(&path, b"definitely not a zip").unwrap();
        assert!(ZipPages::open(&path).is_err());
    }
}
