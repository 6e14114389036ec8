//! RAR/CBR archive extraction.
//!
//! unrar only walks an archive front to back, and an open archive cannot leave the thread that
//! opened it. Every extraction therefore reopens the file and walks the headers, reading the
//! wanted entries and skipping the rest. Pages are pulled in small batches so sequential
//! population does not rescan the archive for every page.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, warn};
use unrar::Archive;

use crate::load::PageSource;

use super::{Result, util};

/// Pages extracted per walk through the archive.
const READ_AHEAD: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
struct RarEntry {
    /// Position of the entry's header in archive order.
    header: usize,
    path: PathBuf,
}

pub struct RarPages {
    location: String,
    path: PathBuf,
    pages: Vec<RarEntry>,
    info: Option<RarEntry>,
    extracted: HashMap<usize, Vec<u8>>,
}

impl fmt::Debug for RarPages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RarPages")
            .field("location", &self.location)
            .field("pages", &self.pages.len())
            .field("buffered", &self.extracted.len())
            .finish()
    }
}

impl RarPages {
    pub fn open(path: &Path) -> Result<Self> {
        let listing = Archive::new(path)
            .open_for_listing()
            .with_context(|| format!("opening archive {:?}", path))?;

        let mut entries = Vec::new();
        for (header, entry) in listing.enumerate() {
            let entry = entry.with_context(|| format!("listing archive {:?}", path))?;
            if entry.is_directory() {
                continue;
            }
            entries.push(RarEntry { header, path: entry.filename });
        }

        let (pages, info) = arrange(entries);
        debug!(target: "fs::archive", path = ?path, pages = pages.len(), "opened rar archive");
        Ok(Self {
            location: path.to_string_lossy().into_owned(),
            path: path.to_path_buf(),
            pages,
            info,
            extracted: HashMap::new(),
        })
    }

    /// Archive-relative names of the pages, in reading order.
    pub fn page_names(&self) -> impl Iterator<Item = &Path> {
        self.pages.iter().map(|entry| entry.path.as_path())
    }

    /// Walk the archive once, buffering every wanted header that is not buffered yet.
    fn extract(&mut self, wanted: &[usize]) -> Result<()> {
        let mut remaining: Vec<usize> =
            wanted.iter().copied().filter(|header| !self.extracted.contains_key(header)).collect();
        if remaining.is_empty() {
            return Ok(());
        }

        let mut archive = Archive::new(&self.path)
            .open_for_processing()
            .with_context(|| format!("opening archive {:?}", self.path))?;
        let mut header = 0;
        while let Some(entry) = archive.read_header()? {
            archive = match remaining.iter().position(|wanted| *wanted == header) {
                Some(at) => {
                    remaining.swap_remove(at);
                    let (bytes, rest) = entry.read()?;
                    self.extracted.insert(header, bytes);
                    rest
                }
                None => entry.skip()?,
            };
            header += 1;
            if remaining.is_empty() {
                return Ok(());
            }
        }
        Err(anyhow!("{} entries missing from {}", remaining.len(), self.location))
    }

    fn take(&mut self, entry: &RarEntry, batch: &[usize]) -> Result<Vec<u8>> {
        let outcome = self.extract(batch);
        match self.extracted.remove(&entry.header) {
            Some(bytes) => Ok(bytes),
            None => Err(outcome
                .err()
                .unwrap_or_else(|| anyhow!("entry {:?} was not extracted", entry.path))),
        }
    }
}

impl PageSource for RarPages {
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
        let batch: Vec<usize> =
            self.pages[index..].iter().take(READ_AHEAD).map(|entry| entry.header).collect();
        self.take(&entry, &batch)
            .with_context(|| format!("extracting {:?} from {}", entry.path, self.location))
    }

    fn info_text(&mut self) -> Result<Option<String>> {
        let Some(entry) = self.info.clone() else {
            return Ok(None);
        };
        let bytes = self.take(&entry, &[entry.header])?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// Pages in natural order plus the info text entry, from the raw entry list.
fn arrange(entries: Vec<RarEntry>) -> (Vec<RarEntry>, Option<RarEntry>) {
    let mut entries: Vec<RarEntry> = entries
        .into_iter()
        .filter_map(|entry| {
            let path = util::sanitize_zip_path(&entry.path)?;
            (!util::is_hidden(&path)).then_some(RarEntry { header: entry.header, path })
        })
        .collect();
    entries.sort_by(|a, b| util::natural_cmp_path(&a.path, &b.path));

    let mut pages = Vec::new();
    let mut info = None;
    for entry in entries {
        if util::is_supported_image(&entry.path) {
            pages.push(entry);
        } else if util::is_info_text(&entry.path) {
            info = Some(entry);
        } else if util::is_supported_archive(&entry.path) {
            warn!(target: "fs::archive", entry = ?entry.path, "archives inside rar are not opened");
        }
    }
    (pages, info)
}
