//! Loose image files and image directories.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};

use crate::load::PageSource;

use super::{Result, util};

/// A single image file on disk: one collection holding one page.
#[derive(Debug, Clone)]
pub struct ImageFile {
    location: String,
    path: PathBuf,
}

impl ImageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self { location: path.to_string_lossy().into_owned(), path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageSource for ImageFile {
    fn location(&self) -> &str {
        &self.location
    }

    fn page_count(&self) -> usize {
        1
    }

    fn read_page(&mut self, index: usize) -> Result<Vec<u8>> {
        if index != 0 {
            return Err(anyhow!("image file {:?} has a single page", self.path));
        }
        fs::read(&self.path).with_context(|| format!("reading image {:?}", self.path))
    }
}

/// Every visible image directly inside `dir`, in natural order.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow!("folder {:?} is not a directory", dir));
    }

    let mut images: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {:?}", dir))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if util::is_hidden(&path) || !util::is_supported_image(&path) {
            continue;
        }
        images.push(path);
    }

    images.sort_by(|a, b| util::natural_cmp_path(file_name(a), file_name(b)));
    Ok(images)
}

fn file_name(path: &Path) -> &Path {
    path.file_name().map(Path::new).unwrap_or(path)
}
