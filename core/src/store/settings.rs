//! Reader settings: resume position, bookmarks, and display preferences, stored as JSON.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use directories::ProjectDirs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::book::Position;
use crate::types::FitMode;

use super::Result;

const APP_QUALIFIER: &str = "com";
const APP_ORGANISATION: &str = "ComicReader";
const APP_NAME: &str = "comic-reader";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReaderSettings {
    /// Where reading stopped last time, offered on the next start.
    pub resume: Option<Position>,
    pub bookmarks: Vec<Position>,
    pub double_page: bool,
    pub fit: FitMode,
    pub windowed: bool,
}

impl ReaderSettings {
    pub fn add_bookmark(&mut self, position: Position) {
        self.bookmarks.push(position);
    }

    /// Drop the bookmarks at `indices`; unknown indices are ignored.
    pub fn remove_bookmarks(&mut self, indices: &[usize]) -> usize {
        let before = self.bookmarks.len();
        let mut index = 0;
        self.bookmarks.retain(|_| {
            let keep = !indices.contains(&index);
            index += 1;
            keep
        });
        before - self.bookmarks.len()
    }

    /// The resume position, provided every file it refers to still exists.
    pub fn resume_available(&self) -> Option<&Position> {
        self.resume
            .as_ref()
            .filter(|position| position.files().iter().all(|file| Path::new(file).exists()))
    }
}

/// JSON file holding [`ReaderSettings`]; reads and writes are serialized.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SettingsStore {
    /// Store in the per-user configuration directory.
    pub fn open_default() -> Result<Self> {
        let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORGANISATION, APP_NAME)
            .ok_or_else(|| anyhow!("unable to resolve application config directory"))?;
        Ok(Self::at(dirs.config_dir().join(SETTINGS_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current settings; defaults when nothing has been saved yet.
    pub fn load(&self) -> Result<ReaderSettings> {
        let _guard = self.lock.lock();
        self.read()
    }

    pub fn save(&self, settings: &ReaderSettings) -> Result<()> {
        let _guard = self.lock.lock();
        self.write(settings)
    }

    /// Load, modify, and save in one step.
    pub fn update<F>(&self, change: F) -> Result<ReaderSettings>
    where
        F: FnOnce(&mut ReaderSettings),
    {
        let _guard = self.lock.lock();
        let mut settings = self.read()?;
        change(&mut settings);
        self.write(&settings)?;
        Ok(settings)
    }

    fn read(&self) -> Result<ReaderSettings> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing settings at {}", self.path.display())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(target: "store::settings", path = ?self.path, "no settings yet");
                Ok(ReaderSettings::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, settings: &ReaderSettings) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            anyhow!("settings path {} does not have a parent directory", self.path.display())
        })?;
        fs::create_dir_all(parent)?;

        let data = serde_json::to_vec_pretty(settings)?;
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(&data)?;
        temp.flush()?;

        match temp.persist(&self.path) {
            Ok(_) => {}
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                if let Err(remove_err) = fs::remove_file(&self.path) {
                    if remove_err.kind() != io::ErrorKind::NotFound {
                        return Err(remove_err.into());
                    }
                }
                err.file.persist(&self.path).map_err(|persist_err| persist_err.error)?;
            }
            Err(err) => return Err(err.error.into()),
        }

        info!(
            target: "store::settings",
            path = ?self.path,
            bookmarks = settings.bookmarks.len(),
            "settings saved"
        );
        Ok(())
    }
}
