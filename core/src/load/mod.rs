//! Turns a selection of files into a [`Book`], populating pages in the background.
//!
//! The first pages of the collection the reader opens on are extracted before `load` returns so
//! something can be shown immediately. Everything else is appended by a single worker thread
//! through [`PageAppender`]s; the book's counters simply grow while it runs. Dropping the book
//! detaches the appenders and the worker stops at its next page.

mod source;

pub use source::{MemorySource, PageSource};

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::book::{Book, PageAppender, PageCollection, Position};
use crate::fs::{self, ImageFile, RarPages, ZipPages};
use crate::types::{ArchiveKind, SelectionKind, page_buffer};

/// Why a selection could not be turned into a book. The previous book stays untouched.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no files were selected")]
    EmptySelection,
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("please select only archives or only images")]
    MixedSelection,
    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFile(PathBuf),
    #[error("archive format of {} is not supported", .0.display())]
    UnsupportedArchive(PathBuf),
    #[error("could not open {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },
    #[error("unable to load any images")]
    NoPages,
}

/// Non-fatal problem met while loading; the book is still usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub location: String,
    pub message: String,
}

impl LoadWarning {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self { location: location.into(), message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Pages extracted synchronously before the book is handed out.
    pub initial_batch: usize,
    /// Append the remaining pages from a worker thread instead of before returning.
    pub background: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { initial_batch: 5, background: true }
    }
}

/// Outcome of the background worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationReport {
    pub pages: usize,
    pub warnings: Vec<LoadWarning>,
    /// The book was dropped before population finished.
    pub abandoned: bool,
}

/// Handle on the worker filling a freshly loaded book.
#[derive(Debug)]
pub struct Population {
    handle: JoinHandle<PopulationReport>,
}

impl Population {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until every page has been appended.
    pub fn wait(self) -> PopulationReport {
        self.handle.join().unwrap_or_else(|_| PopulationReport {
            warnings: vec![LoadWarning::new("", "page population worker panicked")],
            ..PopulationReport::default()
        })
    }
}

/// A loaded book together with what is still happening to it.
#[derive(Debug)]
pub struct LoadedBook {
    pub book: Book,
    pub warnings: Vec<LoadWarning>,
    pub population: Option<Population>,
}

impl LoadedBook {
    /// Wait for background population (if any) and fold its warnings in.
    pub fn finish_population(&mut self) {
        if let Some(population) = self.population.take() {
            let report = population.wait();
            self.warnings.extend(report.warnings);
        }
    }
}

struct PendingWork {
    appender: PageAppender,
    source: Box<dyn PageSource>,
    from: usize,
}

impl Drop for PendingWork {
    // Finished, abandoned or unwound: no more pages will come for this collection either way.
    fn drop(&mut self) {
        self.appender.finish();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Loader {
    options: LoadOptions,
}

impl Loader {
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> LoadOptions {
        self.options
    }

    /// Load archives or images, starting on the first page of the first file.
    pub fn load(&self, paths: &[PathBuf]) -> Result<LoadedBook, LoadError> {
        let sources = open_sources(paths)?;
        self.load_sources_at(sources, None, 0)
    }

    /// Reload the files of a bookmark and move to the bookmarked page.
    ///
    /// Falls back to the first page of the bookmarked file when the page no longer exists.
    pub fn resume(&self, position: &Position) -> Result<LoadedBook, LoadError> {
        let paths: Vec<PathBuf> = position.files().iter().map(PathBuf::from).collect();
        let sources = open_sources(&paths)?;
        self.resume_sources(sources, position)
    }

    /// [`resume`](Self::resume) over already opened extraction services.
    pub fn resume_sources(
        &self,
        sources: Vec<Box<dyn PageSource>>,
        position: &Position,
    ) -> Result<LoadedBook, LoadError> {
        let focus = Some(position.current_file());
        let mut loaded = self.load_sources_at(sources, focus, position.page_number())?;

        if loaded.book.restore(position).is_none() {
            warn!(
                target: "load",
                file = position.current_file(),
                page = position.page_number(),
                "bookmarked page unavailable, opening file at its start"
            );
            let index = loaded.book.collection_index_of(position.current_file()).unwrap_or(0);
            loaded.book.get_page_at(index, 0);
        }
        Ok(loaded)
    }

    /// Build a book from already opened extraction services, in the given order.
    pub fn load_sources(&self, sources: Vec<Box<dyn PageSource>>) -> Result<LoadedBook, LoadError> {
        self.load_sources_at(sources, None, 0)
    }

    fn load_sources_at(
        &self,
        sources: Vec<Box<dyn PageSource>>,
        focus_location: Option<&str>,
        focus_page: usize,
    ) -> Result<LoadedBook, LoadError> {
        let mut warnings = Vec::new();
        let mut sources: Vec<Box<dyn PageSource>> = sources
            .into_iter()
            .filter(|source| {
                let keep = source.page_count() > 0;
                if !keep {
                    warnings.push(LoadWarning::new(source.location(), "archive has no images"));
                }
                keep
            })
            .collect();

        if sources.is_empty() {
            return Err(LoadError::NoPages);
        }

        let collections: Vec<PageCollection> =
            sources.iter().map(|source| PageCollection::populating(source.location())).collect();

        for (collection, source) in collections.iter().zip(sources.iter_mut()) {
            match source.info_text() {
                Ok(Some(text)) => collection.set_info_text(text),
                Ok(None) => {}
                Err(err) => warnings.push(LoadWarning::new(source.location(), format!("{err:#}"))),
            }
        }

        // Resolved after empty sources are gone, so it names the right collection.
        let focus = focus_location
            .and_then(|location| sources.iter().position(|source| source.location() == location))
            .unwrap_or(0);
        let eager = focus_page.saturating_add(self.options.initial_batch.max(1));

        let mut pending = Vec::with_capacity(sources.len());
        for (index, mut source) in sources.into_iter().enumerate() {
            let appender = collections[index].appender();
            let from = if index == focus {
                let upto = eager.min(source.page_count());
                let report = populate(&appender, source.as_mut(), 0, upto);
                warnings.extend(report.warnings);
                upto
            } else {
                0
            };
            if from < source.page_count() {
                pending.push(PendingWork { appender, source, from });
            } else {
                appender.finish();
            }
        }
        // Readers usually continue from the focused file, so fill it first.
        if let Some(position) = pending.iter().position(|work| work.from > 0) {
            let focused = pending.remove(position);
            pending.insert(0, focused);
        }

        let population = if pending.is_empty() {
            None
        } else if self.options.background {
            spawn_population(pending, &mut warnings)
        } else {
            warnings.extend(populate_all(pending).warnings);
            None
        };

        let book = Book::new(collections);
        info!(
            target: "load",
            files = book.total_files(),
            pages_ready = book.total_pages(),
            background = population.is_some(),
            "book loaded"
        );
        Ok(LoadedBook { book, warnings, population })
    }
}

fn spawn_population(
    pending: Vec<PendingWork>,
    warnings: &mut Vec<LoadWarning>,
) -> Option<Population> {
    // Shared so the work is still reachable for inline population if the spawn fails.
    let slot = std::sync::Arc::new(parking_lot::Mutex::new(Some(pending)));
    let worker_slot = std::sync::Arc::clone(&slot);

    let spawned = thread::Builder::new().name("comic-page-loader".into()).spawn(move || {
        let pending = worker_slot.lock().take();
        pending.map(populate_all).unwrap_or_default()
    });

    match spawned {
        Ok(handle) => Some(Population { handle }),
        Err(err) => {
            warn!(target: "load", "could not start page loader thread, loading inline: {err}");
            if let Some(pending) = slot.lock().take() {
                warnings.extend(populate_all(pending).warnings);
            }
            None
        }
    }
}

fn populate_all(pending: Vec<PendingWork>) -> PopulationReport {
    let mut total = PopulationReport::default();
    for mut work in pending {
        let count = work.source.page_count();
        let report = populate(&work.appender, work.source.as_mut(), work.from, count);
        total.pages += report.pages;
        total.warnings.extend(report.warnings);
        if report.abandoned {
            debug!(target: "load", "book discarded, stopping population");
            total.abandoned = true;
            break;
        }
    }
    total
}

/// Extract pages `from..to` of `source` into the collection behind `appender`.
///
/// A page that fails to extract still takes its slot, as a null page, so indices stay stable.
fn populate(
    appender: &PageAppender,
    source: &mut dyn PageSource,
    from: usize,
    to: usize,
) -> PopulationReport {
    let mut report = PopulationReport::default();
    for index in from..to {
        let page = match source.read_page(index) {
            Ok(bytes) => Some(page_buffer(bytes)),
            Err(err) => {
                warn!(target: "load", location = source.location(), index, "page skipped: {err:#}");
                report.warnings.push(LoadWarning::new(
                    source.location(),
                    format!("page {} could not be extracted", index + 1),
                ));
                None
            }
        };
        if !appender.append_page(page) {
            report.abandoned = true;
            break;
        }
        report.pages += 1;
    }
    report
}

/// Validate a selection and open one extraction service per file.
fn open_sources(paths: &[PathBuf]) -> Result<Vec<Box<dyn PageSource>>, LoadError> {
    if paths.is_empty() {
        return Err(LoadError::EmptySelection);
    }
    if let Some(missing) = paths.iter().find(|path| !path.exists()) {
        return Err(LoadError::NotFound(missing.clone()));
    }

    let kind = selection_kind(paths)?;
    let mut paths = match kind {
        SelectionKind::Images if paths.len() == 1 => {
            let directory = paths[0].parent().filter(|p| !p.as_os_str().is_empty());
            let directory = directory.unwrap_or(Path::new("."));
            fs::list_images(directory).map_err(|err| LoadError::Open {
                path: directory.to_path_buf(),
                reason: format!("{err:#}"),
            })?
        }
        _ => paths.to_vec(),
    };
    paths.sort_by(|a, b| fs::natural_cmp_path(a, b));

    let mut sources: Vec<Box<dyn PageSource>> = Vec::with_capacity(paths.len());
    for path in paths {
        let source: Box<dyn PageSource> = match kind {
            SelectionKind::Images => Box::new(ImageFile::new(path)),
            SelectionKind::Archives => match ArchiveKind::sniff(&path) {
                ArchiveKind::Zip => Box::new(ZipPages::open(&path).map_err(|err| {
                    LoadError::Open { path: path.clone(), reason: format!("{err:#}") }
                })?),
                ArchiveKind::Rar => Box::new(RarPages::open(&path).map_err(|err| {
                    LoadError::Open { path: path.clone(), reason: format!("{err:#}") }
                })?),
                ArchiveKind::Unknown => return Err(LoadError::UnsupportedArchive(path)),
            },
        };
        sources.push(source);
    }
    Ok(sources)
}

fn selection_kind(paths: &[PathBuf]) -> Result<SelectionKind, LoadError> {
    let mut kind = None;
    for path in paths {
        let this = if fs::is_supported_image(path) {
            SelectionKind::Images
        } else if fs::is_supported_archive(path) {
            SelectionKind::Archives
        } else {
            return Err(LoadError::UnsupportedFile(path.clone()));
        };
        match kind {
            Some(previous) if previous != this => return Err(LoadError::MixedSelection),
            _ => kind = Some(this),
        }
    }
    kind.ok_or(LoadError::EmptySelection)
}
