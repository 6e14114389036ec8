//! The reader's single live book and the page-turning actions a shell binds to its controls.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::book::{Book, PageCollection, Position};
use crate::fs;
use crate::load::{LoadError, LoadWarning, LoadedBook, Loader, PageSource};
use crate::types::{PageBuffer, SeekDirection};

/// What the viewer should draw after an action.
///
/// `second` is only filled in double-page mode, and only when the collection has another valid
/// page after `first`.
#[derive(Debug, Clone)]
pub struct Spread {
    pub first: PageBuffer,
    pub second: Option<PageBuffer>,
}

/// Counters for the status bar: archive n of N, page n of N.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingStatus {
    pub location: String,
    pub file_number: usize,
    pub file_count: usize,
    pub page_number: usize,
    pub page_count: usize,
    pub info_text: Option<String>,
}

#[derive(Debug, Default)]
pub struct ReadingSession {
    loader: Loader,
    current: Option<LoadedBook>,
    double_page: bool,
}

impl ReadingSession {
    pub fn new(loader: Loader) -> Self {
        Self { loader, current: None, double_page: false }
    }

    pub fn double_page(&self) -> bool {
        self.double_page
    }

    pub fn set_double_page(&mut self, double_page: bool) {
        self.double_page = double_page;
    }

    pub fn book(&self) -> Option<&Book> {
        self.current.as_ref().map(|loaded| &loaded.book)
    }

    /// Warnings collected by the last successful load.
    pub fn warnings(&self) -> &[LoadWarning] {
        self.current.as_ref().map_or(&[], |loaded| loaded.warnings.as_slice())
    }

    /// Block until the live book has received all of its pages.
    pub fn finish_loading(&mut self) {
        if let Some(loaded) = self.current.as_mut() {
            loaded.finish_population();
        }
    }

    /// Load a selection and show its first page. On error the previous book stays open.
    pub fn open(&mut self, paths: &[PathBuf]) -> Result<Option<Spread>, LoadError> {
        let loaded = self.loader.load(paths)?;
        Ok(self.replace(loaded))
    }

    pub fn open_sources(
        &mut self,
        sources: Vec<Box<dyn PageSource>>,
    ) -> Result<Option<Spread>, LoadError> {
        let loaded = self.loader.load_sources(sources)?;
        Ok(self.replace(loaded))
    }

    /// Reopen the files of a bookmark on the bookmarked page.
    pub fn resume(&mut self, position: &Position) -> Result<Option<Spread>, LoadError> {
        let loaded = self.loader.resume(position)?;
        Ok(self.replace(loaded))
    }

    pub fn next_page(&mut self) -> Option<Spread> {
        let first = self.book_mut()?.next_page()?;
        Some(self.spread(first))
    }

    pub fn previous_page(&mut self) -> Option<Spread> {
        let double_page = self.double_page;
        let first = self.book_mut()?.previous_page(double_page)?;
        Some(self.spread(first))
    }

    /// Next file of the book, or the next archive of the directory once the book is exhausted.
    pub fn next_file(&mut self) -> Result<Option<Spread>, LoadError> {
        self.cross_file(Crossing::Next)
    }

    /// Previous file of the book, or the previous archive of the directory.
    pub fn previous_file(&mut self) -> Result<Option<Spread>, LoadError> {
        self.cross_file(Crossing::Previous)
    }

    /// Jump to the zero-based `page` of the current file.
    pub fn go_to_page(&mut self, page: usize) -> Option<Spread> {
        let first = self.book_mut()?.get_page(page)?;
        Some(self.spread(first))
    }

    pub fn first_page(&mut self) -> Option<Spread> {
        self.go_to_page(0)
    }

    /// Last page of the current file that has been loaded so far.
    pub fn last_page(&mut self) -> Option<Spread> {
        let last = self.book()?.current_collection()?.len().checked_sub(1)?;
        let first = self
            .book_mut()?
            .current_collection_mut()?
            .seek(isize::try_from(last).ok()?, SeekDirection::Backward)?;
        Some(self.spread(first))
    }

    /// First valid page of the whole book.
    pub fn first_page_of_book(&mut self) -> Option<Spread> {
        let first = self.book_mut()?.first_page()?;
        Some(self.spread(first))
    }

    /// Last valid page of the whole book loaded so far.
    pub fn last_page_of_book(&mut self) -> Option<Spread> {
        let first = self.book_mut()?.last_page()?;
        Some(self.spread(first))
    }

    pub fn bookmark(&self) -> Option<Position> {
        self.book()?.bookmark()
    }

    pub fn status(&self) -> Option<ReadingStatus> {
        let book = self.book()?;
        let collection = book.current_collection()?;
        Some(ReadingStatus {
            location: collection.location().to_string(),
            file_number: book.current_collection_number()?,
            file_count: book.total_files(),
            page_number: book.current_page_number()?,
            page_count: book.total_pages(),
            info_text: collection.info_text(),
        })
    }

    fn cross_file(&mut self, crossing: Crossing) -> Result<Option<Spread>, LoadError> {
        let Some(book) = self.book_mut() else {
            return Ok(None);
        };
        let Some(index) = book.current_collection_index() else {
            return Ok(None);
        };
        let at_edge = match crossing {
            Crossing::Next => index + 1 >= book.total_files(),
            Crossing::Previous => index == 0,
        };
        if !at_edge {
            // A neighbouring file that is still loading refuses the move instead of being skipped.
            let page = match crossing {
                Crossing::Next => book.next_file(),
                Crossing::Previous => book.previous_file(),
            };
            return Ok(page.map(|first| self.spread(first)));
        }

        let Some(location) = book.current_collection().map(|c| PathBuf::from(c.location())) else {
            return Ok(None);
        };
        self.open_sibling(location, crossing)
    }

    /// Open the nearest archive of the directory in the direction of `crossing`, stepping over
    /// archives that fail to load. When none loads, the first failure is returned.
    fn open_sibling(
        &mut self,
        mut from: PathBuf,
        crossing: Crossing,
    ) -> Result<Option<Spread>, LoadError> {
        let mut first_failure = None;
        loop {
            let neighbour = match crossing {
                Crossing::Next => fs::next_in_directory(&from),
                Crossing::Previous => fs::previous_in_directory(&from),
            };
            let path = match neighbour {
                Ok(Some(path)) => path,
                Ok(None) => return first_failure.map_or(Ok(None), Err),
                Err(err) => {
                    warn!(target: "session", path = ?from, "sibling lookup failed: {err:#}");
                    return Err(first_failure.unwrap_or_else(|| open_error(&from, err)));
                }
            };

            debug!(target: "session", from = ?from, to = ?path, "continuing in directory");
            match self.open(std::slice::from_ref(&path)) {
                Ok(spread) => return Ok(spread),
                Err(err) => {
                    warn!(target: "session", path = ?path, "skipping unreadable archive: {err}");
                    first_failure.get_or_insert(err);
                    from = path;
                }
            }
        }
    }

    fn replace(&mut self, loaded: LoadedBook) -> Option<Spread> {
        if let Some(location) = loaded.book.current_collection().map(PageCollection::location) {
            info!(target: "session", location, warnings = loaded.warnings.len(), "book opened");
        }
        // Dropping the previous book detaches its page appenders.
        self.current = Some(loaded);
        let first = self.book()?.current_collection()?.current_page()?;
        Some(self.spread(first))
    }

    fn spread(&mut self, first: PageBuffer) -> Spread {
        let second = if self.double_page {
            self.book_mut()
                .and_then(Book::current_collection_mut)
                .and_then(PageCollection::next_page)
        } else {
            None
        };
        Spread { first, second }
    }

    fn book_mut(&mut self) -> Option<&mut Book> {
        self.current.as_mut().map(|loaded| &mut loaded.book)
    }
}

#[derive(Debug, Clone, Copy)]
enum Crossing {
    Next,
    Previous,
}

fn open_error(path: &Path, err: anyhow::Error) -> LoadError {
    LoadError::Open { path: path.to_path_buf(), reason: format!("{err:#}") }
}
