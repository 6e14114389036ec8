//! Pages of a single source file plus a reading cursor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::types::{PageBuffer, SeekDirection, is_valid_page};

/// Number of cursor positions a back turn covers in double-page mode.
///
/// Showing a pair advances the cursor onto its second page, so stepping back one pair has to
/// undo two turns.
const DOUBLE_PAGE_BACK_STEP: isize = 3;

/// Append-only page storage shared between a collection and its producer.
#[derive(Debug)]
struct PageStore {
    pages: RwLock<Vec<Option<PageBuffer>>>,
    info_text: RwLock<Option<String>>,
    /// No more pages will arrive.
    complete: AtomicBool,
}

impl PageStore {
    fn new(complete: bool) -> Self {
        Self {
            pages: RwLock::default(),
            info_text: RwLock::default(),
            complete: AtomicBool::new(complete),
        }
    }
}

/// One archive or image file worth of pages.
///
/// The page sequence may keep growing while the collection is being read: the loader hands a
/// [`PageAppender`] to a background worker. Slots, once visible, never change.
#[derive(Debug)]
pub struct PageCollection {
    location: String,
    store: Arc<PageStore>,
    cursor: usize,
}

impl PageCollection {
    /// A collection filled by the caller; it counts as complete from the start.
    pub fn new(location: impl Into<String>) -> Self {
        Self::with_store(location, PageStore::new(true))
    }

    /// A collection still being filled through its [`PageAppender`].
    ///
    /// Running out of pages in it means "wait", not "end of file", until
    /// [`PageAppender::finish`] is called.
    pub fn populating(location: impl Into<String>) -> Self {
        Self::with_store(location, PageStore::new(false))
    }

    fn with_store(location: impl Into<String>, store: PageStore) -> Self {
        Self { location: location.into(), store: Arc::new(store), cursor: 0 }
    }

    /// Path of the file the pages were extracted from, as given to the loader.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// File name component of [`location`](Self::location), extension included.
    pub fn file_name(&self) -> &str {
        self.location.rsplit(['/', '\\']).next().unwrap_or(&self.location)
    }

    /// Companion text (`.nfo`/`.txt`) found next to the pages, if any.
    pub fn info_text(&self) -> Option<String> {
        self.store.info_text.read().clone()
    }

    pub fn set_info_text(&self, text: impl Into<String>) {
        *self.store.info_text.write() = Some(text.into());
    }

    /// Add a page to the end of the sequence. `None` records a null page in its slot.
    pub fn append_page(&self, page: Option<PageBuffer>) {
        self.store.pages.write().push(page);
    }

    /// Producer handle for populating this collection from another thread.
    pub fn appender(&self) -> PageAppender {
        PageAppender { store: Arc::downgrade(&self.store) }
    }

    pub fn len(&self) -> usize {
        self.store.pages.read().len()
    }

    /// Whether every page of the source file has been appended.
    pub fn is_complete(&self) -> bool {
        self.store.complete.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-based cursor, or `None` while the collection holds no pages.
    pub fn cursor(&self) -> Option<usize> {
        if self.is_empty() { None } else { Some(self.cursor) }
    }

    /// One-based number of the current page within this collection.
    pub fn current_page_number(&self) -> Option<usize> {
        self.cursor().map(|cursor| cursor + 1)
    }

    /// Raw slot access without moving the cursor.
    pub fn page(&self, index: usize) -> Option<PageBuffer> {
        self.store.pages.read().get(index).cloned().flatten()
    }

    pub fn current_page(&self) -> Option<PageBuffer> {
        self.page(self.cursor)
    }

    pub fn next_page(&mut self) -> Option<PageBuffer> {
        self.seek(self.cursor as isize + 1, SeekDirection::Forward)
    }

    pub fn previous_page(&mut self, double_page: bool) -> Option<PageBuffer> {
        let step = if double_page { DOUBLE_PAGE_BACK_STEP } else { 1 };
        self.seek(self.cursor as isize - step, SeekDirection::Backward)
    }

    /// Jump to `index`, skipping forward over invalid pages.
    pub fn set_index(&mut self, index: usize) -> Option<PageBuffer> {
        let target = isize::try_from(index).unwrap_or(isize::MAX);
        self.seek(target, SeekDirection::Forward)
    }

    /// Move to the first valid page at or beyond `target` in `direction`.
    ///
    /// A target outside the sequence, or a walk that runs off the end without meeting a valid
    /// page, returns `None` and leaves the cursor where it was.
    pub fn seek(&mut self, target: isize, direction: SeekDirection) -> Option<PageBuffer> {
        let pages = self.store.pages.read();
        let len = pages.len() as isize;
        if target < 0 || target >= len {
            return None;
        }

        let mut index = target;
        while (0..len).contains(&index) {
            let slot = pages[index as usize].as_ref();
            if is_valid_page(slot.map(|page| &page[..])) {
                self.cursor = index as usize;
                return slot.cloned();
            }
            index += direction.step();
        }

        tracing::debug!(
            target: "book::navigation",
            location = %self.location,
            target_index = target,
            ?direction,
            "no valid page in direction"
        );
        None
    }

    /// Put the cursor on `index` without validating the page there.
    ///
    /// Used when crossing into a neighbouring collection, which lands on its boundary page as-is.
    pub fn place(&mut self, index: usize) -> Option<PageBuffer> {
        let pages = self.store.pages.read();
        if index >= pages.len() {
            return None;
        }
        self.cursor = index;
        pages[index].clone()
    }
}

/// Write half of a collection, usable from a background worker.
///
/// Holds the page store weakly: once the owning collection is dropped every append is refused,
/// which is how a discarded book stops its population.
#[derive(Debug, Clone)]
pub struct PageAppender {
    store: Weak<PageStore>,
}

impl PageAppender {
    /// Publish a fully assembled page. Returns `false` if the collection no longer exists.
    pub fn append_page(&self, page: Option<PageBuffer>) -> bool {
        match self.store.upgrade() {
            Some(store) => {
                store.pages.write().push(page);
                true
            }
            None => false,
        }
    }

    pub fn set_info_text(&self, text: impl Into<String>) -> bool {
        match self.store.upgrade() {
            Some(store) => {
                *store.info_text.write() = Some(text.into());
                true
            }
            None => false,
        }
    }

    /// Mark the collection complete. Safe to call more than once.
    pub fn finish(&self) {
        if let Some(store) = self.store.upgrade() {
            store.complete.store(true, Ordering::Release);
        }
    }

    pub fn is_detached(&self) -> bool {
        self.store.strong_count() == 0
    }
}
