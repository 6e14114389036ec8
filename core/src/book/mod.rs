//! Navigation model: a book is an ordered run of page collections read as one sequence.

pub mod collection;
pub mod position;

pub use collection::{PageAppender, PageCollection};
pub use position::{Position, PositionError};

use crate::types::{PageBuffer, SeekDirection};

/// Every collection produced by one load, in load order, plus which one is being read.
///
/// Turning past the last page of a collection lands on the first page of the next one, so
/// callers never special-case archive boundaries.
#[derive(Debug, Default)]
pub struct Book {
    collections: Vec<PageCollection>,
    current: usize,
}

impl Book {
    pub fn new(collections: Vec<PageCollection>) -> Self {
        Self { collections, current: 0 }
    }

    pub fn push(&mut self, collection: PageCollection) {
        self.collections.push(collection);
    }

    pub fn collections(&self) -> &[PageCollection] {
        &self.collections
    }

    pub fn collection(&self, index: usize) -> Option<&PageCollection> {
        self.collections.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// The collection being read; the first one until navigation moves elsewhere.
    pub fn current_collection(&self) -> Option<&PageCollection> {
        self.collections.get(self.current)
    }

    pub fn current_collection_mut(&mut self) -> Option<&mut PageCollection> {
        self.collections.get_mut(self.current)
    }

    pub fn current_collection_index(&self) -> Option<usize> {
        if self.is_empty() { None } else { Some(self.current) }
    }

    /// One-based number of the current collection; `None` for an empty book.
    pub fn current_collection_number(&self) -> Option<usize> {
        self.current_collection_index().map(|index| index + 1)
    }

    /// One-based page number across all collections; `None` for an empty book.
    ///
    /// A current collection that has not received any page yet counts as sitting just before
    /// its first page.
    pub fn current_page_number(&self) -> Option<usize> {
        let current = self.current_collection()?;
        let before: usize = self.collections[..self.current].iter().map(PageCollection::len).sum();
        Some(before + current.current_page_number().unwrap_or(0))
    }

    /// Sum of all collection lengths, read fresh so background appends are always counted.
    pub fn total_pages(&self) -> usize {
        self.collections.iter().map(PageCollection::len).sum()
    }

    pub fn total_files(&self) -> usize {
        self.collections.len()
    }

    /// Next valid page of the current collection, or the first page of the next one.
    ///
    /// While the current collection is still being populated, running out of pages returns
    /// `None` and stays put: the pages after the cursor simply have not arrived yet.
    pub fn next_page(&mut self) -> Option<PageBuffer> {
        let current = self.current_collection_mut()?;
        if let Some(page) = current.next_page() {
            return Some(page);
        }
        if !current.is_complete() {
            tracing::debug!(
                target: "book::navigation",
                location = current.location(),
                loaded = current.len(),
                "waiting for more pages"
            );
            return None;
        }
        self.next_file()
    }

    /// Move to the next collection and return its first page as stored, without skipping.
    ///
    /// A next collection without any page yet is not entered.
    pub fn next_file(&mut self) -> Option<PageBuffer> {
        let target = self.current + 1;
        if self.collections.get(target).is_none_or(PageCollection::is_empty) {
            return None;
        }
        self.current = target;
        tracing::debug!(
            target: "book::navigation",
            file = self.current + 1,
            total = self.collections.len(),
            "entered next file"
        );
        self.collections[self.current].place(0)
    }

    /// Previous valid page of the current collection, or the last page of the previous one.
    pub fn previous_page(&mut self, double_page: bool) -> Option<PageBuffer> {
        let current = self.current_collection_mut();
        if let Some(page) = current.and_then(|collection| collection.previous_page(double_page)) {
            return Some(page);
        }
        self.previous_file()
    }

    /// Move to the previous collection and return its last page as stored, without skipping.
    ///
    /// A previous collection that is empty or still being populated is not entered, since its
    /// last page is not known yet.
    pub fn previous_file(&mut self) -> Option<PageBuffer> {
        let target = self.current.checked_sub(1)?;
        let collection = self.collections.get_mut(target)?;
        if !collection.is_complete() {
            return None;
        }
        let last = collection.len().checked_sub(1)?;
        let page = collection.place(last);
        self.current = target;
        tracing::debug!(
            target: "book::navigation",
            file = self.current + 1,
            total = self.collections.len(),
            "entered previous file"
        );
        page
    }

    /// First valid page of the whole book.
    pub fn first_page(&mut self) -> Option<PageBuffer> {
        self.get_page_at(0, 0)
    }

    /// Last valid page of the whole book, as far as it has been loaded.
    ///
    /// Leaves the position unchanged when the last collection has no valid page.
    pub fn last_page(&mut self) -> Option<PageBuffer> {
        let last = self.collections.len().checked_sub(1)?;
        let collection = &mut self.collections[last];
        let end = isize::try_from(collection.len()).ok()? - 1;
        let page = collection.seek(end, SeekDirection::Backward)?;
        self.current = last;
        Some(page)
    }

    /// Jump to `page` inside the current collection.
    pub fn get_page(&mut self, page: usize) -> Option<PageBuffer> {
        self.current_collection_mut()?.set_index(page)
    }

    /// Make `collection` current and jump to `page` inside it.
    pub fn get_page_at(&mut self, collection: usize, page: usize) -> Option<PageBuffer> {
        if collection >= self.collections.len() {
            return None;
        }
        self.current = collection;
        self.collections[collection].set_index(page)
    }

    /// Snapshot of the reading position, `None` for an empty book.
    pub fn bookmark(&self) -> Option<Position> {
        let current = self.current_collection()?;
        let files = self.collections.iter().map(|c| c.location().to_string()).collect();
        let page = current.current_page_number().map_or(0, |number| number - 1);
        Position::new(files, self.current, page).ok()
    }

    /// Index of the collection loaded from `location`.
    pub fn collection_index_of(&self, location: &str) -> Option<usize> {
        self.collections.iter().position(|collection| collection.location() == location)
    }

    /// Re-apply a bookmark.
    ///
    /// The bookmarked file is looked up by location, so files missing from this book do not
    /// shift the target. The stored file number is only used when the book holds exactly the
    /// bookmarked files.
    pub fn restore(&mut self, position: &Position) -> Option<PageBuffer> {
        let same_files = position.files().len() == self.collections.len()
            && position.files().iter().zip(&self.collections).all(|(f, c)| f == c.location());
        if !same_files {
            tracing::warn!(
                target: "book::navigation",
                bookmark_file = position.current_file(),
                "restoring a bookmark against a different file set"
            );
        }
        let index = match self.collection_index_of(position.current_file()) {
            Some(index) => index,
            None if same_files => position.file_number(),
            None => return None,
        };
        self.get_page_at(index, position.page_number())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::page_buffer;

    fn collection(location: &str, pages: usize) -> PageCollection {
        let collection = PageCollection::new(location);
        for index in 0..pages {
            collection.append_page(Some(page_buffer(format!("{location}#{index}"))));
        }
        collection
    }

    fn two_file_book() -> Book {
        Book::new(vec![collection("one.cbz", 3), collection("two.cbz", 2)])
    }

    #[test]
    fn crossing_into_next_file_continues_numbering() {
        let mut book = two_file_book();
        book.get_page(2).unwrap();
        assert_eq!(book.current_page_number(), Some(3));

        let page = book.next_page().unwrap();
        assert_eq!(&page[..], b"two.cbz#0");
        assert_eq!(book.current_collection_number(), Some(2));
        assert_eq!(book.current_page_number(), Some(4));
        assert_eq!(book.total_pages(), 5);
    }

    #[test]
    fn crossing_back_lands_on_last_page_of_previous_file() {
        let mut book = two_file_book();
        book.get_page_at(1, 0).unwrap();

        let page = book.previous_page(false).unwrap();
        assert_eq!(&page[..], b"one.cbz#2");
        assert_eq!(book.current_page_number(), Some(3));
    }

    #[test]
    fn file_boundaries_return_none() {
        let mut book = two_file_book();
        assert!(book.previous_file().is_none());
        assert_eq!(book.current_collection_number(), Some(1));

        book.next_file().unwrap();
        assert!(book.next_file().is_none());
        assert!(book.next_page().is_some());
        assert!(book.next_page().is_none());
        assert_eq!(book.current_page_number(), Some(5));
    }

    #[test]
    fn next_file_does_not_skip_invalid_first_page() {
        let second = PageCollection::new("two.cbz");
        second.append_page(None);
        second.append_page(Some(page_buffer(vec![1, 2])));
        let mut book = Book::new(vec![collection("one.cbz", 1), second]);

        assert!(book.next_page().is_none());
        assert_eq!(book.current_collection_number(), Some(2));
        assert_eq!(book.current_page_number(), Some(2));

        assert_eq!(&book.next_page().unwrap()[..], &[1, 2]);
    }

    #[test]
    fn get_page_at_rejects_unknown_collection() {
        let mut book = two_file_book();
        assert!(book.get_page_at(2, 0).is_none());
        assert_eq!(book.current_collection_number(), Some(1));
    }

    #[test]
    fn empty_book_degrades_to_sentinels() {
        let mut book = Book::default();
        assert_eq!(book.total_files(), 0);
        assert_eq!(book.total_pages(), 0);
        assert_eq!(book.current_collection_number(), None);
        assert_eq!(book.current_page_number(), None);
        assert!(book.bookmark().is_none());
        assert!(book.next_page().is_none());
        assert!(book.previous_page(true).is_none());
        assert!(book.get_page(0).is_none());
        assert!(book.get_page_at(0, 0).is_none());
    }

    #[test]
    fn bookmark_round_trips_onto_a_rebuilt_book() {
        let mut book = two_file_book();
        book.next_file().unwrap();
        let current = book.next_page().unwrap();

        let bookmark = book.bookmark().unwrap();
        assert_eq!(bookmark.files(), ["one.cbz", "two.cbz"]);
        assert_eq!(bookmark.file_number(), 1);
        assert_eq!(bookmark.page_number(), 1);

        let mut rebuilt = two_file_book();
        let page = rebuilt.restore(&bookmark).unwrap();
        assert_eq!(page, current);
        assert_eq!(rebuilt.current_page_number(), Some(5));
    }

    fn populating(location: &str, pages: usize) -> (PageCollection, PageAppender) {
        let collection = PageCollection::populating(location);
        let appender = collection.appender();
        for index in 0..pages {
            appender.append_page(Some(page_buffer(format!("{location}#{index}"))));
        }
        (collection, appender)
    }

    #[test]
    fn end_of_loaded_pages_waits_instead_of_crossing() {
        let (one, one_appender) = populating("one.cbz", 1);
        let (two, two_appender) = populating("two.cbz", 0);
        let mut book = Book::new(vec![one, two]);

        assert!(book.next_page().is_none());
        assert_eq!(book.current_collection_number(), Some(1));

        // The next file filling up does not matter while the current one is incomplete.
        two_appender.append_page(Some(page_buffer("two.cbz#0")));
        assert!(book.next_page().is_none());
        assert_eq!(book.current_collection_number(), Some(1));

        one_appender.append_page(Some(page_buffer("one.cbz#1")));
        assert_eq!(&book.next_page().unwrap()[..], b"one.cbz#1");
        one_appender.finish();

        assert_eq!(&book.next_page().unwrap()[..], b"two.cbz#0");
        assert_eq!(book.current_page_number(), Some(3));
        two_appender.append_page(Some(page_buffer("two.cbz#1")));
        assert_eq!(&book.next_page().unwrap()[..], b"two.cbz#1");
    }

    #[test]
    fn files_without_pages_yet_are_not_entered() {
        let (two, two_appender) = populating("two.cbz", 0);
        let mut book = Book::new(vec![collection("one.cbz", 2), two]);

        assert!(book.next_file().is_none());
        assert_eq!(book.current_collection_number(), Some(1));

        two_appender.append_page(Some(page_buffer("two.cbz#0")));
        assert_eq!(&book.next_file().unwrap()[..], b"two.cbz#0");
        assert_eq!(book.current_collection_number(), Some(2));
    }

    #[test]
    fn crossing_back_waits_for_previous_file_to_complete() {
        let (one, one_appender) = populating("one.cbz", 2);
        let mut book = Book::new(vec![one, collection("two.cbz", 2)]);
        book.get_page_at(1, 0).unwrap();

        assert!(book.previous_page(false).is_none());
        assert_eq!(book.current_collection_number(), Some(2));
        assert_eq!(book.current_page_number(), Some(3));

        one_appender.append_page(Some(page_buffer("one.cbz#2")));
        one_appender.finish();
        assert_eq!(&book.previous_page(false).unwrap()[..], b"one.cbz#2");
        assert_eq!(book.current_collection_number(), Some(1));
    }

    #[test]
    fn turning_pages_while_a_worker_appends_across_files() {
        let (one, one_appender) = populating("one.cbz", 1);
        let (two, two_appender) = populating("two.cbz", 0);
        let mut book = Book::new(vec![one, two]);

        let worker = std::thread::spawn(move || {
            for (appender, location, first) in
                [(&one_appender, "one.cbz", 1), (&two_appender, "two.cbz", 0)]
            {
                for index in first..20 {
                    appender.append_page(Some(page_buffer(format!("{location}#{index}"))));
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                appender.finish();
            }
        });

        let mut seen = vec![book.current_collection().unwrap().current_page().unwrap()];
        while seen.len() < 40 {
            match book.next_page() {
                Some(page) => seen.push(page),
                None => std::thread::yield_now(),
            }
        }
        worker.join().unwrap();

        let expected: Vec<String> = ["one.cbz", "two.cbz"]
            .iter()
            .flat_map(|location| (0..20).map(move |index| format!("{location}#{index}")))
            .collect();
        let seen: Vec<String> =
            seen.iter().map(|page| String::from_utf8_lossy(page).into_owned()).collect();
        assert_eq!(seen, expected);
        assert!(book.next_page().is_none());
    }

    #[test]
    fn book_wide_first_and_last_page() {
        let last = PageCollection::new("three.cbz");
        last.append_page(Some(page_buffer("three.cbz#0")));
        last.append_page(None);
        let mut book = Book::new(vec![collection("one.cbz", 3), collection("two.cbz", 2), last]);

        assert_eq!(&book.last_page().unwrap()[..], b"three.cbz#0");
        assert_eq!(book.current_collection_number(), Some(3));
        assert_eq!(book.current_page_number(), Some(6));

        assert_eq!(&book.first_page().unwrap()[..], b"one.cbz#0");
        assert_eq!(book.current_page_number(), Some(1));
    }

    #[test]
    fn restore_finds_the_bookmarked_file_by_location() {
        let bookmark = Position::new(
            vec!["a.cbz".to_string(), "b.cbz".to_string(), "c.cbz".to_string()],
            2,
            1,
        )
        .unwrap();
        let mut book = Book::new(vec![collection("b.cbz", 2), collection("c.cbz", 3)]);

        assert_eq!(&book.restore(&bookmark).unwrap()[..], b"c.cbz#1");
        assert_eq!(book.current_collection_index(), Some(1));

        let mut unrelated = Book::new(vec![collection("x.cbz", 2), collection("y.cbz", 3)]);
        assert!(unrelated.restore(&bookmark).is_none());
        assert_eq!(unrelated.current_collection_index(), Some(0));
    }

    #[test]
    fn total_pages_tracks_background_appends() {
        let book = two_file_book();
        let appender = book.collection(1).unwrap().appender();
        assert!(appender.append_page(Some(page_buffer(vec![9, 9]))));
        assert_eq!(book.total_pages(), 6);

        let page = book.collection(1).unwrap().page(2).unwrap();
        assert!(Arc::ptr_eq(&page, &book.collection(1).unwrap().page(2).unwrap()));
    }
}
