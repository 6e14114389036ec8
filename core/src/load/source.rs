//! Extraction service seam: anything that can hand out page bytes for one file.

use std::fmt;

use crate::Result;

/// Page bytes of one source file (an archive or a loose image), read on demand.
///
/// Implementations are moved onto the population worker, hence `Send`.
pub trait PageSource: Send + fmt::Debug {
    /// Path of the file, kept verbatim as the collection's location.
    fn location(&self) -> &str;

    /// Number of page slots this source will produce.
    fn page_count(&self) -> usize;

    /// Fully extracted bytes of page `index`.
    fn read_page(&mut self, index: usize) -> Result<Vec<u8>>;

    /// Companion text shipped with the pages, if any.
    fn info_text(&mut self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// In-memory source, handy for shells that already hold the bytes and for tests.
#[derive(Debug, Clone)]
pub struct MemorySource {
    location: String,
    pages: Vec<Option<Vec<u8>>>,
    info_text: Option<String>,
}

impl MemorySource {
    pub fn new(location: impl Into<String>) -> Self {
        Self { location: location.into(), pages: Vec::new(), info_text: None }
    }

    pub fn with_page(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.pages.push(Some(bytes.into()));
        self
    }

    /// Add a slot whose extraction fails.
    pub fn with_broken_page(mut self) -> Self {
        self.pages.push(None);
        self
    }

    pub fn with_info_text(mut self, text: impl Into<String>) -> Self {
        self.info_text = Some(text.into());
        self
    }
}

impl PageSource for MemorySource {
    fn location(&self) -> &str {
        &self.location
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn read_page(&mut self, index: usize) -> Result<Vec<u8>> {
        match self.pages.get(index) {
            Some(Some(bytes)) => Ok(bytes.clone()),
            Some(None) => Err(anyhow::anyhow!("page {index} of {} is corrupted", self.location)),
            None => Err(anyhow::anyhow!("page {index} is out of range for {}", self.location)),
        }
    }

    fn info_text(&mut self) -> Result<Option<String>> {
        Ok(self.info_text.clone())
    }
}
