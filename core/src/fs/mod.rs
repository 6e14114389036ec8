//! File system access layer: zip and rar archives, loose images, and sibling lookup.

pub mod archive;
pub mod folder;
pub mod rar;
pub mod siblings;
mod util;

pub use archive::ZipPages;
pub use folder::{ImageFile, list_images};
pub use rar::RarPages;
pub use siblings::{next_in_directory, previous_in_directory};
pub use util::{
    Token, is_hidden, is_info_text, is_supported_archive, is_supported_image, natural_cmp,
    natural_cmp_path, tokenize,
};

/// Shared result type for fs operations.
pub type Result<T> = crate::Result<T>;
