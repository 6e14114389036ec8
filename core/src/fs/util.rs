use std::cmp::Ordering;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Supported image file extensions (lowercase, without the dot).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp", "avif"];

/// Archive extensions treated as one collection each.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "cbz", "rar", "cbr"];

/// Companion text extensions whose content becomes a collection's info text.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "nfo"];

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| allowed.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn is_hidden(path: &Path) -> bool {
    path.file_name().and_then(OsStr::to_str).map(|name| name.starts_with('.')).unwrap_or(false)
}

pub fn is_supported_image(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

pub fn is_supported_archive(path: &Path) -> bool {
    has_extension(path, ARCHIVE_EXTENSIONS)
}

pub fn is_info_text(path: &Path) -> bool {
    has_extension(path, TEXT_EXTENSIONS)
}

/// Case-insensitive natural ordering of two paths.
pub fn natural_cmp_path(a: &Path, b: &Path) -> Ordering {
    let a = a.to_string_lossy().to_lowercase();
    let b = b.to_string_lossy().to_lowercase();
    natural_cmp(&a, &b)
}

/// Compare strings so that embedded numbers order by value: `page2` < `page10`.
///
/// Equal numeric values fall back to digit count (`1` < `001`), then to plain byte order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let lhs = tokenize(a);
    let rhs = tokenize(b);

    lhs.iter()
        .zip(rhs.iter())
        .map(|pair| match pair {
            (Token::Number(a_digits, a_val), Token::Number(b_digits, b_val)) => {
                a_val.cmp(b_val).then_with(|| a_digits.len().cmp(&b_digits.len()))
            }
            (Token::Text(a_text), Token::Text(b_text)) => a_text.cmp(b_text),
            (Token::Number(..), Token::Text(..)) => Ordering::Less,
            (Token::Text(..), Token::Number(..)) => Ordering::Greater,
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| lhs.len().cmp(&rhs.len()).then_with(|| a.cmp(b)))
}

#[derive(Debug, PartialEq)]
pub enum Token<'a> {
    Text(&'a str),
    /// Digit run and its value; runs too long for `u128` saturate.
    Number(&'a str, u128),
}

/// Split `input` into alternating text and digit runs.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while let Some(first) = rest.chars().next() {
        let digits = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, ch)| ch.is_ascii_digit() != digits)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        tokens.push(if digits {
            Token::Number(run, run.parse::<u128>().unwrap_or(u128::MAX))
        } else {
            Token::Text(run)
        });
        rest = tail;
    }

    tokens
}

/// Strip `.` components and reject entries escaping the archive root.
pub fn sanitize_zip_path(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) | Component::RootDir => return None,
        }
    }

    if clean.as_os_str().is_empty() { None } else { Some(clean) }
}
