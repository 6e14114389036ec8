use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use comic_core::{LoadOptions, Loader, ReadingSession, SettingsStore};
use zip::write::FileOptions;

fn write_cbz(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for page in 1..=pages {
        zip.start_file(format!("{page:02}.jpg"), FileOptions::default()).unwrap();
        zip.write_all(format!("{name}#{page}").as_bytes()).unwrap();
    }
    let path = dir.join(name);
    std::fs::write(&path, zip.finish().unwrap().into_inner()).unwrap();
    path
}

fn session() -> ReadingSession {
    ReadingSession::new(Loader::new(LoadOptions { initial_batch: 3, background: false }))
}

fn first_text(session: &mut ReadingSession) -> Option<String> {
    session.go_to_page(session.bookmark()?.page_number()).map(|s| {
        String::from_utf8_lossy(&s.first).into_owned()
    })
}

#[test]
fn next_file_continues_with_sibling_archives() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_cbz(dir.path(), "issue-1.cbz", 2);
    write_cbz(dir.path(), "issue-2.cbz", 3);
    std::fs::write(dir.path().join("cover.png"), b"not an archive").unwrap();

    let mut session = session();
    session.open(&[first]).unwrap();

    let spread = session.next_file().unwrap().expect("sibling archive");
    assert_eq!(&spread.first[..], b"issue-2.cbz#1");
    assert!(session.status().unwrap().location.ends_with("issue-2.cbz"));

    assert!(session.next_file().unwrap().is_none());
    assert!(session.status().unwrap().location.ends_with("issue-2.cbz"));

    let back = session.previous_file().unwrap().expect("previous sibling");
    assert_eq!(&back.first[..], b"issue-1.cbz#1");
}

#[test]
fn unreadable_sibling_archives_are_stepped_over() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_cbz(dir.path(), "a.cbz", 1);
    std::fs::write(dir.path().join("b.cbr"), b"Rar!\x1a\x07\x00 damaged").unwrap();
    write_cbz(dir.path(), "c.cbz", 2);

    let mut session = session();
    session.open(&[first]).unwrap();

    let spread = session.next_file().unwrap().expect("readable sibling");
    assert_eq!(&spread.first[..], b"c.cbz#1");
    assert!(session.status().unwrap().location.ends_with("c.cbz"));

    let back = session.previous_file().unwrap().expect("readable sibling");
    assert_eq!(&back.first[..], b"a.cbz#1");
}

#[test]
fn renamed_zip_with_cbr_extension_opens() {
    let dir = tempfile::tempdir().unwrap();
    let zip = write_cbz(dir.path(), "scan.cbz", 2);
    let renamed = dir.path().join("scan.cbr");
    std::fs::rename(&zip, &renamed).unwrap();

    let mut session = session();
    let spread = session.open(&[renamed]).unwrap().expect("first page");
    assert_eq!(&spread.first[..], b"scan.cbz#1");
}

#[test]
fn bookmarks_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![write_cbz(dir.path(), "a.cbz", 2), write_cbz(dir.path(), "b.cbz", 4)];
    let store = SettingsStore::at(dir.path().join("config/settings.json"));

    let mut session = session();
    session.open(&paths).unwrap();
    for _ in 0..4 {
        session.next_page();
    }
    let bookmark = session.bookmark().unwrap();
    store
        .update(|settings| {
            settings.resume = Some(bookmark.clone());
            settings.add_bookmark(bookmark.clone());
        })
        .unwrap();

    let settings = store.load().unwrap();
    let resume = settings.resume_available().expect("files still present");
    let mut restarted = self::session();
    restarted.resume(resume).unwrap();

    let status = restarted.status().unwrap();
    assert_eq!((status.file_number, status.page_number), (2, 5));
    assert_eq!(first_text(&mut restarted).as_deref(), Some("b.cbz#3"));
}

#[test]
fn double_page_mode_steps_back_over_the_spread() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_cbz(dir.path(), "spreads.cbz", 8);

    let mut session = session();
    session.set_double_page(true);
    let opened = session.open(&[path]).unwrap().unwrap();
    assert_eq!(&opened.first[..], b"spreads.cbz#1");
    assert_eq!(opened.second.as_deref(), Some(&b"spreads.cbz#2"[..]));

    session.next_page();
    let spread = session.next_page().unwrap();
    assert_eq!(&spread.first[..], b"spreads.cbz#5");

    let back = session.previous_page().unwrap();
    assert_eq!(&back.first[..], b"spreads.cbz#3");
    assert_eq!(back.second.as_deref(), Some(&b"spreads.cbz#4"[..]));
}
