mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{FakeBackend, SUM_C};
use mutorch::error::Error;
use mutorch::sources::{SourceCache, SourceFile};
use mutorch::{FileLocationRange, Location, Snapshot};
use proptest::prelude::*;

fn base() -> Snapshot {
    Snapshot::new("base", "base-image")
}

// --- cache ---

#[test]
fn files_are_read_once_per_snapshot() {
    let backend = FakeBackend::new();
    let cache = SourceCache::new(backend.clone());

    assert_eq!(cache.read(&base(), "sum.c").unwrap(), SUM_C);
    assert_eq!(cache.num_lines(&base(), "sum.c").unwrap(), 4);
    assert_eq!(cache.line_offsets(&base(), "sum.c").unwrap(), vec![0, 12, 43, 54]);
    assert_eq!(backend.reads.load(Ordering::SeqCst), 1);

    let other = Snapshot::new("other", "base-image");
    cache.read(&other, "sum.c").unwrap();
    assert_eq!(backend.reads.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 2);
}

#[test]
fn forgotten_files_are_read_again() {
    let backend = FakeBackend::new();
    let cache = SourceCache::new(backend.clone());
    cache.prefetch(&base(), ["sum.c", "add.c"]).unwrap();
    assert_eq!(cache.len(), 2);

    cache.forget(&base(), "sum.c");
    assert_eq!(cache.len(), 1);
    cache.read(&base(), "sum.c").unwrap();
    assert_eq!(backend.reads.load(Ordering::SeqCst), 3);

    cache.forget_snapshot("base");
    assert!(cache.is_empty());
}

#[test]
fn missing_file_is_file_not_found() {
    let cache = SourceCache::new(FakeBackend::new());
    assert_eq!(
        cache.read(&base(), "nope.c").unwrap_err(),
        Error::FileNotFound("nope.c".into())
    );
    assert!(cache.is_empty());
}

#[test]
fn read_line_and_chars() {
    let cache = SourceCache::new(FakeBackend::new());
    assert_eq!(cache.read_line(&base(), "sum.c", 1).unwrap(), "int sm = 0;");
    assert_eq!(cache.read_line(&base(), "sum.c", 4).unwrap(), "}");

    let loc: FileLocationRange = "sum.c@1:0::1:3".parse().unwrap();
    assert_eq!(cache.read_chars(&base(), &loc).unwrap(), "int");

    let across: FileLocationRange = "sum.c@2:29::3:4".parse().unwrap();
    assert_eq!(cache.read_chars(&base(), &across).unwrap(), "{\n  sm");
}

#[test]
fn offsets_and_locations_agree() {
    let cache = SourceCache::new(FakeBackend::new());
    assert_eq!(cache.line_col_to_offset(&base(), "sum.c", 3, 2).unwrap(), 45);
    assert_eq!(cache.offset_to_line_col(&base(), "sum.c", 45).unwrap(), Location::new(3, 2));
    assert_eq!(cache.offset_to_line_col(&base(), "sum.c", SUM_C.len()).unwrap(), Location::new(4, 1));
}

#[test]
fn empty_file_has_one_line() {
    let file = SourceFile::new("");
    assert_eq!(file.num_lines(), 1);
    assert_eq!(file.line(1).unwrap(), "");
    assert_eq!(file.line_col_to_offset(1, 0).unwrap(), 0);
}

#[test]
fn cache_is_shared_between_threads() {
    let backend = FakeBackend::new();
    let cache = Arc::new(SourceCache::new(backend.clone()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            std::thread::spawn(move || cache.read(&base(), "add.c").unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), common::ADD_C);
    }
    assert_eq!(cache.len(), 1);
}

// --- properties ---

proptest! {
    #[test]
    fn offset_round_trip(lines in prop::collection::vec("[a-z =;(){}é]{0,20}", 1..12), pick in any::<prop::sample::Index>()) {
        let text = lines.join("\n");
        let file = SourceFile::new(text.as_str());

        let line = pick.index(lines.len()) + 1;
        let content = &lines[line - 1];
        for (column, _) in content.char_indices().chain(std::iter::once((content.len(), ' '))) {
            let offset = file.line_col_to_offset(line, column).unwrap();
            prop_assert_eq!(file.offset_to_line_col(offset).unwrap(), Location::new(line, column));
            prop_assert_eq!(&text[offset..offset + (content.len() - column)], &content[column..]);
        }
    }
}
