use std::fs;
use std::path::{Path, PathBuf};

use plexcache::cleanup::CacheCleanup;
use plexcache::Error;
use tempfile::tempdir;

#[test]
fn test_deny_listed_roots_fail_construction() {
    for root in ["/mnt/user", "/mnt/user0/", "/", "/etc", "/mnt/cache/../user"] {
        let result = CacheCleanup::new(Path::new(root), vec!["TV".into()], &[]);
        assert!(
            matches!(result, Err(Error::ProtectedPath(_))),
            "{} must be refused",
            root
        );
    }
}

#[test]
fn test_configured_protected_path_refused() {
    let tmp = tempdir().unwrap();
    let cache = tmp.path().join("cache");
    fs::create_dir_all(cache.join("TV/Empty")).unwrap();

    let result = CacheCleanup::new(&cache, vec![], &[cache.clone()]);
    assert!(matches!(result, Err(Error::ProtectedPath(_))));
    assert!(cache.join("TV/Empty").is_dir());
}

#[test]
fn test_removes_nested_empty_folders_bottom_up() {
    let tmp = tempdir().unwrap();
    let cache = tmp.path().join("cache");
    fs::create_dir_all(cache.join("TV/Gone/Season 1")).unwrap();
    fs::create_dir_all(cache.join("TV/Kept/Season 2")).unwrap();
    fs::write(cache.join("TV/Kept/Season 2/e01.mkv"), "x").unwrap();

    let cleaned = CacheCleanup::new(&cache, vec!["TV".into()], &[])
        .unwrap()
        .cleanup(false);

    assert_eq!(cleaned, 2, "Season 1 and then its emptied show folder");
    assert!(!cache.join("TV/Gone").exists());
    assert!(cache.join("TV/Kept/Season 2/e01.mkv").is_file());
    assert!(cache.join("TV").is_dir(), "library folder itself is kept");
}

#[test]
fn test_only_configured_library_folders_swept() {
    let tmp = tempdir().unwrap();
    let cache = tmp.path().join("cache");
    let movies_empty = cache.join("Movies/Empty");
    let other_empty = cache.join("appdata/Empty");
    for d in [&movies_empty, &other_empty] {
        fs::create_dir_all(d).unwrap();
    }

    let cleaned = CacheCleanup::new(&cache, vec!["/Movies/".into(), "Missing".into()], &[])
        .unwrap()
        .cleanup(false);

    assert_eq!(cleaned, 1);
    assert!(!movies_empty.exists());
    assert!(other_empty.is_dir());
}

#[test]
fn test_without_library_folders_every_top_level_folder_is_swept() {
    let tmp = tempdir().unwrap();
    let cache = tmp.path().join("cache");
    let empties: Vec<PathBuf> = ["TV/a", "Movies/b"].iter().map(|d| cache.join(d)).collect();
    for d in &empties {
        fs::create_dir_all(d).unwrap();
    }

    let cleanup = CacheCleanup::new(&cache, vec![], &[]).unwrap();
    assert_eq!(cleanup.cleanup(true), 2);
    assert!(empties.iter().all(|d| d.is_dir()), "dry run removes nothing");

    assert_eq!(cleanup.cleanup(false), 2);
    assert!(empties.iter().all(|d| !d.exists()));
}
