// tests/store.rs

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use jarwatch::fs::mock::MockFileSystem;
use jarwatch::fs::RealFileSystem;
use jarwatch::store::{relative_str, ArtifactMatcher, ArtifactStore};

fn store_over(fs: &MockFileSystem, exclude: &[&str]) -> ArtifactStore {
    let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
    let matcher = ArtifactMatcher::new(&["*.jar".to_string()], &exclude).unwrap();
    ArtifactStore::new("/deploy", matcher, Arc::new(fs.clone()))
}

#[test]
fn lists_only_matching_files_sorted_by_name() {
    let fs = MockFileSystem::new();
    fs.add_file("/deploy/zeta.jar", b"z".to_vec());
    fs.add_file("/deploy/alpha.jar", b"aa".to_vec());
    fs.add_file("/deploy/readme.txt", b"r".to_vec());
    fs.add_file("/deploy/app-sources.jar", b"s".to_vec());
    fs.add_file("/deploy/nested/inner.jar", b"n".to_vec());

    let store = store_over(&fs, &["*-sources.jar"]);
    let names: Vec<String> = store.list_artifacts().into_iter().map(|a| a.name).collect();

    assert_eq!(names, vec!["alpha.jar", "zeta.jar"]);
}

#[test]
fn artifact_carries_size_and_mtime() {
    let fs = MockFileSystem::new();
    let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    fs.add_file_with_mtime("/deploy/app.jar", vec![0u8; 42], mtime);

    let store = store_over(&fs, &[]);
    let artifact = store.find("app.jar").unwrap();

    assert_eq!(artifact.size, 42);
    assert_eq!(artifact.modified.timestamp(), 1_700_000_000);
    assert_eq!(artifact.path, Path::new("/deploy/app.jar"));
}

#[test]
fn missing_directory_lists_nothing() {
    let fs = MockFileSystem::new();
    let matcher = ArtifactMatcher::new(&["*.jar".to_string()], &[]).unwrap();
    let store = ArtifactStore::new("/does/not/exist", matcher, Arc::new(fs));

    assert!(store.list_artifacts().is_empty());
}

#[test]
fn deleted_candidate_still_has_a_name() {
    let fs = MockFileSystem::new();
    fs.add_file("/deploy/app.jar", b"x".to_vec());
    let store = store_over(&fs, &[]);

    fs.remove_file("/deploy/app.jar");

    let path = Path::new("/deploy/app.jar");
    assert!(store.artifact_at(path).is_none());
    assert_eq!(store.candidate_name(path).as_deref(), Some("app.jar"));
    assert!(store.is_candidate(path));
    assert!(!store.is_candidate(Path::new("/deploy/notes.txt")));
    assert!(!store.is_candidate(Path::new("/elsewhere/app.jar")));
}

#[test]
fn find_rejects_path_like_names() {
    let fs = MockFileSystem::new();
    fs.add_file("/deploy/app.jar", b"x".to_vec());
    let store = store_over(&fs, &[]);

    assert!(store.find("../deploy/app.jar").is_none());
    assert!(store.find("nope.jar").is_none());
    assert!(store.find("app.jar").is_some());
}

#[test]
fn real_directory_is_canonicalized() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.jar"), b"x").unwrap();

    let matcher = ArtifactMatcher::new(&["*.jar".to_string()], &[]).unwrap();
    let store = ArtifactStore::new(dir.path(), matcher, Arc::new(RealFileSystem));

    assert_eq!(store.dir(), dir.path().canonicalize().unwrap());
    assert_eq!(store.list_artifacts().len(), 1);
    assert_eq!(
        relative_str(store.dir(), &store.dir().join("a.jar")).as_deref(),
        Some("a.jar")
    );
}
