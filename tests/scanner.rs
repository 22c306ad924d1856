// tests/scanner.rs

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Result, anyhow};

use jarwatch::fs::mock::MockFileSystem;
use jarwatch::fs::{FileMeta, FileSystem, ReadSeek, RealFileSystem};
use jarwatch::scan::deny::default_deny_list;
use jarwatch::scan::{DenyList, SecurityScanner, UNREADABLE_SIGNATURE};
use jarwatch::store::{Artifact, ArtifactMatcher, ArtifactStore};
use jarwatch::types::Severity;
use jarwatch_test_utils::fixtures::{jar_bytes, padded_jar_bytes, write_jar};

const DIR: &str = "/deploy";

fn mock_with(files: &[(&str, Vec<u8>)]) -> (MockFileSystem, ArtifactStore) {
    let fs = MockFileSystem::new();
    for (name, bytes) in files {
        fs.add_file(Path::new(DIR).join(name), bytes.clone());
    }
    let matcher = ArtifactMatcher::new(&["*.jar".to_string()], &[]).unwrap();
    let store = ArtifactStore::new(DIR, matcher, Arc::new(fs.clone()));
    (fs, store)
}

fn default_scanner(fs: Arc<dyn FileSystem>) -> SecurityScanner {
    SecurityScanner::new(DenyList::new(&default_deny_list(), &[]).unwrap(), fs)
}

fn artifact(store: &ArtifactStore, name: &str) -> Artifact {
    store.find(name).expect("artifact present")
}

#[test]
fn vulnerable_log4j_entry_yields_exactly_one_warning() {
    let (fs, store) = mock_with(&[(
        "app.jar",
        jar_bytes(&[
            "META-INF/MANIFEST.MF",
            "BOOT-INF/lib/log4j-core-2.14.jar",
            "BOOT-INF/lib/slf4j-api-1.7.36.jar",
        ])
        .unwrap(),
    )]);
    let scanner = default_scanner(Arc::new(fs));

    let findings = scanner.scan(&artifact(&store, "app.jar"));

    assert_eq!(findings.len(), 1);
    let finding = &findings[0];
    assert_eq!(finding.artifact, "app.jar");
    assert_eq!(finding.entry.as_deref(), Some("BOOT-INF/lib/log4j-core-2.14.jar"));
    assert_eq!(finding.signature, "log4j-core-2.14");
    assert_eq!(finding.severity, Severity::Warn);
    assert!(!finding.is_unreadable());
}

#[test]
fn clean_archive_has_no_findings() {
    let (fs, store) = mock_with(&[(
        "clean.jar",
        jar_bytes(&["META-INF/MANIFEST.MF", "lib/log4j-core-2.17.1.jar"]).unwrap(),
    )]);
    let scanner = default_scanner(Arc::new(fs));

    assert!(scanner.scan(&artifact(&store, "clean.jar")).is_empty());
}

#[test]
fn garbage_file_yields_single_unreadable_finding() {
    let (fs, store) = mock_with(&[("broken.jar", b"this is not a zip".to_vec())]);
    let scanner = default_scanner(Arc::new(fs));

    let findings = scanner.scan(&artifact(&store, "broken.jar"));

    assert_eq!(findings.len(), 1);
    assert!(findings[0].is_unreadable());
    assert_eq!(findings[0].signature, UNREADABLE_SIGNATURE);
    assert!(findings[0].entry.is_none());
}

#[test]
fn one_finding_per_entry_even_with_several_signatures() {
    let deny = DenyList::new(&["log4j".to_string(), "core-2.14".to_string()], &[]).unwrap();
    let (fs, store) = mock_with(&[(
        "app.jar",
        jar_bytes(&["lib/log4j-core-2.14.jar", "lib/log4j-api-2.14.jar"]).unwrap(),
    )]);
    let scanner = SecurityScanner::new(deny, Arc::new(fs));

    let findings = scanner.scan(&artifact(&store, "app.jar"));

    assert_eq!(findings.len(), 2);
    // First configured signature wins.
    assert!(findings.iter().all(|f| f.signature == "log4j"));
}

#[test]
fn matching_is_case_insensitive_and_regex_is_supported() {
    let deny = DenyList::new(
        &["Log4J-Core-2.14".to_string()],
        &[r"^lib/bad-[0-9]+\.jar$".to_string()],
    )
    .unwrap();

    assert_eq!(
        deny.first_match("LIB/LOG4J-CORE-2.14.1.JAR").as_deref(),
        Some("Log4J-Core-2.14")
    );
    assert_eq!(
        deny.first_match("lib/bad-42.jar").as_deref(),
        Some(r"^lib/bad-[0-9]+\.jar$")
    );
    assert_eq!(deny.first_match("lib/good-42.jar"), None);
}

#[test]
fn entries_lists_archive_in_order() {
    let (fs, store) = mock_with(&[("app.jar", jar_bytes(&["a.txt", "b/c.class"]).unwrap())]);
    let scanner = default_scanner(Arc::new(fs));

    let entries = scanner.entries(&artifact(&store, "app.jar")).unwrap();
    assert_eq!(entries, vec!["a.txt", "b/c.class"]);
}

#[test]
fn entries_of_garbage_is_an_error() {
    let (fs, store) = mock_with(&[("broken.jar", b"PK?".to_vec())]);
    let scanner = default_scanner(Arc::new(fs));

    assert!(scanner.entries(&artifact(&store, "broken.jar")).is_err());
}

#[test]
fn scanner_works_against_real_files() {
    let dir = tempfile::tempdir().unwrap();
    write_jar(dir.path().join("real.jar"), &["lib/xstream-1.4.17.jar"]).unwrap();

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let matcher = ArtifactMatcher::new(&["*.jar".to_string()], &[]).unwrap();
    let store = ArtifactStore::new(dir.path(), matcher, Arc::clone(&fs));
    let scanner = default_scanner(fs);

    let findings = scanner.scan(&artifact(&store, "real.jar"));
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].signature, "xstream-1.4.17");
}

/// Filesystem that refuses whole-file reads and counts bytes pulled through
/// seekable readers.
#[derive(Debug)]
struct CountingFs {
    inner: MockFileSystem,
    read: Arc<AtomicU64>,
}

struct CountingReader {
    inner: Box<dyn ReadSeek>,
    read: Arc<AtomicU64>,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read.fetch_add(n as u64, Ordering::SeqCst);
        Ok(n)
    }
}

impl Seek for CountingReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl FileSystem for CountingFs {
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        Err(anyhow!("whole-file read of {:?}", path))
    }
    fn open_seekable(&self, path: &Path) -> Result<Box<dyn ReadSeek>> {
        Ok(Box::new(CountingReader {
            inner: self.inner.open_seekable(path)?,
            read: Arc::clone(&self.read),
        }))
    }
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }
    fn is_file(&self, path: &Path) -> bool {
        self.inner.is_file(path)
    }
    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }
    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        self.inner.canonicalize(path)
    }
    fn metadata(&self, path: &Path) -> Result<FileMeta> {
        self.inner.metadata(path)
    }
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.inner.read_dir(path)
    }
}

#[test]
fn scan_reads_only_the_archive_directory() {
    const PADDING: usize = 4 * 1024 * 1024;
    let (mock, store) = mock_with(&[(
        "fat.jar",
        padded_jar_bytes(&["BOOT-INF/lib/log4j-core-2.14.jar"], PADDING).unwrap(),
    )]);
    let read = Arc::new(AtomicU64::new(0));
    let fs = CountingFs {
        inner: mock,
        read: Arc::clone(&read),
    };
    let scanner = default_scanner(Arc::new(fs));

    let fat = artifact(&store, "fat.jar");
    assert!(fat.size as usize > PADDING);
    let findings = scanner.scan(&fat);

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].signature, "log4j-core-2.14");
    let consumed = read.load(Ordering::SeqCst);
    assert!(consumed > 0);
    assert!(
        consumed < (PADDING / 4) as u64,
        "scanner pulled {consumed} bytes of a {PADDING}-byte payload"
    );
}
