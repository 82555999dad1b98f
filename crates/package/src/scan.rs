//! Lazy directory traversal.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

/// One filesystem entry discovered by a [`Scanner`].
///
/// Metadata is taken from the entry itself, never from the target of a
/// symbolic link.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute root of the scan, shared by every record from the same scan.
    pub base_dir: Arc<Path>,
    /// Path relative to [`base_dir`](Self::base_dir); `.` is the root itself.
    pub relative_path: PathBuf,
    /// Unresolved link target, populated only for symbolic links.
    pub symlink_target: Option<PathBuf>,
    pub metadata: Metadata,
}

impl FileRecord {
    pub fn new(base_dir: Arc<Path>, relative_path: impl Into<PathBuf>, metadata: Metadata) -> Self {
        Self {
            base_dir,
            relative_path: relative_path.into(),
            symlink_target: None,
            metadata,
        }
    }

    pub fn with_symlink_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.symlink_target = Some(target.into());
        self
    }

    pub fn absolute_path(&self) -> PathBuf {
        self.base_dir.join(&self.relative_path)
    }

    pub fn is_root(&self) -> bool {
        self.relative_path == Path::new(".")
    }
}

/// Walks a directory tree, yielding one [`FileRecord`] per entry (the root
/// directory included, as `.`).
///
/// Traversal is lazy and depth-first, with entries sorted by file name inside
/// each directory so that an unchanged tree always produces the same
/// sequence. Symbolic links are recorded, never followed.
///
/// An entry that cannot be read is yielded as an
/// [`Unreadable`](ErrorKind::Unreadable) error in place of its record; the
/// walk carries on afterwards and it is up to the consumer to stop.
///
/// # Examples
///
/// ```no_run
/// use tarship_package::Scanner;
///
/// # fn example() -> tarship_package::error::Result<()> {
/// for record in Scanner::new("public")? {
///     let record = record?;
///     println!("{}", record.relative_path.display());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Scanner {
    base_dir: Arc<Path>,
    walker: walkdir::IntoIter,
}

impl Scanner {
    /// Prepare a scan of `base_dir`.
    ///
    /// # Errors
    ///
    /// Fails immediately with [`NotFound`](ErrorKind::NotFound) when the path
    /// does not exist and [`NotADirectory`](ErrorKind::NotADirectory) when it
    /// is not a directory. Nothing is read beyond the base path itself.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let metadata = match fs::metadata(base_dir) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                exn::bail!(ErrorKind::NotFound(base_dir.to_path_buf()))
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Unreadable(base_dir.to_path_buf())),
        };
        if !metadata.is_dir() {
            exn::bail!(ErrorKind::NotADirectory(base_dir.to_path_buf()));
        }
        let base_dir: Arc<Path> =
            std::path::absolute(base_dir).or_raise(|| ErrorKind::Unreadable(base_dir.to_path_buf()))?.into();
        let walker = WalkDir::new(&base_dir).follow_links(false).sort_by_file_name().into_iter();
        Ok(Self { base_dir, walker })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record(&self, entry: DirEntry) -> Result<FileRecord> {
        let path = entry.path();
        let relative = match path.strip_prefix(&self.base_dir) {
            Ok(relative) if relative.as_os_str().is_empty() => PathBuf::from("."),
            Ok(relative) => relative.to_path_buf(),
            Err(_) => exn::bail!(ErrorKind::Unreadable(path.to_path_buf())),
        };
        let metadata = entry.metadata().or_raise(|| ErrorKind::Unreadable(path.to_path_buf()))?;
        let record = FileRecord::new(Arc::clone(&self.base_dir), relative, metadata);
        if !entry.path_is_symlink() {
            return Ok(record);
        }
        // Read, never follow: a dangling link is still a valid record.
        let target = fs::read_link(path).or_raise(|| ErrorKind::Unreadable(path.to_path_buf()))?;
        Ok(record.with_symlink_target(target))
    }
}

impl Iterator for Scanner {
    type Item = Result<FileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.walker.next()? {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(self.base_dir.as_ref()).to_path_buf();
                return Some(Err(err).or_raise(|| ErrorKind::Unreadable(path)));
            },
        };
        Some(self.record(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::BTreeSet;

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn relative_paths(scanner: Scanner) -> Vec<PathBuf> {
        scanner.map(|record| record.unwrap().relative_path).collect()
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = Scanner::new(temp_dir.path().join("not-exist")).err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_not_a_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "file1", b"0123456789");
        let err = Scanner::new(temp_dir.path().join("file1")).err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotADirectory(_)));
    }

    #[test]
    fn test_empty_directory_yields_only_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let records: Vec<_> = Scanner::new(temp_dir.path()).unwrap().map(Result::unwrap).collect();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_root());
        assert!(records[0].metadata.is_dir());
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 0)]
    #[case(3, 2)]
    #[case(5, 4)]
    fn test_counts_files_and_directories(#[case] files: usize, #[case] dirs: usize) {
        let temp_dir = tempfile::tempdir().unwrap();
        for d in 0..dirs {
            fs::create_dir(temp_dir.path().join(format!("dir{d}"))).unwrap();
        }
        for f in 0..files {
            let relative = match dirs {
                0 => format!("file{f}"),
                _ => format!("dir{}/file{f}", f % dirs),
            };
            write(temp_dir.path(), &relative, b"data");
        }
        let records = relative_paths(Scanner::new(temp_dir.path()).unwrap());
        assert_eq!(records.len(), files + dirs + 1);
    }

    #[test]
    fn test_relative_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "file1", b"0123456789");
        write(temp_dir.path(), "dir1/file2", b"01234");
        write(temp_dir.path(), "dir1/nested/file3", b"");
        let records: BTreeSet<_> = relative_paths(Scanner::new(temp_dir.path()).unwrap()).into_iter().collect();
        let expected: BTreeSet<_> = [".", "dir1", "dir1/file2", "dir1/nested", "dir1/nested/file3", "file1"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(records, expected);
    }

    #[test]
    fn test_order_is_deterministic() {
        let temp_dir = tempfile::tempdir().unwrap();
        for name in ["b", "a", "c/z", "c/y", "d"] {
            write(temp_dir.path(), name, name.as_bytes());
        }
        let first = relative_paths(Scanner::new(temp_dir.path()).unwrap());
        let second = relative_paths(Scanner::new(temp_dir.path()).unwrap());
        assert_eq!(first, second);
        assert_eq!(first[0], PathBuf::from("."));
    }

    #[test]
    fn test_base_dir_is_absolute() {
        let temp_dir = tempfile::tempdir().unwrap();
        let scanner = Scanner::new(temp_dir.path()).unwrap();
        assert!(scanner.base_dir().is_absolute());
        for record in scanner {
            let record = record.unwrap();
            assert!(record.base_dir.is_absolute());
            assert!(record.absolute_path().starts_with(temp_dir.path()));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_read_not_followed() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path(), "file1", b"0123456789");
        write(temp_dir.path(), "dir1/file2", b"01234");
        symlink("file1", temp_dir.path().join("symlink1")).unwrap();
        symlink("does-not-exist", temp_dir.path().join("broken")).unwrap();
        symlink("dir1", temp_dir.path().join("dirlink")).unwrap();

        let records: Vec<_> = Scanner::new(temp_dir.path()).unwrap().map(Result::unwrap).collect();
        // 2 files + 1 directory + 3 symlinks + the root; the directory link
        // is recorded but never descended into.
        assert_eq!(records.len(), 7);
        let find = |name: &str| records.iter().find(|r| r.relative_path == Path::new(name)).unwrap();
        assert_eq!(find("symlink1").symlink_target.as_deref(), Some(Path::new("file1")));
        assert_eq!(find("broken").symlink_target.as_deref(), Some(Path::new("does-not-exist")));
        assert_eq!(find("dirlink").symlink_target.as_deref(), Some(Path::new("dir1")));
        assert!(find("symlink1").metadata.file_type().is_symlink());
        assert!(find("file1").symlink_target.is_none());
    }
}
