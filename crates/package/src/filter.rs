use crate::error::Result;
use crate::scan::FileRecord;
use std::ffi::OsStr;
use std::path::{Component, Path};

const VCS_DIRECTORY: &str = ".git";

/// Returns `true` for paths that never belong in a package: the scan root
/// itself (`.`) and anything at or below a `.git` path segment.
///
/// Matching is per path component, so `.github/`, `.gitignore` and `a.git`
/// are all kept.
pub fn is_excluded(relative_path: &Path) -> bool {
    relative_path == Path::new(".")
        || relative_path.components().any(|component| component == Component::Normal(OsStr::new(VCS_DIRECTORY)))
}

/// Iterator adapter returned by [`filter()`].
pub struct EntryFilter<I> {
    inner: I,
    dropped: u64,
    exhausted: bool,
}

/// Drop [excluded](is_excluded) records from a scan, keeping everything else
/// (errors included) in its original order.
///
/// Once the underlying sequence is exhausted, the number of dropped records
/// is logged once.
pub fn filter<I>(records: I) -> EntryFilter<I::IntoIter>
where
    I: IntoIterator<Item = Result<FileRecord>>,
{
    EntryFilter {
        inner: records.into_iter(),
        dropped: 0,
        exhausted: false,
    }
}

impl<I> EntryFilter<I> {
    /// Number of records dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<I> Iterator for EntryFilter<I>
where
    I: Iterator<Item = Result<FileRecord>>,
{
    type Item = Result<FileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next() {
                Some(Ok(record)) if is_excluded(&record.relative_path) => self.dropped += 1,
                Some(item) => return Some(item),
                None => {
                    if !self.exhausted {
                        self.exhausted = true;
                        tracing::debug!(dropped = self.dropped, "Excluded entries from package");
                    }
                    return None;
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rstest::rstest;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn record(base: &Arc<Path>, relative: &str) -> Result<FileRecord> {
        Ok(FileRecord::new(Arc::clone(base), relative, std::fs::metadata(base).unwrap()))
    }

    #[rstest]
    #[case(".", true)]
    #[case(".git", true)]
    #[case(".git/config", true)]
    #[case(".git/objects/ab/cdef", true)]
    #[case("vendor/module/.git", true)]
    #[case("vendor/module/.git/HEAD", true)]
    #[case(".github", false)]
    #[case(".github/workflows/ci.yml", false)]
    #[case(".gitignore", false)]
    #[case("a.git", false)]
    #[case("my.git/file", false)]
    #[case("file1", false)]
    #[case("dir1/file2", false)]
    fn test_is_excluded(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_excluded(Path::new(path)), expected);
    }

    #[test]
    fn test_filter_preserves_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let base: Arc<Path> = temp_dir.path().into();
        let input = [".", ".git", ".git/HEAD", "b", "a", ".github", "c/.git/x", "c/d"];
        let mut filtered = filter(input.iter().map(|path| record(&base, path)));
        let kept: Vec<PathBuf> = filtered.by_ref().map(|r| r.unwrap().relative_path).collect();
        let expected: Vec<PathBuf> = ["b", "a", ".github", "c/d"].into_iter().map(PathBuf::from).collect();
        assert_eq!(kept, expected);
        assert_eq!(filtered.dropped(), 4);
    }

    #[test]
    fn test_errors_pass_through() {
        let temp_dir = tempfile::tempdir().unwrap();
        let base: Arc<Path> = temp_dir.path().into();
        let input = vec![
            record(&base, "."),
            Err(exn::Exn::from(ErrorKind::Unreadable(PathBuf::from(".git/locked")))),
            record(&base, "file1"),
        ];
        let output: Vec<_> = filter(input).collect();
        assert_eq!(output.len(), 2);
        assert!(matches!(output[0].as_ref().map_err(|e| &**e), Err(ErrorKind::Unreadable(_))));
        assert_eq!(output[1].as_ref().unwrap().relative_path, PathBuf::from("file1"));
    }
}
