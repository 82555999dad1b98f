//! Gzip'd tarball packaging.

use crate::error::{ErrorKind, Result};
use crate::scan::FileRecord;
use exn::ResultExt;
use flate2::{Compression as GzCompression, write::GzEncoder};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, Header, HeaderMode};
use tarship_asyncutils::PipeWriter;
use tracing::instrument;

// Packages are mostly images and other assets that are already compressed;
// spending CPU on a better ratio buys next to nothing.
const GZIP_LEVEL: GzCompression = GzCompression::fast();

/// Destination for a finished archive.
///
/// [`close()`](Sink::close) marks the archive as complete and is called
/// exactly once, only after the tar and gzip streams have been finalized. A
/// sink dropped without being closed belongs to an archive that failed.
pub trait Sink: Write {
    fn close(&mut self) -> io::Result<()>;
}

impl Sink for Vec<u8> {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for PipeWriter {
    fn close(&mut self) -> io::Result<()> {
        PipeWriter::close(self)
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Counts bytes successfully written to the wrapped writer and remembers
/// whether the writer itself ever failed.
pub struct CountingWriter<W> {
    inner: W,
    written: u64,
    failed: bool,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0, failed: false }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// `true` once any write or flush on the inner writer has errored.
    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.write(buf) {
            Ok(n) => {
                self.written += n as u64;
                Ok(n)
            },
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Err(err),
            Err(err) => {
                self.failed = true;
                Err(err)
            },
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().inspect_err(|_| self.failed = true)
    }
}

impl<S: Sink> Sink for CountingWriter<S> {
    fn close(&mut self) -> io::Result<()> {
        self.inner.close().inspect_err(|_| self.failed = true)
    }
}

/// Counts bytes read through it into a borrowed counter, which outlives the
/// reader handed to the tar builder.
struct CountingReader<'a, R> {
    inner: R,
    read: &'a mut u64,
}

impl<R: Read> Read for CountingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        *self.read += n as u64;
        Ok(n)
    }
}

/// Totals reported by a successful [`Packager::write`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PackageSummary {
    /// Archive entries written (files, directories, links, ...).
    pub entries: u64,
    /// Regular files among those entries.
    pub files: u64,
    /// Uncompressed file content copied into the archive.
    pub bytes: u64,
    /// Compressed bytes handed to the sink.
    pub archive_bytes: u64,
}

/// Writes [`FileRecord`]s into a gzip'd tarball where every entry lives under
/// a single top-level directory, so extraction yields exactly one folder.
///
/// # Examples
///
/// ```no_run
/// use tarship_package::{Packager, Scanner, filter};
///
/// # fn example() -> tarship_package::error::Result<()> {
/// let mut archive = Vec::new();
/// let summary = Packager::new("site").write(filter(Scanner::new("public")?), &mut archive)?;
/// println!("{} files, {} bytes compressed", summary.files, summary.archive_bytes);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Packager {
    root: PathBuf,
}

impl Packager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of a record inside the archive.
    pub fn entry_name(&self, relative_path: &Path) -> PathBuf {
        self.root.join(relative_path)
    }

    /// Package every record into `sink`, then close it.
    ///
    /// Records are written in the order received; for each one the header is
    /// written first, followed (for regular files only) by the file contents
    /// read from `base_dir/relative_path`. The first `Err` record aborts the
    /// whole archive.
    ///
    /// On failure the sink is dropped without being closed, after the tar and
    /// gzip writers have been dropped.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn write<I, S>(&self, records: I, sink: S) -> Result<PackageSummary>
    where
        I: IntoIterator<Item = Result<FileRecord>>,
        S: Sink,
    {
        let mut sink = CountingWriter::new(sink);
        let mut summary = match self.write_entries(records, &mut sink) {
            Ok(summary) => summary,
            // Blame the output, not the entry that happened to be in flight.
            Err(err) if sink.failed() => return Err(err.raise(ErrorKind::Sink)),
            Err(err) => return Err(err),
        };
        summary.archive_bytes = sink.written();
        sink.close().or_raise(|| ErrorKind::Sink)?;
        tracing::debug!(
            entries = summary.entries,
            files = summary.files,
            bytes = summary.bytes,
            archive_bytes = summary.archive_bytes,
            "Files compressed into a tarball"
        );
        Ok(summary)
    }

    fn write_entries<I, W>(&self, records: I, sink: &mut W) -> Result<PackageSummary>
    where
        I: IntoIterator<Item = Result<FileRecord>>,
        W: Write,
    {
        let mut summary = PackageSummary::default();
        let mut builder = Builder::new(GzEncoder::new(sink, GZIP_LEVEL));
        for record in records {
            let record = record.or_raise(|| ErrorKind::Scan)?;
            summary.bytes += self.append(&mut builder, &record)?;
            summary.entries += 1;
            if record.metadata.is_file() {
                summary.files += 1;
            }
        }
        let encoder = builder.into_inner().or_raise(|| ErrorKind::Finish)?;
        encoder.finish().or_raise(|| ErrorKind::Finish)?;
        Ok(summary)
    }

    /// Append a single record, returning the number of content bytes copied.
    fn append<W: Write>(&self, builder: &mut Builder<W>, record: &FileRecord) -> Result<u64> {
        let name = self.entry_name(&record.relative_path);
        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(&record.metadata, HeaderMode::Complete);

        let file_type = record.metadata.file_type();
        if file_type.is_symlink() {
            let target = record.symlink_target.as_deref().unwrap_or_else(|| Path::new(""));
            builder.append_link(&mut header, &name, target).or_raise(|| ErrorKind::Header(name.clone()))?;
            return Ok(0);
        }
        if !file_type.is_file() {
            // Directories and special files are header-only.
            header.set_size(0);
            builder.append_data(&mut header, &name, io::empty()).or_raise(|| ErrorKind::Header(name.clone()))?;
            return Ok(0);
        }

        let source = record.absolute_path();
        let file = File::open(&source).or_raise(|| ErrorKind::Open(source.clone()))?;
        let size = record.metadata.len();
        let mut copied = 0;
        // Never copy more than the header promised, even if the file grew.
        let body = CountingReader { inner: file.take(size), read: &mut copied };
        builder.append_data(&mut header, &name, body).or_raise(|| ErrorKind::Copy(name.clone()))?;
        // The builder pads a short body instead of failing, so a file that
        // shrank since it was scanned has to be caught here.
        if copied < size {
            tracing::warn!(entry = %name.display(), expected = size, copied, "File shrank while being packaged");
            exn::bail!(ErrorKind::Copy(name));
        }
        Ok(size)
    }
}
