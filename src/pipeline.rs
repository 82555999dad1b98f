//! Package a directory straight into the object store.
//!
//! The packager runs on a blocking thread and writes into a bounded pipe; the
//! uploader drains the other end concurrently, so the archive is never held
//! in full on disk or in memory.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::Path;
use std::time::Duration;
use tarship_asyncutils::{ProgressReader, pipe};
use tarship_package::error::{ErrorKind as PackageErrorKind, Result as PackageResult};
use tarship_package::{FileRecord, PackageSummary, Packager, Scanner, filter};
use tarship_storage::{CONTENT_TYPE, ObjectLocation, UploadReceipt, Uploader, byte_count_decimal, report};
use tracing::instrument;

/// Outcome of a successful [`package_and_upload()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shipment {
    pub package: PackageSummary,
    pub receipt: UploadReceipt,
    /// Bytes the uploader read from the pipe.
    pub transferred: u64,
}

/// Package `source` under `archive_root` and upload it to `destination`.
///
/// A missing or non-directory `source` is reported before anything is
/// uploaded.
#[instrument(skip_all, fields(source = %source.display(), destination = %destination))]
pub async fn package_and_upload(
    source: &Path,
    archive_root: &str,
    uploader: &Uploader,
    destination: &ObjectLocation,
    report_every: Duration,
) -> Result<Shipment> {
    let scanner = Scanner::new(source).or_raise(|| ErrorKind::Packaging)?;
    tracing::info!("Packaging and uploading");
    ship(filter(scanner), archive_root, uploader, destination, report_every).await
}

/// Run the packager over `records` and the uploader concurrently, joined by a
/// pipe.
///
/// When both sides fail, the packager's error wins unless all it saw was the
/// uploader going away; an upload that fails early would otherwise be
/// reported as a broken archive.
pub(crate) async fn ship<I>(
    records: I,
    archive_root: &str,
    uploader: &Uploader,
    destination: &ObjectLocation,
    report_every: Duration,
) -> Result<Shipment>
where
    I: IntoIterator<Item = PackageResult<FileRecord>> + Send + 'static,
{
    let (writer, reader) = pipe();
    let packager = Packager::new(archive_root);
    let producer = tokio::task::spawn_blocking(move || packager.write(records, writer));

    let reader = ProgressReader::new(reader);
    let progress = reader.progress();
    let reporter = tokio::spawn(report(progress.clone(), report_every));
    let uploaded = uploader.upload(reader, destination, CONTENT_TYPE).await;
    reporter.abort();
    let packaged = producer.await;

    let (package, receipt) = match (packaged, uploaded) {
        (Ok(Ok(package)), Ok(receipt)) => (package, receipt),
        (Err(join), _) => return Err(exn::Exn::from(join).raise(ErrorKind::Packaging)),
        (Ok(Err(err)), Err(upload)) if matches!(&*err, PackageErrorKind::Sink) => {
            return Err(upload.raise(ErrorKind::Upload));
        },
        (Ok(Err(err)), _) => return Err(err.raise(ErrorKind::Packaging)),
        (Ok(Ok(_)), Err(upload)) => return Err(upload.raise(ErrorKind::Upload)),
    };

    let transferred = progress.bytes_transferred();
    if transferred != package.archive_bytes {
        tracing::warn!(transferred, produced = package.archive_bytes, "Uploaded size differs from archive size");
    }
    tracing::info!(
        files = package.files,
        size = %byte_count_decimal(package.bytes),
        compressed = %byte_count_decimal(receipt.bytes),
        "Upload complete"
    );
    Ok(Shipment { package, receipt, transferred })
}
