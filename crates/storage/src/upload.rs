use crate::error::Result;
use crate::{ObjectLocation, StoreHandle};
use std::time::Duration;
use tokio::io::AsyncRead;
use tracing::instrument;

/// Content type of every uploaded archive.
pub const CONTENT_TYPE: &str = "application/gzip";
/// Default lifetime of a retrieval link.
pub const LINK_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// Outcome of a successful [`Uploader::upload`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Bytes stored, as reported by the object store.
    pub bytes: u64,
    /// Time-limited link that retrieves the object without credentials.
    pub url: String,
}

/// Streams a reader into an object store, then hands out a time-limited link
/// to the stored object.
#[derive(Clone)]
pub struct Uploader {
    store: StoreHandle,
    link_expiry: Duration,
}

impl Uploader {
    pub fn new(store: StoreHandle) -> Self {
        Self { store, link_expiry: LINK_EXPIRY }
    }

    pub fn with_link_expiry(mut self, link_expiry: Duration) -> Self {
        self.link_expiry = link_expiry;
        self
    }

    pub fn link_expiry(&self) -> Duration {
        self.link_expiry
    }

    /// Upload everything `reader` produces to `location`.
    ///
    /// The reader is consumed by the attempt and always dropped before this
    /// returns, so a producer writing into the other end of a pipe is never
    /// left blocked. No retries are attempted.
    #[instrument(skip_all, fields(store = self.store.name(), destination = %location))]
    pub async fn upload<R>(&self, reader: R, location: &ObjectLocation, content_type: &str) -> Result<UploadReceipt>
    where
        R: AsyncRead + Send + 'static,
    {
        let bytes = self.store.upload(location, content_type, Box::pin(reader)).await?;
        tracing::debug!(bytes, "Object stored");
        let url = self.store.presign(location, self.link_expiry).await?;
        Ok(UploadReceipt { bytes, url })
    }
}
