//! Object store trait and implementations.
//!
//! This module defines the `ObjectStore` trait, the narrow interface the
//! uploader needs from a remote object store: stream one object in, then hand
//! out a temporary link to it.

#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(feature = "s3")]
mod s3;

#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::ObjectLocation;
use crate::error::Result;
use async_trait::async_trait;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncRead;

pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;

/// Unified interface for object stores.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use tarship_storage::{ObjectLocation, backend::ObjectStore, error::Result};
///
/// async fn publish(store: &dyn ObjectStore, contents: &'static [u8]) -> Result<String> {
///     let location: ObjectLocation = "s3://bucket/release.tar.gz".parse()?;
///     store.upload(&location, "application/gzip", Box::pin(contents)).await?;
///     store.presign(&location, Duration::from_secs(300)).await
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the store (used for logging only).
    fn name(&self) -> &str;

    /// Stream `body` into the object at `location`, returning the number of
    /// bytes stored.
    ///
    /// The body is consumed until end-of-stream in a single logical call; a
    /// read error from the body fails the upload with
    /// [`UploadFailed`](crate::error::ErrorKind::UploadFailed) and leaves no
    /// object behind. The body is dropped before this method returns, whether
    /// or not it succeeded.
    async fn upload(&self, location: &ObjectLocation, content_type: &str, body: BoxAsyncRead) -> Result<u64>;

    /// Generate a link that retrieves the object without credentials until it
    /// expires.
    async fn presign(&self, location: &ObjectLocation, expires_in: Duration) -> Result<String>;
}
