//! In-memory object store for testing.

use crate::ObjectLocation;
use crate::backend::{BoxAsyncRead, ObjectStore};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;

/// In-memory object store for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation.
///
/// # Examples
///
/// ```
/// use tarship_storage::{ObjectLocation, backend::{MockBackend, ObjectStore}};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::default();
/// let location = ObjectLocation::new("bucket", "site.tar.gz");
/// backend.upload(&location, "application/gzip", Box::pin(&b"archive"[..])).await?;
/// assert_eq!(backend.object(&location).await.as_deref(), Some(&b"archive"[..]));
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    objects: RwLock<HashMap<ObjectLocation, (String, Vec<u8>)>>,
    fail_upload: Option<ErrorKind>,
}

impl MockBackend {
    /// A store that rejects every upload with `kind` without reading a single
    /// byte of the body, the way a store denying access would.
    pub fn failing(kind: ErrorKind) -> Self {
        Self { fail_upload: Some(kind), ..Self::default() }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Contents of a stored object.
    pub async fn object(&self, location: &ObjectLocation) -> Option<Vec<u8>> {
        self.objects.read().await.get(location).map(|(_, data)| data.clone())
    }

    /// Content type an object was stored with.
    pub async fn content_type(&self, location: &ObjectLocation) -> Option<String> {
        self.objects.read().await.get(location).map(|(content_type, _)| content_type.clone())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            objects: RwLock::new(HashMap::new()),
            fail_upload: None,
        }
    }
}

#[async_trait]
impl ObjectStore for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, location: &ObjectLocation, content_type: &str, mut body: BoxAsyncRead) -> Result<u64> {
        if let Some(kind) = &self.fail_upload {
            exn::bail!(kind.clone());
        }
        let mut data = Vec::new();
        body.read_to_end(&mut data)
            .await
            .or_raise(|| ErrorKind::UploadFailed(format!("reading archive for {location}")))?;
        drop(body);
        let size = data.len() as u64;
        self.objects.write().await.insert(location.clone(), (content_type.to_string(), data));
        Ok(size)
    }

    async fn presign(&self, location: &ObjectLocation, expires_in: Duration) -> Result<String> {
        if !self.objects.read().await.contains_key(location) {
            exn::bail!(ErrorKind::Presign(format!("no such object {location}")));
        }
        Ok(format!(
            "https://{}.s3.mock/{}?X-Amz-Expires={}",
            location.bucket,
            location.key,
            expires_in.as_secs()
        ))
    }
}
