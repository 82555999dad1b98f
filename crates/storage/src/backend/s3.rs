//! S3 object store.
//!
//! # Credentials
//!
//! Credentials and region come from the ambient AWS configuration (environment
//! variables, shared config files, SSO, container and instance metadata) via
//! `aws-config`'s default provider chains. When no region is configured
//! anywhere, `ap-southeast-2` is used.
//!
//! # Bucket region
//!
//! [`S3Backend::for_bucket`] without an explicit region asks S3 where the
//! bucket lives and targets that region, so buckets outside the ambient region
//! work without extra configuration.

use crate::backend::{BoxAsyncRead, ObjectStore};
use crate::error::{ErrorKind, Result};
use crate::ObjectLocation;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Region, retry::RetryConfig};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use exn::{OptionExt, ResultExt};
use std::error::Error as StdError;
use std::time::Duration;
use tokio::io::AsyncReadExt;

pub const DEFAULT_REGION: &str = "ap-southeast-2";

/// Size of each multipart chunk; S3 requires at least 5 MiB for every part
/// but the last.
const PART_SIZE: u64 = 8 * 1024 * 1024;

/// Error codes S3 returns when the caller is authenticated but not allowed.
const ACCESS_DENIED_CODES: &[&str] = &["AccessDenied", "AllAccessDisabled", "AccountProblem", "Forbidden"];
/// Set by S3 on bucket responses, redirects and refusals included.
const BUCKET_REGION_HEADER: &str = "x-amz-bucket-region";
/// Error codes S3 returns when the credentials themselves are unusable.
const CREDENTIAL_CODES: &[&str] = &["InvalidAccessKeyId", "ExpiredToken", "InvalidToken", "SignatureDoesNotMatch"];

/// S3 object store, streaming objects with multipart uploads so the archive
/// never has to be fully buffered.
///
/// SDK retries are disabled: each request is attempted exactly once.
///
/// # Examples
///
/// ```no_run
/// use tarship_storage::backend::S3Backend;
///
/// # async fn example() {
/// let backend = S3Backend::from_env(Some("eu-west-1".to_string()), None).await;
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
}

impl S3Backend {
    /// Build a client from the ambient AWS configuration.
    ///
    /// # Arguments
    /// * `region` - Explicit region, taking precedence over the environment
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    pub async fn from_env(region: Option<String>, endpoint: Option<String>) -> Self {
        let region = RegionProviderChain::first_try(region.map(Region::new))
            .or_default_provider()
            .or_else(Region::from_static(DEFAULT_REGION));
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .retry_config(RetryConfig::disabled())
            .load()
            .await;
        let mut config_builder = aws_sdk_s3::config::Builder::from(&shared);
        // Set custom endpoint for non-AWS services
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url).force_path_style(true);
        }
        Self::from_client(Client::from_conf(config_builder.build()))
    }

    /// Build a client for uploads into `bucket`.
    ///
    /// An explicit `region` is used as is. Otherwise the bucket's own region
    /// is looked up and the client retargeted at it.
    pub async fn for_bucket(bucket: &str, region: Option<String>, endpoint: Option<String>) -> Result<Self> {
        let explicit = region.is_some();
        let backend = Self::from_env(region, endpoint).await;
        if explicit {
            return Ok(backend);
        }
        backend.in_bucket_region(bucket).await
    }

    pub fn from_client(client: Client) -> Self {
        Self { name: "s3".to_string(), client }
    }

    /// Region requests are currently signed for and sent to.
    pub fn region(&self) -> Option<&str> {
        self.client.config().region().map(|region| region.as_ref())
    }

    /// Retarget the client at the region `bucket` lives in.
    pub async fn in_bucket_region(self, bucket: &str) -> Result<Self> {
        let region = self.bucket_region(bucket).await?;
        if self.region() == Some(region.as_str()) {
            return Ok(self);
        }
        tracing::debug!(bucket, %region, "Using bucket region");
        let config = self.client.config().to_builder().region(Region::new(region)).build();
        Ok(Self { client: Client::from_conf(config), ..self })
    }

    async fn bucket_region(&self, bucket: &str) -> Result<String> {
        let err = match self.client.head_bucket().bucket(bucket).send().await {
            Ok(output) => {
                return output
                    .bucket_region()
                    .map(str::to_string)
                    .ok_or_raise(|| ErrorKind::UploadFailed(format!("no region reported for bucket {bucket}")));
            },
            Err(err) => err,
        };
        // A request sent to the wrong region is redirected, and a caller
        // without list permission is refused; both still name the region.
        let header = err.raw_response().and_then(|raw| raw.headers().get(BUCKET_REGION_HEADER));
        if let Some(region) = header {
            return Ok(region.to_string());
        }
        let not_found = err.as_service_error().is_some_and(HeadBucketError::is_not_found) || err.code() == Some("NotFound");
        if not_found {
            let kind = ErrorKind::UploadFailed(format!("unable to find the region of bucket {bucket}"));
            return Err(exn::Exn::from(err).raise(kind));
        }
        Err(classify(err, &ObjectLocation::new(bucket, "")))
    }

    /// Upload every part of `body`, returning the completed parts and the
    /// total number of bytes sent.
    async fn upload_parts(
        &self,
        location: &ObjectLocation,
        upload_id: &str,
        body: &mut BoxAsyncRead,
    ) -> Result<(Vec<CompletedPart>, u64)> {
        let mut parts = Vec::new();
        let mut total = 0;
        loop {
            let mut chunk = Vec::with_capacity(PART_SIZE as usize);
            (&mut *body)
                .take(PART_SIZE)
                .read_to_end(&mut chunk)
                .await
                .or_raise(|| ErrorKind::UploadFailed(format!("reading archive for {location}")))?;
            // An empty object still needs one (empty) part.
            if chunk.is_empty() && !parts.is_empty() {
                break;
            }
            let last = (chunk.len() as u64) < PART_SIZE;
            let part_number = i32::try_from(parts.len() + 1)
                .or_raise(|| ErrorKind::UploadFailed(format!("too many parts for {location}")))?;
            let size = chunk.len() as u64;
            let uploaded = self
                .client
                .upload_part()
                .bucket(&location.bucket)
                .key(&location.key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|err| classify(err, location))?;
            tracing::trace!(part_number, size, "Uploaded part");
            total += size;
            let e_tag = uploaded.e_tag().map(str::to_string);
            parts.push(CompletedPart::builder().set_e_tag(e_tag).part_number(part_number).build());
            if last {
                break;
            }
        }
        Ok((parts, total))
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, location: &ObjectLocation, content_type: &str, mut body: BoxAsyncRead) -> Result<u64> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&location.bucket)
            .key(&location.key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| classify(err, location))?;
        let upload_id = created
            .upload_id()
            .ok_or_raise(|| ErrorKind::UploadFailed(format!("no upload id returned for {location}")))?
            .to_string();

        let (parts, total) = match self.upload_parts(location, &upload_id, &mut body).await {
            Ok(uploaded) => uploaded,
            Err(err) => {
                drop(body);
                self.abort(location, &upload_id).await;
                return Err(err);
            },
        };
        drop(body);

        let completed = CompletedMultipartUpload::builder().set_parts(Some(parts)).build();
        if let Err(err) = self
            .client
            .complete_multipart_upload()
            .bucket(&location.bucket)
            .key(&location.key)
            .upload_id(&upload_id)
            .multipart_upload(completed)
            .send()
            .await
        {
            self.abort(location, &upload_id).await;
            return Err(classify(err, location));
        }
        Ok(total)
    }

    async fn presign(&self, location: &ObjectLocation, expires_in: Duration) -> Result<String> {
        let config =
            PresigningConfig::expires_in(expires_in).or_raise(|| ErrorKind::Presign(format!("invalid expiry {expires_in:?}")))?;
        let request = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .presigned(config)
            .await
            .map_err(|err| {
                let message = DisplayErrorContext(&err).to_string();
                exn::Exn::from(err).raise(ErrorKind::Presign(message))
            })?;
        Ok(request.uri().to_string())
    }
}

impl S3Backend {
    /// Discard the parts of a failed upload. Failures are logged, never returned.
    async fn abort(&self, location: &ObjectLocation, upload_id: &str) {
        let aborted = self
            .client
            .abort_multipart_upload()
            .bucket(&location.bucket)
            .key(&location.key)
            .upload_id(upload_id)
            .send()
            .await;
        if let Err(err) = aborted {
            tracing::warn!(%location, error = %DisplayErrorContext(&err), "Unable to abort multipart upload");
        }
    }
}

/// Map an SDK failure onto the crate's error kinds. This is the only place
/// SDK error types are inspected.
fn classify<E, R>(err: SdkError<E, R>, location: &ObjectLocation) -> crate::error::Error
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    let kind = match err.code() {
        Some(code) if ACCESS_DENIED_CODES.contains(&code) => ErrorKind::AccessDenied(location.to_string()),
        Some(code) if CREDENTIAL_CODES.contains(&code) => ErrorKind::CredentialsMissing,
        // Identity resolution happens before the request is sent, so there is
        // no service error code to go on.
        None if matches!(err, SdkError::ConstructionFailure(_) | SdkError::DispatchFailure(_))
            && message.to_ascii_lowercase().contains("credentials") =>
        {
            ErrorKind::CredentialsMissing
        },
        _ => ErrorKind::UploadFailed(message),
    };
    exn::Exn::from(err).raise(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::create_multipart_upload::CreateMultipartUploadError;
    use aws_sdk_s3::operation::head_bucket::HeadBucketOutput;
    use aws_smithy_mocks::{mock, mock_client};
    use rstest::rstest;

    fn location() -> ObjectLocation {
        ObjectLocation::new("bucket", "site.tar.gz")
    }

    fn failing_backend(code: &'static str) -> S3Backend {
        let rule = mock!(Client::create_multipart_upload).then_error(move || {
            CreateMultipartUploadError::generic(ErrorMetadata::builder().code(code).message("nope").build())
        });
        S3Backend::from_client(mock_client!(aws_sdk_s3, [&rule]))
    }

    #[tokio::test]
    async fn test_access_denied() {
        let backend = failing_backend("AccessDenied");
        let err = backend.upload(&location(), "application/gzip", Box::pin(&b"data"[..])).await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::AccessDenied("s3://bucket/site.tar.gz".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_credentials() {
        let backend = failing_backend("InvalidAccessKeyId");
        let err = backend.upload(&location(), "application/gzip", Box::pin(&b"data"[..])).await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::CredentialsMissing);
    }

    #[tokio::test]
    async fn test_other_errors_are_upload_failures() {
        let backend = failing_backend("InternalError");
        let err = backend.upload(&location(), "application/gzip", Box::pin(&b"data"[..])).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::UploadFailed(message) if message.contains("InternalError")));
    }

    #[tokio::test]
    async fn test_bucket_region_lookup() {
        let rule = mock!(Client::head_bucket)
            .match_requests(|request| request.bucket() == Some("bucket"))
            .then_output(|| HeadBucketOutput::builder().bucket_region("eu-west-1").build());
        let backend = S3Backend::from_client(mock_client!(aws_sdk_s3, [&rule]));
        let backend = backend.in_bucket_region("bucket").await.unwrap();
        assert_eq!(backend.region(), Some("eu-west-1"));
        assert_eq!(rule.num_calls(), 1);
    }

    #[rstest]
    #[case("NotFound", "unable to find the region of bucket bucket")]
    #[case("InternalError", "InternalError")]
    #[tokio::test]
    async fn test_bucket_region_lookup_failure(#[case] code: &'static str, #[case] message: &str) {
        let rule = mock!(Client::head_bucket)
            .then_error(move || HeadBucketError::generic(ErrorMetadata::builder().code(code).build()));
        let backend = S3Backend::from_client(mock_client!(aws_sdk_s3, [&rule]));
        let err = backend.in_bucket_region("bucket").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::UploadFailed(m) if m.contains(message)));
    }

    #[tokio::test]
    async fn test_bucket_region_lookup_denied() {
        let rule = mock!(Client::head_bucket)
            .then_error(|| HeadBucketError::generic(ErrorMetadata::builder().code("Forbidden").build()));
        let backend = S3Backend::from_client(mock_client!(aws_sdk_s3, [&rule]));
        let err = backend.in_bucket_region("bucket").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AccessDenied(_)));
    }

    #[test]
    fn test_name() {
        assert_eq!(failing_backend("AccessDenied").name(), "s3");
    }
}
