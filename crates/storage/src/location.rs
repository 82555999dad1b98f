use crate::error::{Error, ErrorKind};
use std::fmt;
use std::str::FromStr;

const SCHEME: &str = "s3://";

/// Bucket and key of a single object, parsed from an `s3://bucket/key` URI.
///
/// Parsing happens up front so that a malformed destination is rejected
/// before any packaging or network activity.
///
/// ```
/// use tarship_storage::ObjectLocation;
///
/// let location: ObjectLocation = "s3://deploys/site/release.tar.gz".parse().unwrap();
/// assert_eq!(location.bucket, "deploys");
/// assert_eq!(location.key, "site/release.tar.gz");
/// assert!("https://deploys/site.tar.gz".parse::<ObjectLocation>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), key: key.into() }
    }
}

impl FromStr for ObjectLocation {
    type Err = Error;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| exn::Exn::from(ErrorKind::InvalidUri(uri.to_string(), reason));
        let rest = match uri.get(..SCHEME.len()) {
            Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME) => &uri[SCHEME.len()..],
            _ => return Err(invalid("scheme should be 's3'")),
        };
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(invalid("missing bucket name"));
        }
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(invalid("missing object key"));
        }
        Ok(Self::new(bucket, key))
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("s3://bucket/file.tar.gz", "bucket", "file.tar.gz")]
    #[case("s3://bucket/deep/nested/file.tar.gz", "bucket", "deep/nested/file.tar.gz")]
    #[case("S3://bucket/file.tar.gz", "bucket", "file.tar.gz")]
    #[case("s3://bucket//leading-slashes", "bucket", "leading-slashes")]
    fn test_parse(#[case] uri: &str, #[case] bucket: &str, #[case] key: &str) {
        let location: ObjectLocation = uri.parse().unwrap();
        assert_eq!(location, ObjectLocation::new(bucket, key));
    }

    #[rstest]
    #[case("https://bucket/file.tar.gz", "scheme should be 's3'")]
    #[case("bucket/file.tar.gz", "scheme should be 's3'")]
    #[case("s3:/", "scheme should be 's3'")]
    #[case("s3:///file.tar.gz", "missing bucket name")]
    #[case("s3://", "missing bucket name")]
    #[case("s3://bucket", "missing object key")]
    #[case("s3://bucket/", "missing object key")]
    fn test_parse_invalid(#[case] uri: &str, #[case] expected: &str) {
        let err = uri.parse::<ObjectLocation>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidUri(input, reason) if input == uri && *reason == expected));
    }

    #[test]
    fn test_display() {
        assert_eq!(ObjectLocation::new("bucket", "a/b.tar.gz").to_string(), "s3://bucket/a/b.tar.gz");
    }
}
