use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use std::str::FromStr;
use url::Url;

const SEGMENTS: usize = 5;
const STACK_SEGMENT: usize = 2;
const ENVIRONMENT_SEGMENT: usize = 4;

/// The dashboard environment page a deployment targets, e.g.
/// `https://dashboard.example.com/naut/project/mystack/environment/prod`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardTarget {
    /// The URL as given; quoted back in failure messages.
    pub url: Url,
    /// Scheme, host and port of the dashboard API.
    pub base_url: Url,
    pub stack_id: String,
    pub environment_id: String,
}

impl FromStr for DashboardTarget {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || ErrorKind::InvalidDashboardUrl(input.to_string());
        let url = Url::parse(input).or_raise(invalid)?;
        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            exn::bail!(invalid());
        }
        let segments: Vec<&str> = url.path().trim_matches('/').split('/').collect();
        if segments.len() != SEGMENTS || segments.iter().any(|segment| segment.is_empty()) {
            exn::bail!(invalid());
        }
        let (stack_id, environment_id) = (segments[STACK_SEGMENT].to_string(), segments[ENVIRONMENT_SEGMENT].to_string());
        let base_url = Url::parse(&url.origin().ascii_serialization()).or_raise(invalid)?;
        Ok(Self { url, base_url, stack_id, environment_id })
    }
}
