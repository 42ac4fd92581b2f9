use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::StoreError;

pub const S3_SCHEME: &str = "s3://";
pub const DEFAULT_REGION: &str = "us-east-1";

/// A bucket/key pair addressing one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

fn https_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^https://(?<bucket>[^./]+(?:\.[^./]+)*?)\.s3(?:[.-](?<region>[\w-]+))?\.amazonaws\.com/(?<key>.+)$",
        )
        .expect("Regex pattern should always compile")
    })
}

impl S3Location {
    pub fn new(bucket: &str, key: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.trim_start_matches('/').to_string(),
        }
    }

    /// Parses `s3://bucket/key` or a virtual-hosted HTTPS object URL.
    pub fn parse(url: &str) -> Result<Self, StoreError> {
        if let Some(rest) = url.strip_prefix(S3_SCHEME) {
            let (bucket, key) = rest
                .split_once('/')
                .ok_or_else(|| StoreError::InvalidLocation(url.to_string()))?;
            if bucket.is_empty() || key.is_empty() {
                return Err(StoreError::InvalidLocation(url.to_string()));
            }
            return Ok(Self::new(bucket, key));
        }

        let captures = https_regex()
            .captures(url)
            .ok_or_else(|| StoreError::InvalidLocation(url.to_string()))?;
        Ok(Self::new(&captures["bucket"], &captures["key"]))
    }

    /// Places a resolved path in `bucket` unless it already names its own
    /// `s3://` location.
    pub fn from_path(bucket: &str, path: &str) -> Result<Self, StoreError> {
        if path.starts_with(S3_SCHEME) {
            return Self::parse(path);
        }
        if bucket.is_empty() {
            return Err(StoreError::InvalidLocation(path.to_string()));
        }
        Ok(Self::new(bucket, path))
    }

    pub fn to_https(&self, region: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, region, self.key
        )
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", S3_SCHEME, self.bucket, self.key)
    }
}
