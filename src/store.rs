//! Object store capability used by the publish transaction.
use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::StoreError;
use crate::item::JSON_MEDIA_TYPE;
use crate::location::S3Location;

mod memory;
mod s3;

pub use memory::{MemoryStore, StoredObject};
pub use s3::S3Store;

pub const CONTENT_TYPE: &str = "ContentType";

/// Options applied to a single object write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Grant public read access to the written object.
    pub public: bool,
    /// Put-object headers keyed by their normalized name (see [`normalize_header`]).
    pub headers: BTreeMap<String, String>,
}

impl WriteOptions {
    /// Builds the options for a JSON write, merging `extra` over the
    /// `ContentType: application/json` default. Later entries win.
    pub fn json<'a>(public: bool, extra: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let mut headers = BTreeMap::from([(CONTENT_TYPE.to_string(), JSON_MEDIA_TYPE.to_string())]);
        for (name, value) in extra {
            headers.insert(normalize_header(name), value.clone());
        }
        Self { public, headers }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).map(String::as_str)
    }
}

/// Maps the spellings of put-object fields (`Content-Type`, `content_type`,
/// `ContentType`) onto one canonical name. Unknown names are kept verbatim
/// and end up as user metadata.
pub fn normalize_header(name: &str) -> String {
    let folded: String = name
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    let canonical = match folded.as_str() {
        "contenttype" => "ContentType",
        "cachecontrol" => "CacheControl",
        "contentencoding" => "ContentEncoding",
        "contentdisposition" => "ContentDisposition",
        "contentlanguage" => "ContentLanguage",
        "storageclass" => "StorageClass",
        "acl" => "ACL",
        _ => return name.to_string(),
    };
    canonical.to_string()
}

pub trait ObjectStore {
    async fn exists(&self, location: &S3Location) -> Result<bool, StoreError>;

    /// Reads and decodes a JSON object, failing with [`StoreError::NotFound`]
    /// when nothing is stored at `location`.
    async fn read_json(&self, location: &S3Location) -> Result<Value, StoreError>;

    async fn write_json(
        &self,
        body: &Value,
        location: &S3Location,
        options: &WriteOptions,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Content-Type"), CONTENT_TYPE);
        assert_eq!(normalize_header("content_type"), CONTENT_TYPE);
        assert_eq!(normalize_header("CacheControl"), "CacheControl");
        assert_eq!(normalize_header("x-amz-meta-owner"), "x-amz-meta-owner");
    }

    #[test]
    fn test_json_defaults() {
        let options = WriteOptions::json(false, &BTreeMap::<String, String>::new());
        assert_eq!(options.content_type(), Some(JSON_MEDIA_TYPE));
        assert_eq!(options.headers.len(), 1);
        assert!(!options.public);
    }

    #[test]
    fn test_extra_headers_override_content_type() {
        let extra = BTreeMap::from([
            ("Content-Type".to_string(), "application/geo+json".to_string()),
            ("CacheControl".to_string(), "max-age=60".to_string()),
        ]);
        let options = WriteOptions::json(true, &extra);
        assert_eq!(options.content_type(), Some("application/geo+json"));
        assert_eq!(options.headers.get("CacheControl").map(String::as_str), Some("max-age=60"));
        assert!(options.public);
    }
}
