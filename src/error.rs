use std::fmt;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures raised by an [`ObjectStore`](crate::store::ObjectStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No object found at {0}")]
    NotFound(String),
    #[error("Unable to parse object location: {0}")]
    InvalidLocation(String),
    #[error("Request against {location} failed")]
    Request {
        location: String,
        #[source]
        source: BoxError,
    },
    #[error("Unable to encode object for {location}")]
    Encode {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Object at {location} is not valid JSON")]
    Decode {
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn request(location: impl fmt::Display, source: impl Into<BoxError>) -> Self {
        Self::Request {
            location: location.to_string(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Path template references `{0}`, which is absent from the item")]
    MissingField(String),
    #[error("Item datetime {0:?} is absent or not an ISO-8601 timestamp")]
    InvalidDate(Option<String>),
    #[error("Invalid path template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error("Property `{0}` is not a scalar and cannot be used in a path")]
    UnsupportedValue(String),
    #[error("STAC validation failed: {0}")]
    ValidationFailed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Unable to serialize item")]
    Serialize(#[from] serde_json::Error),
}

/// The step of the publish transaction an item failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvePath,
    ReconcileTimestamps,
    Validate,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResolvePath => "path resolution",
            Self::ReconcileTimestamps => "timestamp reconciliation",
            Self::Validate => "validation",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// An [`Error`] tagged with the item that caused the batch to abort.
#[derive(Error, Debug)]
#[error("Publishing item `{id}` (collection {}) failed during {stage}", display_collection(.collection))]
pub struct PublishError {
    pub id: String,
    pub collection: Option<String>,
    pub stage: Stage,
    #[source]
    pub source: Error,
}

fn display_collection(collection: &Option<String>) -> &str {
    collection.as_deref().unwrap_or("<none>")
}

impl PublishError {
    pub fn kind(&self) -> &Error {
        &self.source
    }
}
