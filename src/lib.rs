#![allow(async_fn_in_trait)]
pub mod config;
pub mod error;
pub mod item;
pub mod links;
pub mod location;
pub mod path_template;
pub mod payload;
pub mod publish;
pub mod s3;
pub mod store;
pub mod timestamps;
pub mod validate;

pub use config::{Settings, UploadOptions};
pub use error::{Error, PublishError, Stage, StoreError};
pub use item::{Item, Link, Properties};
pub use location::S3Location;
pub use path_template::PathTemplate;
pub use payload::Payload;
pub use publish::PublishTransaction;
pub use store::{MemoryStore, ObjectStore, S3Store, WriteOptions};
pub use validate::{ItemValidator, Validation, Validator};
