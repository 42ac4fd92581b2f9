use aws_sdk_s3::operation::put_object::builders::PutObjectFluentBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{ObjectCannedAcl, StorageClass};
use aws_sdk_s3::Client;
use serde_json::Value;
use tracing::debug;

use super::{ObjectStore, WriteOptions};
use crate::error::StoreError;
use crate::location::S3Location;
use crate::s3::{self, ClientOptions};

/// [`ObjectStore`] backed by the AWS S3 API.
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn connect(options: &ClientOptions) -> Self {
        Self::new(s3::client(options).await)
    }
}

impl ObjectStore for S3Store {
    async fn exists(&self, location: &S3Location) -> Result<bool, StoreError> {
        let result = self
            .client
            .head_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => Err(StoreError::request(location, err)),
        }
    }

    async fn read_json(&self, location: &S3Location) -> Result<Value, StoreError> {
        let object = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    StoreError::NotFound(location.to_string())
                } else {
                    StoreError::request(location, err)
                }
            })?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|err| StoreError::request(location, err))?
            .into_bytes();

        serde_json::from_slice(&data).map_err(|source| StoreError::Decode {
            location: location.to_string(),
            source,
        })
    }

    async fn write_json(
        &self,
        body: &Value,
        location: &S3Location,
        options: &WriteOptions,
    ) -> Result<(), StoreError> {
        let data = serde_json::to_vec(body).map_err(|source| StoreError::Encode {
            location: location.to_string(),
            source,
        })?;

        let mut request = self
            .client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .body(ByteStream::from(data));
        if options.public {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }
        for (name, value) in &options.headers {
            request = apply_header(request, name, value);
        }

        debug!(%location, public = options.public, "put_object");
        request
            .send()
            .await
            .map_err(|err| StoreError::request(location, err))?;
        Ok(())
    }
}

/// Sets a normalized header on the request; unknown names become user metadata.
fn apply_header(request: PutObjectFluentBuilder, name: &str, value: &str) -> PutObjectFluentBuilder {
    match name {
        "ContentType" => request.content_type(value),
        "CacheControl" => request.cache_control(value),
        "ContentEncoding" => request.content_encoding(value),
        "ContentDisposition" => request.content_disposition(value),
        "ContentLanguage" => request.content_language(value),
        "StorageClass" => request.storage_class(StorageClass::from(value)),
        "ACL" => request.acl(ObjectCannedAcl::from(value)),
        _ => request.metadata(name, value),
    }
}
