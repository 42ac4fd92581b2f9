//! The per-batch publish transaction.
//!
//! Items go through path resolution, link rewriting, timestamp
//! reconciliation, validation and the store write one at a time. The first
//! failure aborts the batch; items written before it stay written.
use tracing::{debug, info, warn};

use crate::config::UploadOptions;
use crate::error::{Error, PublishError, Stage};
use crate::item::Item;
use crate::links;
use crate::location::{S3Location, DEFAULT_REGION};
use crate::path_template::PathTemplate;
use crate::store::{ObjectStore, WriteOptions};
use crate::timestamps;
use crate::validate::Validator;

pub struct PublishTransaction<'a, S, V> {
    store: &'a S,
    validator: &'a V,
    bucket: String,
    region: String,
    template: PathTemplate,
    options: UploadOptions,
}

impl<'a, S: ObjectStore, V: Validator> PublishTransaction<'a, S, V> {
    /// Fails with [`Error::InvalidTemplate`] before anything is written when
    /// the configured path template is malformed.
    pub fn new(
        store: &'a S,
        validator: &'a V,
        bucket: &str,
        options: UploadOptions,
    ) -> Result<Self, Error> {
        let template = PathTemplate::parse(options.path_template())?;
        Ok(Self {
            store,
            validator,
            bucket: bucket.to_string(),
            region: DEFAULT_REGION.to_string(),
            template,
            options,
        })
    }

    /// Region used when building public HTTPS hrefs.
    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    /// Resolves where `item` is stored and the href recorded in its links.
    /// In public mode only the href changes; the object itself is always
    /// addressed by bucket and key.
    pub fn locate(&self, item: &Item) -> Result<(S3Location, String), Error> {
        let path = self.template.resolve(item)?;
        let location = S3Location::from_path(&self.bucket, &path)?;
        let href = if self.options.public {
            location.to_https(&self.region)
        } else {
            location.to_string()
        };
        Ok((location, href))
    }

    pub async fn publish_item(&self, item: Item) -> Result<Item, PublishError> {
        let id = item.id.clone();
        let collection = item.collection.clone();
        let fail = |stage: Stage, source: Error| PublishError {
            id: id.clone(),
            collection: collection.clone(),
            stage,
            source,
        };

        let (location, href) = self
            .locate(&item)
            .map_err(|err| fail(Stage::ResolvePath, err))?;
        debug!(%id, %href, "resolved item location");

        let item = links::rewrite(item, &href);
        let item = timestamps::reconcile(item, &location, self.store)
            .await
            .map_err(|err| fail(Stage::ReconcileTimestamps, err.into()))?;

        if self.options.stac_validate {
            let validation = self.validator.validate(&item);
            if !validation.is_valid() {
                let message = validation
                    .first_message()
                    .unwrap_or("validator reported no diagnostics")
                    .to_string();
                warn!(%id, diagnostics = ?validation.diagnostics, "STAC validation failed");
                return Err(fail(Stage::Validate, Error::ValidationFailed(message)));
            }
        }

        let body = serde_json::to_value(&item).map_err(|err| fail(Stage::Write, err.into()))?;
        let write_options = WriteOptions::json(self.options.public, &self.options.headers);
        self.store
            .write_json(&body, &location, &write_options)
            .await
            .map_err(|err| fail(Stage::Write, err.into()))?;

        info!(%id, %href, "Published item");
        Ok(item)
    }

    /// Publishes `items` in order, stopping at the first failure.
    pub async fn publish(&self, items: Vec<Item>) -> Result<Vec<Item>, PublishError> {
        let mut published = Vec::with_capacity(items.len());
        for item in items {
            published.push(self.publish_item(item).await?);
        }
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::error::StoreError;
    use crate::item::{Link, JSON_MEDIA_TYPE};
    use crate::links::{CANONICAL_REL, SELF_REL};
    use crate::store::MemoryStore;
    use crate::validate::{ItemValidator, Validation};
    use serde_json::{json, Value};

    const BUCKET: &str = "data-bucket";

    fn mock_item(id: &str) -> Item {
        let mut item = Item::new(id);
        item.collection = Some("landsat".to_string());
        item.properties.datetime = Some("2021-03-05T00:00:00Z".to_string());
        item.links = vec![
            Link::new("collection", "s3://data-bucket/landsat/collection.json").json(),
            Link::new(SELF_REL, "file:///tmp/old.json"),
        ];
        item
    }

    fn location(id: &str) -> S3Location {
        S3Location::new(BUCKET, &format!("landsat/{id}/{id}.json"))
    }

    /// Rejects one item id, accepts everything else.
    struct RejectId(&'static str);

    impl Validator for RejectId {
        fn validate(&self, item: &Item) -> Validation {
            let mut validation = Validation::default();
            if item.id == self.0 {
                validation.diagnostics.push(format!("{} is not allowed", item.id));
                validation.diagnostics.push("second message".to_string());
            }
            validation
        }
    }

    /// Accepts reads but refuses every write.
    struct ReadOnlyStore(MemoryStore);

    impl ObjectStore for ReadOnlyStore {
        async fn exists(&self, location: &S3Location) -> Result<bool, StoreError> {
            self.0.exists(location).await
        }

        async fn read_json(&self, location: &S3Location) -> Result<Value, StoreError> {
            self.0.read_json(location).await
        }

        async fn write_json(
            &self,
            _body: &Value,
            location: &S3Location,
            _options: &WriteOptions,
        ) -> Result<(), StoreError> {
            Err(StoreError::request(location, "access denied"))
        }
    }

    /// Lists every object but cannot decode any of them. Writes succeed.
    struct CorruptStore(MemoryStore);

    impl ObjectStore for CorruptStore {
        async fn exists(&self, _location: &S3Location) -> Result<bool, StoreError> {
            Ok(true)
        }

        async fn read_json(&self, location: &S3Location) -> Result<Value, StoreError> {
            Err(StoreError::Decode {
                location: location.to_string(),
                source: serde_json::from_str::<Value>("<html>").unwrap_err(),
            })
        }

        async fn write_json(
            &self,
            body: &Value,
            location: &S3Location,
            options: &WriteOptions,
        ) -> Result<(), StoreError> {
            self.0.write_json(body, location, options).await
        }
    }

    #[tokio::test]
    async fn test_publish_single_item() {
        let store = MemoryStore::new();
        let tx = PublishTransaction::new(&store, &ItemValidator, BUCKET, UploadOptions::default())
            .unwrap();

        let published = tx.publish(vec![mock_item("scene001")]).await.unwrap();
        let item = &published[0];
        let href = "s3://data-bucket/landsat/scene001/scene001.json";

        assert_eq!(item.links[0], Link::new(SELF_REL, href).json());
        assert_eq!(item.links[1], Link::new(CANONICAL_REL, href).json());
        assert_eq!(item.links.len(), 3);
        assert_eq!(item.properties.created, item.properties.updated);

        let stored = store.get(&location("scene001")).unwrap();
        assert_eq!(stored.body, serde_json::to_value(item).unwrap());
        assert_eq!(stored.options.content_type(), Some(JSON_MEDIA_TYPE));
        assert!(!stored.options.public);
    }

    #[tokio::test]
    async fn test_republish_keeps_created() {
        let store = MemoryStore::new();
        let mut previous = serde_json::to_value(mock_item("scene001")).unwrap();
        previous["properties"]["created"] = json!("2020-01-01T00:00:00Z");
        previous["properties"]["updated"] = json!("2020-06-01T00:00:00Z");
        store.insert(location("scene001"), previous);

        let mut item = mock_item("scene001");
        item.properties
            .additional_fields
            .insert("eo:cloud_cover".to_string(), json!(3));
        let tx = PublishTransaction::new(&store, &ItemValidator, BUCKET, UploadOptions::default())
            .unwrap();
        let published = tx.publish(vec![item]).await.unwrap();

        let properties = &published[0].properties;
        assert_eq!(properties.created.as_deref(), Some("2020-01-01T00:00:00Z"));
        assert!(properties.updated.as_deref().unwrap() > "2020-06-01T00:00:00Z");

        let stored = store.get(&location("scene001")).unwrap();
        assert_eq!(stored.body["properties"]["created"], json!("2020-01-01T00:00:00Z"));
        assert_eq!(stored.body["properties"]["eo:cloud_cover"], json!(3));
    }

    #[tokio::test]
    async fn test_republish_is_idempotent() {
        let store = MemoryStore::new();
        let tx = PublishTransaction::new(&store, &ItemValidator, BUCKET, UploadOptions::default())
            .unwrap();

        let first = tx.publish(vec![mock_item("scene001")]).await.unwrap();
        let second = tx.publish(first.clone()).await.unwrap();

        assert_eq!(first[0].links, second[0].links);
        assert_eq!(first[0].properties.created, second[0].properties.created);
        assert_eq!(store.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_validation_failure_stops_batch() {
        let store = MemoryStore::new();
        let validator = RejectId("scene002");
        let tx = PublishTransaction::new(&store, &validator, BUCKET, UploadOptions::default())
            .unwrap();

        let batch = vec![mock_item("scene001"), mock_item("scene002"), mock_item("scene003")];
        let err = tx.publish(batch).await.unwrap_err();

        assert_eq!(err.id, "scene002");
        assert_eq!(err.collection.as_deref(), Some("landsat"));
        assert_eq!(err.stage, Stage::Validate);
        assert!(
            matches!(err.kind(), Error::ValidationFailed(msg) if msg == "scene002 is not allowed")
        );
        assert_eq!(store.writes(), vec![location("scene001")]);
    }

    #[tokio::test]
    async fn test_validation_can_be_disabled() {
        let store = MemoryStore::new();
        let validator = RejectId("scene001");
        let options = UploadOptions {
            stac_validate: false,
            ..Default::default()
        };
        let tx = PublishTransaction::new(&store, &validator, BUCKET, options).unwrap();

        tx.publish(vec![mock_item("scene001")]).await.unwrap();
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_field_writes_nothing() {
        let store = MemoryStore::new();
        let options = UploadOptions {
            path_template: Some("${collection}/${eo:cloud_cover}/${id}".to_string()),
            ..Default::default()
        };
        let tx = PublishTransaction::new(&store, &ItemValidator, BUCKET, options).unwrap();

        let err = tx.publish(vec![mock_item("scene001")]).await.unwrap_err();
        assert_eq!(err.stage, Stage::ResolvePath);
        assert!(matches!(err.kind(), Error::MissingField(f) if f == "eo:cloud_cover"));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_date_template() {
        let store = MemoryStore::new();
        let options = UploadOptions {
            path_template: Some("${collection}/${year}/${month}/${day}/${id}".to_string()),
            ..Default::default()
        };
        let tx = PublishTransaction::new(&store, &ItemValidator, BUCKET, options).unwrap();

        tx.publish(vec![mock_item("x")]).await.unwrap();
        assert_eq!(
            store.writes(),
            vec![S3Location::new(BUCKET, "landsat/2021/3/5/x/x.json")]
        );
    }

    #[tokio::test]
    async fn test_invalid_template_is_rejected_up_front() {
        let store = MemoryStore::new();
        let options = UploadOptions {
            path_template: Some("${collection".to_string()),
            ..Default::default()
        };
        let result = PublishTransaction::new(&store, &ItemValidator, BUCKET, options);
        assert!(matches!(result, Err(Error::InvalidTemplate { .. })));
    }

    #[tokio::test]
    async fn test_public_mode() {
        let store = MemoryStore::new();
        let options = UploadOptions {
            public: true,
            headers: BTreeMap::from([("CacheControl".to_string(), "max-age=60".to_string())]),
            ..Default::default()
        };
        let tx = PublishTransaction::new(&store, &ItemValidator, BUCKET, options)
            .unwrap()
            .with_region("us-west-2");

        let published = tx.publish(vec![mock_item("scene001")]).await.unwrap();
        let href = "https://data-bucket.s3.us-west-2.amazonaws.com/landsat/scene001/scene001.json";
        assert_eq!(published[0].links[0].href, href);
        assert_eq!(published[0].links[1].href, href);

        // The object itself is still addressed by bucket and key.
        let stored = store.get(&location("scene001")).unwrap();
        assert!(stored.options.public);
        assert_eq!(
            stored.options.headers.get("CacheControl").map(String::as_str),
            Some("max-age=60")
        );
        assert_eq!(stored.options.content_type(), Some(JSON_MEDIA_TYPE));
    }

    #[tokio::test]
    async fn test_template_with_own_bucket() {
        let store = MemoryStore::new();
        let options = UploadOptions {
            path_template: Some("s3://other-bucket/${collection}".to_string()),
            ..Default::default()
        };
        let tx = PublishTransaction::new(&store, &ItemValidator, BUCKET, options).unwrap();

        let published = tx.publish(vec![mock_item("scene001")]).await.unwrap();
        assert_eq!(
            published[0].links[0].href,
            "s3://other-bucket/landsat/scene001.json"
        );
        assert_eq!(
            store.writes(),
            vec![S3Location::new("other-bucket", "landsat/scene001.json")]
        );
    }

    #[tokio::test]
    async fn test_store_read_error_aborts() {
        let store = MemoryStore::unavailable();
        let tx = PublishTransaction::new(&store, &ItemValidator, BUCKET, UploadOptions::default())
            .unwrap();

        let err = tx.publish(vec![mock_item("scene001")]).await.unwrap_err();
        assert_eq!(err.stage, Stage::ReconcileTimestamps);
        assert!(matches!(err.kind(), Error::Store(e) if !e.is_not_found()));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_existing_object_aborts() {
        let store = CorruptStore(MemoryStore::new());
        let tx = PublishTransaction::new(&store, &ItemValidator, BUCKET, UploadOptions::default())
            .unwrap();

        let err = tx
            .publish(vec![mock_item("scene001"), mock_item("scene002")])
            .await
            .unwrap_err();
        assert_eq!(err.id, "scene001");
        assert_eq!(err.stage, Stage::ReconcileTimestamps);
        assert!(matches!(err.kind(), Error::Store(StoreError::Decode { .. })));
        assert!(store.0.writes().is_empty());
    }

    #[tokio::test]
    async fn test_store_write_error_aborts() {
        let store = ReadOnlyStore(MemoryStore::new());
        let tx = PublishTransaction::new(&store, &ItemValidator, BUCKET, UploadOptions::default())
            .unwrap();

        let err = tx
            .publish(vec![mock_item("scene001"), mock_item("scene002")])
            .await
            .unwrap_err();
        assert_eq!(err.id, "scene001");
        assert_eq!(err.stage, Stage::Write);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let store = MemoryStore::new();
        let tx = PublishTransaction::new(&store, &ItemValidator, BUCKET, UploadOptions::default())
            .unwrap();
        assert!(tx.publish(vec![]).await.unwrap().is_empty());
    }
}
