use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::{ObjectStore, WriteOptions};
use crate::error::StoreError;
use crate::location::S3Location;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Value,
    pub options: WriteOptions,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<S3Location, StoredObject>,
    writes: Vec<S3Location>,
}

/// In-process [`ObjectStore`], used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose reads and existence checks always fail, as an
    /// unreachable bucket would.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, location: S3Location, body: Value) {
        let options = WriteOptions::json(false, &BTreeMap::<String, String>::new());
        self.lock().objects.insert(location, StoredObject { body, options });
    }

    pub fn get(&self, location: &S3Location) -> Option<StoredObject> {
        self.lock().objects.get(location).cloned()
    }

    /// Locations written through [`ObjectStore::write_json`], in order.
    pub fn writes(&self) -> Vec<S3Location> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self, location: &S3Location) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::request(location, "store unavailable"));
        }
        Ok(())
    }
}

impl ObjectStore for MemoryStore {
    async fn exists(&self, location: &S3Location) -> Result<bool, StoreError> {
        self.check_available(location)?;
        Ok(self.lock().objects.contains_key(location))
    }

    async fn read_json(&self, location: &S3Location) -> Result<Value, StoreError> {
        self.check_available(location)?;
        self.lock()
            .objects
            .get(location)
            .map(|object| object.body.clone())
            .ok_or_else(|| StoreError::NotFound(location.to_string()))
    }

    async fn write_json(
        &self,
        body: &Value,
        location: &S3Location,
        options: &WriteOptions,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.objects.insert(
            location.clone(),
            StoredObject {
                body: body.clone(),
                options: options.clone(),
            },
        );
        state.writes.push(location.clone());
        Ok(())
    }
}
