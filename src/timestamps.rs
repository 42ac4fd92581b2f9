use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::item::Item;
use crate::location::S3Location;
use crate::store::ObjectStore;

pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Sets `created`/`updated` on `item` as of the current instant.
pub async fn reconcile(
    item: Item,
    location: &S3Location,
    store: &impl ObjectStore,
) -> Result<Item, StoreError> {
    reconcile_at(item, location, store, Utc::now()).await
}

/// Sets `updated` to `now` and `created` to the value carried by the object
/// already stored at `location`, falling back to `now` when there is no prior
/// object or it has no `created`. Store failures other than not-found are
/// returned rather than read as "absent".
pub async fn reconcile_at(
    mut item: Item,
    location: &S3Location,
    store: &impl ObjectStore,
    now: DateTime<Utc>,
) -> Result<Item, StoreError> {
    let now = format_timestamp(now);
    let created = match previous_created(location, store).await? {
        Some(created) => {
            debug!(%location, %created, "keeping created timestamp of existing object");
            created
        }
        None => now.clone(),
    };
    item.properties.created = Some(created);
    item.properties.updated = Some(now);
    Ok(item)
}

async fn previous_created(
    location: &S3Location,
    store: &impl ObjectStore,
) -> Result<Option<String>, StoreError> {
    if !store.exists(location).await? {
        return Ok(None);
    }
    let previous = match store.read_json(location).await {
        Ok(previous) => previous,
        // Deleted between the existence check and the read.
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err),
    };
    let created = previous
        .get("properties")
        .and_then(|properties| properties.get("created"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(created)
}
