//! STAC Item validation.
//!
//! The publish transaction only depends on the [`Validator`] trait. The
//! bundled [`ItemValidator`] checks the structural rules of the STAC Item
//! specification that can be decided without fetching extension schemas.
use chrono::DateTime;
use serde_json::Value;

use crate::item::Item;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub diagnostics: Vec<String>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn first_message(&self) -> Option<&str> {
        self.diagnostics.first().map(String::as_str)
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.diagnostics.push(message.into());
    }
}

pub trait Validator {
    fn validate(&self, item: &Item) -> Validation;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ItemValidator;

impl Validator for ItemValidator {
    fn validate(&self, item: &Item) -> Validation {
        let mut validation = Validation::default();

        if item.type_ != "Feature" {
            validation.fail(format!("type must be \"Feature\", found {:?}", item.type_));
        }
        if item.stac_version.is_empty() {
            validation.fail("stac_version is required");
        }
        if item.id.is_empty() {
            validation.fail("id is required");
        }

        check_geometry(item, &mut validation);
        check_datetimes(item, &mut validation);
        check_links(item, &mut validation);

        for (key, asset) in &item.assets {
            let has_href = asset
                .get("href")
                .and_then(Value::as_str)
                .is_some_and(|href| !href.is_empty());
            if !has_href {
                validation.fail(format!("asset {key:?} is missing an href"));
            }
        }

        validation
    }
}

fn check_geometry(item: &Item, validation: &mut Validation) {
    let Some(geometry) = item.geometry.as_ref().filter(|g| !g.is_null()) else {
        return;
    };
    if geometry.get("type").and_then(Value::as_str).is_none() {
        validation.fail("geometry must be a GeoJSON object with a type");
    }
    match &item.bbox {
        None => validation.fail("bbox is required when geometry is not null"),
        Some(bbox) if bbox.len() != 4 && bbox.len() != 6 => {
            validation.fail(format!("bbox must have 4 or 6 values, found {}", bbox.len()))
        }
        Some(_) => {}
    }
}

fn check_datetimes(item: &Item, validation: &mut Validation) {
    let p = &item.properties;
    if p.datetime.is_none() && (p.start_datetime.is_none() || p.end_datetime.is_none()) {
        validation.fail("datetime is null, so start_datetime and end_datetime are required");
    }
    let fields = [
        ("datetime", &p.datetime),
        ("start_datetime", &p.start_datetime),
        ("end_datetime", &p.end_datetime),
        ("created", &p.created),
        ("updated", &p.updated),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            if DateTime::parse_from_rfc3339(value).is_err() {
                validation.fail(format!("{name} {value:?} is not an RFC 3339 timestamp"));
            }
        }
    }
}

fn check_links(item: &Item, validation: &mut Validation) {
    for (index, link) in item.links.iter().enumerate() {
        if link.rel.is_empty() {
            validation.fail(format!("link {index} is missing rel"));
        }
        if link.href.is_empty() {
            validation.fail(format!("link {index} is missing href"));
        }
    }
    if item.collection.is_some() && item.links_with_rel("collection").next().is_none() {
        validation.fail("collection is set, so a link with rel \"collection\" is required");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Link;
    use serde_json::json;

    fn mock_item() -> Item {
        let mut item = Item::new("scene001");
        item.collection = Some("landsat".to_string());
        item.geometry = Some(json!({"type": "Point", "coordinates": [0.0, 0.0]}));
        item.bbox = Some(vec![0u8.into(), 0u8.into(), 1u8.into(), 1u8.into()]);
        item.properties.datetime = Some("2021-03-05T00:00:00Z".to_string());
        item.links = vec![Link::new("collection", "s3://data-bucket/landsat/collection.json")];
        item.assets
            .insert("B1".to_string(), json!({"href": "s3://data-bucket/B1.tif"}));
        item
    }

    #[test]
    fn test_valid_item() {
        let validation = ItemValidator.validate(&mock_item());
        assert!(validation.is_valid(), "{:?}", validation.diagnostics);
    }

    #[test]
    fn test_null_geometry_without_bbox() {
        let mut item = mock_item();
        item.geometry = None;
        item.bbox = None;
        assert!(ItemValidator.validate(&item).is_valid());
    }

    #[test]
    fn test_missing_bbox() {
        let mut item = mock_item();
        item.bbox = None;
        let validation = ItemValidator.validate(&item);
        assert_eq!(
            validation.first_message(),
            Some("bbox is required when geometry is not null")
        );
    }

    #[test]
    fn test_datetime_range() {
        let mut item = mock_item();
        item.properties.datetime = None;
        assert!(!ItemValidator.validate(&item).is_valid());

        item.properties.start_datetime = Some("2021-03-05T00:00:00Z".to_string());
        item.properties.end_datetime = Some("2021-03-06T00:00:00Z".to_string());
        assert!(ItemValidator.validate(&item).is_valid());
    }

    #[test]
    fn test_bad_timestamp() {
        let mut item = mock_item();
        item.properties.created = Some("last tuesday".to_string());
        let validation = ItemValidator.validate(&item);
        assert_eq!(validation.diagnostics.len(), 1);
        assert!(validation.diagnostics[0].starts_with("created"));
    }

    #[test]
    fn test_collection_link_required() {
        let mut item = mock_item();
        item.links.clear();
        assert!(!ItemValidator.validate(&item).is_valid());
    }

    #[test]
    fn test_diagnostics_accumulate() {
        let mut item = mock_item();
        item.type_ = "FeatureCollection".to_string();
        item.stac_version.clear();
        item.assets.insert("thumb".to_string(), json!({}));
        let validation = ItemValidator.validate(&item);
        assert_eq!(validation.diagnostics.len(), 3);
        assert!(validation.first_message().unwrap().starts_with("type"));
    }
}
