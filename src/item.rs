//! Typed STAC Item records.
//!
//! Only the fields the publish engine reads or rewrites are typed; everything
//! else is kept in `additional_fields` so an item round-trips untouched.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

pub const JSON_MEDIA_TYPE: &str = "application/json";

fn feature_type() -> String {
    "Feature".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Item {
    #[serde(rename = "type", default = "feature_type")]
    pub type_: String,

    #[serde(default)]
    pub stac_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stac_extensions: Option<Vec<String>>,

    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub geometry: Option<Value>,

    /// Numbers are kept as written, so `0` is not re-emitted as `0.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<Number>>,

    #[serde(default)]
    pub properties: Properties,

    #[serde(default)]
    pub links: Vec<Link>,

    #[serde(default)]
    pub assets: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Properties {
    /// Nominal acquisition time. `null` is allowed when a start/end range is given.
    #[serde(default)]
    pub datetime: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,

    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Link {
    #[serde(default)]
    pub rel: String,

    #[serde(default)]
    pub href: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

impl Link {
    pub fn new(rel: &str, href: &str) -> Self {
        Self {
            rel: rel.to_string(),
            href: href.to_string(),
            type_: None,
            title: None,
            additional_fields: Map::new(),
        }
    }

    pub fn json(self) -> Self {
        Self {
            type_: Some(JSON_MEDIA_TYPE.to_string()),
            ..self
        }
    }
}

impl Item {
    pub fn new(id: &str) -> Self {
        Self {
            type_: feature_type(),
            stac_version: "1.0.0".to_string(),
            stac_extensions: Some(vec![]),
            id: id.to_string(),
            geometry: None,
            bbox: None,
            properties: Properties::default(),
            links: vec![],
            assets: Map::new(),
            collection: None,
            additional_fields: Map::new(),
        }
    }

    /// Looks up a property by name, checking the typed fields first.
    pub fn property(&self, key: &str) -> Option<Value> {
        let p = &self.properties;
        let typed = match key {
            "datetime" => p.datetime.as_ref(),
            "start_datetime" => p.start_datetime.as_ref(),
            "end_datetime" => p.end_datetime.as_ref(),
            "created" => p.created.as_ref(),
            "updated" => p.updated.as_ref(),
            _ => {
                return p
                    .additional_fields
                    .get(key)
                    .filter(|v| !v.is_null())
                    .cloned()
            }
        };
        typed.map(|s| Value::String(s.clone()))
    }

    pub fn links_with_rel<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |link| link.rel == rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn landsat_json() -> Value {
        json!({
            "type": "Feature",
            "stac_version": "1.0.0",
            "id": "scene001",
            "collection": "landsat",
            "geometry": null,
            "properties": {
                "datetime": "2021-03-05T00:00:00Z",
                "eo:cloud_cover": 12.5,
                "platform": "landsat-8"
            },
            "links": [
                {"rel": "collection", "href": "s3://bucket/landsat/collection.json", "type": "application/json"},
                {"rel": "via", "href": "https://example.com/source", "title": "Source"}
            ],
            "assets": {"B1": {"href": "s3://bucket/B1.tif"}},
            "custom:field": [1, 2, 3]
        })
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let value = landsat_json();
        let item: Item = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(item.collection.as_deref(), Some("landsat"));
        assert_eq!(item.additional_fields.get("custom:field"), Some(&json!([1, 2, 3])));
        assert_eq!(serde_json::to_value(&item).unwrap(), value);
    }

    #[test]
    fn test_property_lookup() {
        let item: Item = serde_json::from_value(landsat_json()).unwrap();
        assert_eq!(item.property("eo:cloud_cover"), Some(json!(12.5)));
        assert_eq!(item.property("datetime"), Some(json!("2021-03-05T00:00:00Z")));
        assert_eq!(item.property("created"), None);
        assert_eq!(item.property("missing"), None);
    }

    #[test]
    fn test_null_property_is_absent() {
        let mut item = Item::new("x");
        item.properties
            .additional_fields
            .insert("eo:cloud_cover".to_string(), Value::Null);
        assert_eq!(item.property("eo:cloud_cover"), None);
    }

    #[test]
    fn test_integer_bbox_and_empty_extensions_round_trip() {
        let value = json!({
            "type": "Feature",
            "stac_version": "1.0.0",
            "stac_extensions": [],
            "id": "scene001",
            "geometry": {"type": "Point", "coordinates": [0, 0]},
            "bbox": [0, 0, 1, 1.5],
            "properties": {"datetime": "2021-03-05T00:00:00Z"},
            "links": [],
            "assets": {}
        });
        let item: Item = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(item.stac_extensions, Some(vec![]));
        assert_eq!(serde_json::to_string(&item).unwrap(), value.to_string());
    }
}
