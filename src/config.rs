use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::location::DEFAULT_REGION;
use crate::path_template::DEFAULT_PATH_TEMPLATE;
use crate::s3::ClientOptions;

pub const BUCKET_ENV: &str = "SWOOP_DATA_BUCKET";
const REGION_ENVS: [&str; 2] = ["AWS_REGION", "AWS_DEFAULT_REGION"];

/// Per-payload publish options, read from `process.upload_options`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct UploadOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_template: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    pub public: bool,
    pub stac_validate: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            path_template: None,
            headers: BTreeMap::new(),
            public: false,
            stac_validate: true,
        }
    }
}

impl UploadOptions {
    pub fn path_template(&self) -> &str {
        self.path_template.as_deref().unwrap_or(DEFAULT_PATH_TEMPLATE)
    }
}

/// Where and how to connect, as opposed to what to publish.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub endpoint_url: Option<String>,
}

impl Settings {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Fills unset values from the process environment.
    pub fn with_env(self) -> Self {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).filter(|value| !value.is_empty());
        if self.bucket.is_none() {
            self.bucket = lookup(BUCKET_ENV);
        }
        if self.region.is_none() {
            self.region = REGION_ENVS.iter().find_map(|name| lookup(*name));
        }
        self
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            profile: self.profile.clone(),
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
        }
    }
}
