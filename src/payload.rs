//! Pipeline payloads: a FeatureCollection of items plus the process
//! definition that says how to publish them.
use std::fs;
use std::path::Path;

use anyhow::{anyhow, ensure, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::UploadOptions;
use crate::item::Item;

pub const TASK_NAME: &str = "publish";

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Payload {
    #[serde(default)]
    pub features: Vec<Item>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<Process>,

    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

/// Either a single process definition or a chain of them, of which the first
/// applies to this task.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(untagged)]
pub enum Process {
    Chain(Vec<ProcessDefinition>),
    Single(ProcessDefinition),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ProcessDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_options: Option<UploadOptions>,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub tasks: Value,

    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

/// Overrides a `tasks.publish` block may carry.
#[derive(Deserialize, Clone, Debug, Default)]
struct PublishTaskConfig {
    public: Option<bool>,
    stac_validate: Option<bool>,
}

impl ProcessDefinition {
    /// Tasks may be keyed by name or listed as names / `{ "name": ... }` objects.
    fn task(&self, name: &str) -> Option<&Value> {
        match &self.tasks {
            Value::Object(tasks) => tasks.get(name),
            Value::Array(tasks) => tasks.iter().find(|task| match task {
                Value::String(task) => task == name,
                Value::Object(task) => task.get("name").and_then(Value::as_str) == Some(name),
                _ => false,
            }),
            _ => None,
        }
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.task(name).is_some()
    }

    /// `upload_options` with any `public`/`stac_validate` set on the publish
    /// task applied on top.
    pub fn upload_options(&self) -> Result<UploadOptions> {
        let mut options = self.upload_options.clone().unwrap_or_default();
        let config = match self.task(TASK_NAME) {
            Some(task) if task.is_object() => PublishTaskConfig::deserialize(task)?,
            _ => PublishTaskConfig::default(),
        };
        if let Some(public) = config.public {
            options.public = public;
        }
        if let Some(stac_validate) = config.stac_validate {
            options.stac_validate = stac_validate;
        }
        Ok(options)
    }
}

impl Payload {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let payload: Self = serde_json::from_str(content)?;
        Ok(payload)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn process_definition(&self) -> Result<&ProcessDefinition> {
        match &self.process {
            Some(Process::Single(definition)) => Ok(definition),
            Some(Process::Chain(chain)) => chain
                .first()
                .ok_or_else(|| anyhow!("Payload process chain is empty")),
            None => Err(anyhow!("Payload has no process definition")),
        }
    }

    /// Checks the payload is addressed to this task.
    pub fn validate(&self) -> Result<&ProcessDefinition> {
        let definition = self.process_definition()?;
        ensure!(
            definition.has_task(TASK_NAME),
            "Publish needs to be specified as a task in the input payload"
        );
        Ok(definition)
    }
}
