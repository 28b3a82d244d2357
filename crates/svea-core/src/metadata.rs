use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SveaError};
use crate::overwrite::OverwritePolicy;

pub type MetadataMap = BTreeMap<String, Value>;

/// Cruise-level metadata handed to the dataset session.
///
/// The overwrite policy here decides whether values already present in a
/// dataset may be replaced; it is independent of file overwriting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    data: MetadataMap,
    overwrite: OverwritePolicy,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> &MetadataMap {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn set(&mut self, metadata: Value) -> Result<()> {
        self.data = into_flat_map(metadata)?;
        debug!(keys = self.data.len(), "metadata replaced");
        Ok(())
    }

    pub fn add(&mut self, metadata: Value) -> Result<()> {
        let incoming = into_flat_map(metadata)?;
        debug!(keys = incoming.len(), "metadata merged");
        self.data.extend(incoming);
        Ok(())
    }

    pub fn set_map(&mut self, metadata: MetadataMap) -> Result<()> {
        self.set(Value::Object(metadata.into_iter().collect()))
    }

    pub fn add_map(&mut self, metadata: MetadataMap) -> Result<()> {
        self.add(Value::Object(metadata.into_iter().collect()))
    }

    pub fn overwrite(&self) -> OverwritePolicy {
        self.overwrite
    }

    pub fn set_overwrite(&mut self, overwrite: OverwritePolicy) {
        self.overwrite = overwrite;
    }
}

fn into_flat_map(metadata: Value) -> Result<MetadataMap> {
    let Value::Object(object) = metadata else {
        return Err(SveaError::dtype(format!(
            "metadata should be a mapping, got {}",
            type_name(&metadata)
        )));
    };
    let mut map = MetadataMap::new();
    for (key, value) in object {
        if matches!(value, Value::Object(_) | Value::Array(_)) {
            return Err(SveaError::dtype(format!(
                "metadata value for '{key}' should be a scalar, got {}",
                type_name(&value)
            )));
        }
        map.insert(key, value);
    }
    Ok(map)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}
