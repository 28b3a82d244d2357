use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SveaError};

/// Gate consulted whenever a copy would replace an existing file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverwritePolicy(bool);

impl OverwritePolicy {
    pub const DENY: Self = Self(false);
    pub const ALLOW: Self = Self(true);

    pub fn allows(self) -> bool {
        self.0
    }

    /// Accepts only a JSON boolean; anything else is a `Dtype` error.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(flag) => Ok(Self(*flag)),
            other => Err(SveaError::dtype(format!(
                "Overwrite permission needs to be of type boolean, got {other}"
            ))),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Self::ALLOW),
            "false" | "0" | "no" => Ok(Self::DENY),
            other => Err(SveaError::dtype(format!(
                "Overwrite permission needs to be of type boolean, got '{other}'"
            ))),
        }
    }
}

impl From<bool> for OverwritePolicy {
    fn from(flag: bool) -> Self {
        Self(flag)
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
