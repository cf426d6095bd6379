use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A delta of desired properties pushed from the cloud.
///
/// The patch is only observed, never applied or acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TwinPatch {
    pub properties: Value,
}

impl TwinPatch {
    pub fn new(properties: Value) -> Self {
        Self { properties }
    }

    /// The `$version` stamped on the patch by the hub, if any.
    pub fn version(&self) -> Option<u64> {
        self.properties.get("$version").and_then(Value::as_u64)
    }
}

impl fmt::Display for TwinPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.properties)
    }
}
