use k8s_openapi::apimachinery::pkg::apis::meta::v1::ListMeta;
use kube::api::{ObjectMeta, TypeMeta};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Suffix every list response kind carries, e.g. `PodList`.
const LIST_SUFFIX: &str = "List";

/// An untyped resource as returned by a single-object operation.
///
/// Type information lives in `types` and `metadata`; every other top-level
/// key (`spec`, `status`, `data`, ...) is kept verbatim in `data`.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Default)]
pub struct DynamicObject {
    /// The type fields, not always present
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// All other keys
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl DynamicObject {
    pub fn kind(&self) -> Option<&str> {
        self.types.as_ref().map(|t| t.kind.as_str())
    }

    /// Convert into a typed resource, e.g. a `k8s_openapi` struct.
    pub fn try_parse<K: DeserializeOwned>(&self) -> Result<K> {
        let value = serde_json::to_value(self).map_err(Error::Decode)?;
        serde_json::from_value(value).map_err(Error::Decode)
    }
}

/// A list response: `kind` ends in `List` and `items` holds the objects.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Default)]
pub struct DynamicList {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<DynamicObject>,
}

impl DynamicList {
    pub fn kind(&self) -> Option<&str> {
        self.types.as_ref().map(|t| t.kind.as_str())
    }

    /// Whether the response follows the list naming convention.
    pub fn is_list(&self) -> bool {
        self.kind().is_some_and(|kind| kind.ends_with(LIST_SUFFIX))
    }

    /// The continuation cursor, if more pages remain.
    pub fn continue_token(&self) -> Option<&str> {
        self.metadata
            .continue_
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}
