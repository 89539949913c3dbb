//! Resource discovery.
//!
//! Discovery produces [`GroupVersionFact`]s, one per group × version × kind,
//! either from a live API server ([`client::DiscoverClient`]) or from a static
//! OpenAPI capability document ([`openapi::facts_from_openapi`]). The facts
//! are merged into descriptors by [`ResourceRegistry`](crate::registry::ResourceRegistry).

use std::{collections::BTreeSet, fmt};

use http::Method;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod openapi;

/// Name used for the legacy core group served under `/api`.
pub const CORE_GROUP: &str = "core";
/// The only version served by the core group.
pub const CORE_VERSION: &str = "v1";

/// An operation a resource kind may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    List,
    Get,
    Create,
    Replace,
    Patch,
    Delete,
    DeleteCollection,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::List,
        Operation::Get,
        Operation::Create,
        Operation::Replace,
        Operation::Patch,
        Operation::Delete,
        Operation::DeleteCollection,
    ];

    /// Map a discovery verb (`create`, `update`, ...) or its HTTP-flavoured
    /// alias (`post`, `put`) to an operation. Verbs with no counterpart, like
    /// `watch` or `proxy`, map to `None`.
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "list" => Some(Operation::List),
            "get" => Some(Operation::Get),
            "create" | "post" => Some(Operation::Create),
            "update" | "put" => Some(Operation::Replace),
            "patch" => Some(Operation::Patch),
            "delete" => Some(Operation::Delete),
            "deletecollection" => Some(Operation::DeleteCollection),
            _ => None,
        }
    }

    pub fn method(self) -> Method {
        match self {
            Operation::List | Operation::Get => Method::GET,
            Operation::Create => Method::POST,
            Operation::Replace => Method::PUT,
            Operation::Patch => Method::PATCH,
            Operation::Delete | Operation::DeleteCollection => Method::DELETE,
        }
    }

    /// Whether the operation addresses a single named resource.
    pub fn is_named(self) -> bool {
        matches!(
            self,
            Operation::Get | Operation::Replace | Operation::Patch | Operation::Delete
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Replace => "replace",
            Operation::Patch => "patch",
            Operation::Delete => "delete",
            Operation::DeleteCollection => "deleteCollection",
        })
    }
}

/// One discovered kind as served by one group/version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupVersionFact {
    pub kind: String,
    pub group: String,
    pub version: String,
    /// Plural path segment, e.g. `deployments`.
    pub api_resource_name: String,
    pub is_namespaced: bool,
    pub supports_all_namespaces: bool,
    pub operations: BTreeSet<Operation>,
    pub short_names: BTreeSet<String>,
}

impl GroupVersionFact {
    pub fn new(
        kind: impl Into<String>,
        group: impl Into<String>,
        version: impl Into<String>,
        api_resource_name: impl Into<String>,
    ) -> Self {
        GroupVersionFact {
            kind: kind.into(),
            group: group.into(),
            version: version.into(),
            api_resource_name: api_resource_name.into(),
            is_namespaced: false,
            supports_all_namespaces: false,
            operations: BTreeSet::new(),
            short_names: BTreeSet::new(),
        }
    }

    pub fn namespaced(mut self, namespaced: bool) -> Self {
        self.is_namespaced = namespaced;
        self
    }

    pub fn all_namespaces(mut self, supported: bool) -> Self {
        self.supports_all_namespaces = supported;
        self
    }

    pub fn operations<I: IntoIterator<Item = Operation>>(mut self, operations: I) -> Self {
        self.operations.extend(operations);
        self
    }

    pub fn short_names<I, S>(mut self, short_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.short_names
            .extend(short_names.into_iter().map(Into::into));
        self
    }
}

/// Resource list route for a group/version.
pub fn group_version_path(group: &str, version: &str) -> String {
    if group == CORE_GROUP {
        format!("/api/{version}")
    } else {
        format!("/apis/{group}/{version}")
    }
}
