use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::{CORE_GROUP, CORE_VERSION, GroupVersionFact, Operation};
use crate::error::{Error, Result};

const NAME_PLACEHOLDER: &str = "{name}";
const NAMESPACE_PLACEHOLDER: &str = "{namespace}";

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    paths: BTreeMap<String, BTreeMap<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct OperationMeta {
    #[serde(rename = "x-kubernetes-group-version-kind")]
    group_version_kind: Option<GroupVersionKind>,
    #[serde(rename = "x-kubernetes-action")]
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupVersionKind {
    kind: String,
}

/// Positional decomposition of a resource route.
#[derive(Debug, PartialEq, Eq)]
struct Route<'a> {
    group: &'a str,
    version: &'a str,
    resource: &'a str,
    namespaced: bool,
    named: bool,
}

/// Derive facts from an OpenAPI document's `paths`.
///
/// # Errors
/// Returns [`Error::Document`] when `document` is not valid JSON or `paths`
/// has an unexpected shape.
pub fn facts_from_openapi(document: &[u8]) -> Result<Vec<GroupVersionFact>> {
    let document: Document = serde_json::from_slice(document).map_err(Error::Document)?;
    Ok(collect(&document))
}

/// Same as [`facts_from_openapi`] for an already parsed document.
pub fn facts_from_openapi_value(document: &Value) -> Result<Vec<GroupVersionFact>> {
    let document = Document::deserialize(document).map_err(Error::Document)?;
    Ok(collect(&document))
}

fn collect(document: &Document) -> Vec<GroupVersionFact> {
    let mut facts = Vec::new();
    for (path, methods) in &document.paths {
        let Some(route) = parse_route(path) else {
            continue;
        };
        for (method, definition) in methods {
            if method == "parameters" {
                continue;
            }
            let meta = OperationMeta::deserialize(definition).unwrap_or_default();
            let Some(gvk) = meta.group_version_kind else {
                continue;
            };
            let operation = match meta.action.as_deref() {
                Some(action) => Operation::from_verb(action),
                None => operation_for_method(method, route.named),
            };
            let listable_everywhere = operation == Some(Operation::List) && !route.namespaced;
            facts.push(
                GroupVersionFact::new(gvk.kind, route.group, route.version, route.resource)
                    .namespaced(route.namespaced)
                    .all_namespaces(listable_everywhere)
                    .operations(operation),
            );
        }
    }
    facts
}

fn parse_route(path: &str) -> Option<Route<'_>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (group, version, rest) = if path.starts_with("/apis/") {
        (*segments.get(1)?, *segments.get(2)?, segments.get(3..)?)
    } else if segments.first() == Some(&"api") {
        (CORE_GROUP, CORE_VERSION, segments.get(2..)?)
    } else {
        return None;
    };

    // group listing, e.g. /apis/apps/v1
    if rest.is_empty() {
        return None;
    }
    if rest[0] == "watch" {
        return None;
    }
    let name_index = rest.iter().position(|s| *s == NAME_PLACEHOLDER);
    // sub-resource, e.g. namespaces/{namespace}/deployments/{name}/scale
    if name_index.is_some_and(|i| i != rest.len() - 1) {
        return None;
    }

    let namespaced = rest.contains(&NAMESPACE_PLACEHOLDER);
    let resource = if namespaced { *rest.get(2)? } else { rest[0] };
    Some(Route {
        group,
        version,
        resource,
        namespaced,
        named: name_index.is_some(),
    })
}

fn operation_for_method(method: &str, named: bool) -> Option<Operation> {
    match (method, named) {
        ("get", true) => Some(Operation::Get),
        ("get", false) => Some(Operation::List),
        ("post", _) => Some(Operation::Create),
        ("put", _) => Some(Operation::Replace),
        ("patch", _) => Some(Operation::Patch),
        ("delete", true) => Some(Operation::Delete),
        ("delete", false) => Some(Operation::DeleteCollection),
        _ => None,
    }
}
