//! Scope-aware request construction and dispatch for one resource kind.
//!
//! A [`RequestBuilder`] is bound to a snapshot of a descriptor's preferred
//! group/version (or an explicitly chosen one). Scoping methods never mutate
//! the receiver; they return a new builder carrying a copied
//! [`RequestState`], so one binding can be branched into many independent
//! calls, including concurrent ones.

use std::{collections::BTreeSet, sync::Arc};

use http::{Request, header::CONTENT_TYPE};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    discover::{CORE_GROUP, Operation},
    dynamic::{DynamicList, DynamicObject},
    error::{Error, Result},
    registry::ResourceDescriptor,
    selector::{self, Selector},
    transport::{self, JSON, STRATEGIC_MERGE_PATCH, Transport},
};

/// Namespace used when a namespaced kind is addressed without one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Characters left alone by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Descriptor fields captured at binding time.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    kind: String,
    group: String,
    version: String,
    api_resource_name: String,
    is_namespaced: bool,
    supports_all_namespaces: bool,
    operations: BTreeSet<Operation>,
}

/// Per-call scoping state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestState {
    pub namespace: Option<String>,
    pub all_namespaces: bool,
    /// Compiled selector clauses, in the order they were added.
    pub label_selectors: Vec<String>,
    pub limit: Option<u32>,
    pub continue_token: Option<String>,
    pub resource_name: Option<String>,
}

/// Builds and sends requests for one resource kind.
#[derive(Debug, Clone)]
pub struct RequestBuilder<T> {
    transport: T,
    target: Arc<Target>,
    state: RequestState,
}

impl<T: Transport> RequestBuilder<T> {
    /// Bind to the descriptor's preferred group and version.
    pub fn new(transport: T, descriptor: &ResourceDescriptor) -> Self {
        let version = descriptor.preferred_version().unwrap_or_default().to_string();
        Self::bind(
            transport,
            descriptor,
            descriptor.preferred_group.clone(),
            version,
            descriptor.api_resource_name.clone(),
        )
    }

    /// Bind to a specific group/version recorded for the descriptor.
    ///
    /// # Errors
    /// [`Error::UnknownGroupVersion`] when the group does not serve the kind
    /// at `version`.
    pub fn for_group_version(
        transport: T,
        descriptor: &ResourceDescriptor,
        group: &str,
        version: &str,
    ) -> Result<Self> {
        let served = descriptor
            .groups
            .get(group)
            .filter(|g| g.versions.contains(version))
            .ok_or_else(|| Error::UnknownGroupVersion {
                kind: descriptor.kind.clone(),
                group: group.to_string(),
                version: version.to_string(),
            })?;
        Ok(Self::bind(
            transport,
            descriptor,
            group.to_string(),
            version.to_string(),
            served.api_resource_name.clone(),
        ))
    }

    fn bind(
        transport: T,
        descriptor: &ResourceDescriptor,
        group: String,
        version: String,
        api_resource_name: String,
    ) -> Self {
        RequestBuilder {
            transport,
            target: Arc::new(Target {
                kind: descriptor.kind.clone(),
                group,
                version,
                api_resource_name,
                is_namespaced: descriptor.is_namespaced,
                supports_all_namespaces: descriptor.supports_all_namespaces,
                operations: descriptor.supported_operations.clone(),
            }),
            state: RequestState::default(),
        }
    }

    fn with_state(&self, update: impl FnOnce(&mut RequestState)) -> Self {
        let mut next = self.clone();
        update(&mut next.state);
        next
    }

    /// Scope to a namespace. Ignored for cluster-scoped kinds.
    pub fn namespace(&self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.with_state(|state| {
            state.namespace = Some(namespace);
            state.all_namespaces = false;
        })
    }

    /// Address the kind across all namespaces.
    pub fn all_namespaces(&self) -> Self {
        self.with_state(|state| state.all_namespaces = true)
    }

    pub fn limit(&self, limit: u32) -> Self {
        self.with_state(|state| state.limit = Some(limit))
    }

    /// Resume a list from a continuation cursor.
    pub fn continue_token(&self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.with_state(|state| state.continue_token = Some(token))
    }

    /// Add label selector clauses. Clauses accumulate across calls.
    ///
    /// # Errors
    /// Fails when the selector uses an unknown operator.
    pub fn label_selector(&self, selector: impl Into<Selector>) -> Result<Self> {
        let clauses = selector::compile(&selector.into())?;
        Ok(self.with_state(|state| state.label_selectors.extend(clauses)))
    }

    fn named(&self, name: &str) -> Self {
        self.with_state(|state| state.resource_name = Some(name.to_string()))
    }

    pub fn kind(&self) -> &str {
        &self.target.kind
    }

    pub fn group(&self) -> &str {
        &self.target.group
    }

    pub fn version(&self) -> &str {
        &self.target.version
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn supports(&self, operation: Operation) -> bool {
        self.target.operations.contains(&operation)
    }

    /// Request path for the current state.
    pub fn path(&self) -> String {
        let target = &self.target;
        let mut path = if target.group == CORE_GROUP {
            format!("/api/{}", target.version)
        } else {
            format!("/apis/{}/{}", target.group, target.version)
        };

        if target.is_namespaced && !self.state.all_namespaces {
            let namespace = self
                .state
                .namespace
                .as_deref()
                .filter(|namespace| !namespace.is_empty())
                .unwrap_or(DEFAULT_NAMESPACE);
            path.push_str("/namespaces/");
            path.push_str(namespace);
        }

        path.push('/');
        path.push_str(&target.api_resource_name);

        if let Some(name) = &self.state.resource_name {
            path.push('/');
            path.push_str(name);
        }
        path
    }

    /// Query string for the current state, without the leading `?`.
    pub fn query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(limit) = self.state.limit {
            parts.push(format!("limit={limit}"));
        }
        if let Some(token) = &self.state.continue_token {
            parts.push(format!("continue={}", encode(token)));
        }
        if !self.state.label_selectors.is_empty() {
            let selectors: Vec<String> = self
                .state
                .label_selectors
                .iter()
                .map(|clause| encode(clause))
                .collect();
            parts.push(format!("labelSelector={}", selectors.join(",")));
        }
        parts.join("&")
    }

    pub fn uri(&self) -> String {
        let query = self.query();
        if query.is_empty() {
            self.path()
        } else {
            format!("{}?{}", self.path(), query)
        }
    }

    fn ensure_supported(&self, operation: Operation) -> Result<()> {
        let target = &self.target;
        if !target.operations.contains(&operation) {
            return Err(Error::UnsupportedOperation {
                kind: target.kind.clone(),
                operation,
            });
        }
        if self.state.all_namespaces && target.is_namespaced && !target.supports_all_namespaces {
            return Err(Error::AllNamespacesUnsupported {
                kind: target.kind.clone(),
            });
        }
        Ok(())
    }

    /// Namespace and name are spliced into the path verbatim, so neither may
    /// carry a separator that would address another route.
    fn ensure_valid_segments(&self) -> Result<()> {
        let name = self.state.resource_name.as_deref();
        if name == Some("") {
            return Err(Error::InvalidPath(self.path()));
        }
        let namespace = self
            .state
            .namespace
            .as_deref()
            .filter(|_| self.target.is_namespaced && !self.state.all_namespaces);
        let crosses_route = [namespace, name]
            .into_iter()
            .flatten()
            .any(|segment| segment == "." || segment == ".." || segment.contains(['/', '?', '#']));
        if crosses_route {
            return Err(Error::InvalidPath(self.path()));
        }
        Ok(())
    }

    fn build_request<P: Serialize>(
        &self,
        operation: Operation,
        payload: Option<&P>,
    ) -> Result<Request<Vec<u8>>> {
        self.ensure_supported(operation)?;
        self.ensure_valid_segments()?;

        let mut request = transport::request(operation.method(), &self.uri());
        let body = match payload {
            Some(payload) => {
                let content_type = match operation {
                    Operation::Patch => STRATEGIC_MERGE_PATCH,
                    _ => JSON,
                };
                request = request.header(CONTENT_TYPE, content_type);
                serde_json::to_vec(payload).map_err(Error::Encode)?
            }
            None => Vec::new(),
        };
        request.body(body).map_err(Error::InvalidRequest)
    }

    async fn dispatch<P: Serialize>(&self, operation: Operation, payload: Option<&P>) -> Result<Value> {
        let request = self.build_request(operation, payload)?;
        tracing::debug!(kind = %self.target.kind, %operation, "dispatching request");
        transport::send(&self.transport, request).await
    }

    /// List the kind in the current scope.
    pub async fn list(&self) -> Result<DynamicList> {
        decode(self.dispatch(Operation::List, None::<&()>).await?)
    }

    pub async fn get(&self, name: &str) -> Result<DynamicObject> {
        decode(self.named(name).dispatch(Operation::Get, None::<&()>).await?)
    }

    /// `POST` a new resource.
    pub async fn create<P: Serialize>(&self, payload: &P) -> Result<DynamicObject> {
        decode(self.dispatch(Operation::Create, Some(payload)).await?)
    }

    /// `PUT` a full replacement of `name`.
    pub async fn replace<P: Serialize>(&self, name: &str, payload: &P) -> Result<DynamicObject> {
        decode(self.named(name).dispatch(Operation::Replace, Some(payload)).await?)
    }

    /// Strategic-merge `PATCH` of `name`.
    pub async fn patch<P: Serialize>(&self, name: &str, patch: &P) -> Result<DynamicObject> {
        decode(self.named(name).dispatch(Operation::Patch, Some(patch)).await?)
    }

    /// Delete `name`. The server answers with the object or a `Status`.
    pub async fn delete(&self, name: &str) -> Result<Value> {
        self.named(name).dispatch(Operation::Delete, None::<&()>).await
    }

    /// Delete every resource matching the current scope and selectors.
    pub async fn delete_collection(&self) -> Result<Value> {
        self.dispatch(Operation::DeleteCollection, None::<&()>).await
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

fn decode<R: DeserializeOwned>(value: Value) -> Result<R> {
    serde_json::from_value(value).map_err(Error::Decode)
}
