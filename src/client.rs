use std::sync::Arc;

use http::{Method, header::CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;

use crate::{
    discover::{client::DiscoverClient, openapi},
    error::{Error, Result},
    registry::{ResourceRegistry, crd},
    request::RequestBuilder,
    transport::{self, JSON, STRATEGIC_MERGE_PATCH, Transport},
};

/// A transport paired with the registry of kinds it can address.
///
/// The registry is shared read-only; cloning a `Client` is cheap.
#[derive(Debug, Clone)]
pub struct Client<T> {
    transport: T,
    registry: Arc<ResourceRegistry>,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, registry: ResourceRegistry) -> Self {
        Client {
            transport,
            registry: Arc::new(registry),
        }
    }

    /// Build the registry from the server's live discovery endpoints.
    pub async fn load(transport: T) -> Result<Self> {
        Self::load_with(DiscoverClient::new(transport)).await
    }

    /// Same as [`Client::load`] with a configured discovery client.
    pub async fn load_with(discover: DiscoverClient<T>) -> Result<Self> {
        let facts = discover.discover().await?;
        let registry = ResourceRegistry::from_facts(&facts);
        tracing::info!(kinds = registry.len(), "loaded resource registry");
        Ok(Self::new(discover.into_transport(), registry))
    }

    /// Build the registry from an OpenAPI document instead of live discovery.
    pub fn from_openapi(transport: T, document: &[u8]) -> Result<Self> {
        let facts = openapi::facts_from_openapi(document)?;
        Ok(Self::new(transport, ResourceRegistry::from_facts(&facts)))
    }

    /// Extend the registry with the cluster's custom resource definitions.
    pub async fn load_custom_resources(&self) -> Result<Self> {
        let registry = crd::merge_custom_resources(&self.transport, &self.registry).await?;
        Ok(Self::new(self.transport.clone(), registry))
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Shared handle to the registry, e.g. for shell completion.
    pub fn registry(&self) -> Arc<ResourceRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Request builder for a kind, looked up by kind or alias.
    ///
    /// # Errors
    /// [`Error::UnknownResource`] when no kind matches `target`.
    pub fn resource(&self, target: &str) -> Result<RequestBuilder<T>> {
        let descriptor = self
            .registry
            .resolve(target)
            .ok_or_else(|| Error::UnknownResource(target.to_string()))?;
        Ok(RequestBuilder::new(self.transport.clone(), descriptor))
    }

    /// Request builder bound to a specific group/version of a kind.
    pub fn resource_at(&self, target: &str, group: &str, version: &str) -> Result<RequestBuilder<T>> {
        let descriptor = self
            .registry
            .resolve(target)
            .ok_or_else(|| Error::UnknownResource(target.to_string()))?;
        RequestBuilder::for_group_version(self.transport.clone(), descriptor, group, version)
    }

    /// Send a request to an arbitrary server path, bypassing the registry.
    ///
    /// Covers routes the builder does not model, such as `/version`,
    /// sub-resources or custom query parameters. `path_and_query` is sent
    /// as given. A `PATCH` body is sent as a strategic merge patch, any
    /// other body as JSON. The response goes through the same decoding as
    /// builder calls.
    ///
    /// # Errors
    /// [`Error::InvalidPath`] unless `path_and_query` is an absolute path;
    /// otherwise the errors of the builder operations.
    pub async fn request<P: Serialize>(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<&P>,
    ) -> Result<Value> {
        if !path_and_query.starts_with('/') || path_and_query.starts_with("//") {
            return Err(Error::InvalidPath(path_and_query.to_string()));
        }
        let mut request = transport::request(method.clone(), path_and_query);
        let body = match body {
            Some(body) => {
                let content_type = if method == Method::PATCH {
                    STRATEGIC_MERGE_PATCH
                } else {
                    JSON
                };
                request = request.header(CONTENT_TYPE, content_type);
                serde_json::to_vec(body).map_err(Error::Encode)?
            }
            None => Vec::new(),
        };
        let request = request.body(body).map_err(Error::InvalidRequest)?;
        tracing::debug!(%method, path = path_and_query, "dispatching raw request");
        transport::send(&self.transport, request).await
    }
}
