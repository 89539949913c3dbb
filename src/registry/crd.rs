//! Folding custom resource definitions into an existing registry.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceDefinitionSpec,
};

use super::ResourceRegistry;
use crate::{
    discover::{GroupVersionFact, Operation},
    error::{Error, Result},
    paginate::paginate,
    request::RequestBuilder,
    transport::Transport,
};

/// Kind under which the API server exposes custom resource definitions.
pub const CRD_KIND: &str = "CustomResourceDefinition";

const NAMESPACED_SCOPE: &str = "Namespaced";

/// One fact per served version of each definition.
///
/// Custom resources support every operation; namespaced ones can also be
/// listed across all namespaces.
pub fn facts_from_crds(crds: &[CustomResourceDefinition]) -> Vec<GroupVersionFact> {
    crds.iter()
        .flat_map(|crd| facts_from_spec(&crd.spec))
        .collect()
}

fn facts_from_spec(spec: &CustomResourceDefinitionSpec) -> Vec<GroupVersionFact> {
    let namespaced = spec.scope == NAMESPACED_SCOPE;
    let short_names = spec.names.short_names.clone().unwrap_or_default();
    spec.versions
        .iter()
        .filter(|version| version.served)
        .map(|version| {
            GroupVersionFact::new(&spec.names.kind, &spec.group, &version.name, &spec.names.plural)
                .namespaced(namespaced)
                .all_namespaces(namespaced)
                .operations(Operation::ALL)
                .short_names(short_names.iter().cloned())
        })
        .collect()
}

/// List the cluster's custom resource definitions and merge them into a new
/// registry.
///
/// Returns an unchanged copy when `registry` does not know
/// `CustomResourceDefinition` or cannot list it.
#[tracing::instrument(level = "debug", skip_all)]
pub async fn merge_custom_resources<T: Transport>(
    transport: &T,
    registry: &ResourceRegistry,
) -> Result<ResourceRegistry> {
    let Some(descriptor) = registry
        .get(CRD_KIND)
        .filter(|descriptor| descriptor.supports(Operation::List))
    else {
        tracing::debug!("custom resource definitions are not listable");
        return Ok(registry.clone());
    };

    let list = paginate(&RequestBuilder::new(transport.clone(), descriptor)).await?;
    let crds = list
        .items
        .into_iter()
        .map(|item| {
            let spec = serde_json::from_value(item.data.get("spec").cloned().unwrap_or_default())
                .map_err(Error::Decode)?;
            Ok(CustomResourceDefinition {
                metadata: item.metadata,
                spec,
                status: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(definitions = crds.len(), "listed custom resource definitions");

    Ok(registry.merge_custom(&facts_from_crds(&crds)))
}
