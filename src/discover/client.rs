use futures::future::try_join_all;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroupList, APIResource, APIResourceList};
use tracing::instrument;

use super::{CORE_GROUP, CORE_VERSION, GroupVersionFact, Operation, group_version_path};
use crate::{
    error::{Error, Result},
    transport::{self, Transport},
};

const API_GROUPS_ROUTE: &str = "/apis";

/// Live discovery against an API server.
///
/// Issues one request for the group list, then one request per group (or per
/// group × version with [`all_versions`](Self::all_versions)) concurrently.
/// Any failing request aborts the whole discovery.
#[derive(Debug, Clone)]
pub struct DiscoverClient<T> {
    transport: T,
    all_versions: bool,
}

impl<T: Transport> DiscoverClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            all_versions: false,
        }
    }

    /// Fetch every advertised version of each group instead of only the
    /// preferred one.
    pub fn all_versions(mut self, all_versions: bool) -> Self {
        self.all_versions = all_versions;
        self
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Discover every kind served by the cluster.
    #[instrument(skip(self), fields(all_versions = self.all_versions))]
    pub async fn discover(&self) -> Result<Vec<GroupVersionFact>> {
        let mut targets = vec![(CORE_GROUP.to_string(), CORE_VERSION.to_string())];
        targets.extend(self.group_versions().await?);
        tracing::debug!(count = targets.len(), "fetching resource lists");

        let lists = try_join_all(
            targets
                .iter()
                .map(|(group, version)| self.group_version_facts(group, version)),
        )
        .await?;

        let facts: Vec<GroupVersionFact> = lists.into_iter().flatten().collect();
        tracing::debug!(count = facts.len(), "discovery finished");
        Ok(facts)
    }

    async fn group_versions(&self) -> Result<Vec<(String, String)>> {
        let list: APIGroupList = transport::get_json(&self.transport, API_GROUPS_ROUTE)
            .await
            .map_err(|source| Error::Discovery {
                path: API_GROUPS_ROUTE.to_string(),
                source: Box::new(source),
            })?;

        let mut targets = Vec::new();
        for group in list.groups {
            if self.all_versions {
                targets.extend(
                    group
                        .versions
                        .iter()
                        .map(|v| (group.name.clone(), v.version.clone())),
                );
            } else if let Some(preferred) = group
                .preferred_version
                .as_ref()
                .or_else(|| group.versions.first())
            {
                targets.push((group.name.clone(), preferred.version.clone()));
            }
        }
        Ok(targets)
    }

    async fn group_version_facts(&self, group: &str, version: &str) -> Result<Vec<GroupVersionFact>> {
        let path = group_version_path(group, version);
        let list: APIResourceList = transport::get_json(&self.transport, &path)
            .await
            .map_err(|source| Error::Discovery {
                path: path.clone(),
                source: Box::new(source),
            })?;
        Ok(facts_from_resource_list(group, version, &list.resources))
    }
}

/// Convert one resource list into facts, skipping sub-resources such as
/// `deployments/scale`.
pub fn facts_from_resource_list(
    group: &str,
    version: &str,
    resources: &[APIResource],
) -> Vec<GroupVersionFact> {
    resources
        .iter()
        .filter(|resource| {
            let sub_resource = resource.name.contains('/');
            if sub_resource {
                tracing::trace!(name = %resource.name, "skipping sub-resource");
            }
            !sub_resource
        })
        .map(|resource| {
            let operations: Vec<Operation> = resource
                .verbs
                .iter()
                .filter_map(|verb| Operation::from_verb(verb))
                .collect();
            let listable = operations.contains(&Operation::List);
            GroupVersionFact::new(&resource.kind, group, version, &resource.name)
                .namespaced(resource.namespaced)
                .all_namespaces(listable)
                .operations(operations)
                .short_names(resource.short_names.iter().flatten().cloned())
        })
        .collect()
}
