//! Merging of discovery facts into one descriptor per kind.
//!
//! The merge is a pure function of the *set* of facts: every derived field
//! (preferred version, preferred group, resource name) is recomputed from
//! the accumulated sets, so arrival order and duplicates do not matter.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

use serde::{Deserialize, Serialize};

use crate::{
    discover::{GroupVersionFact, Operation},
    version::ApiVersion,
};

pub mod crd;

/// Deprecated group that used to serve the workload kinds now in `apps`.
const EXTENSIONS_GROUP: &str = "extensions";
const APPS_GROUP: &str = "apps";

/// Versions of one kind served by one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersions {
    pub versions: BTreeSet<String>,
    pub preferred_version: String,
    /// Plural name this group serves the kind under.
    pub api_resource_name: String,
}

/// Authoritative metadata for one resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub kind: String,
    pub api_resource_name: String,
    pub is_namespaced: bool,
    pub supports_all_namespaces: bool,
    pub supported_operations: BTreeSet<Operation>,
    pub groups: BTreeMap<String, GroupVersions>,
    pub preferred_group: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub short_names: BTreeSet<String>,
}

impl ResourceDescriptor {
    fn from_fact(fact: &GroupVersionFact) -> Self {
        let mut descriptor = ResourceDescriptor {
            kind: fact.kind.clone(),
            api_resource_name: fact.api_resource_name.clone(),
            is_namespaced: false,
            supports_all_namespaces: false,
            supported_operations: BTreeSet::new(),
            groups: BTreeMap::new(),
            preferred_group: fact.group.clone(),
            short_names: BTreeSet::new(),
        };
        descriptor.absorb(fact);
        descriptor
    }

    /// Fold a fact into this descriptor and recompute derived fields.
    fn absorb(&mut self, fact: &GroupVersionFact) {
        self.is_namespaced |= fact.is_namespaced;
        self.supports_all_namespaces |= fact.supports_all_namespaces;
        self.supported_operations.extend(fact.operations.iter().copied());
        self.short_names.extend(fact.short_names.iter().cloned());

        if let Err(err) = fact.version.parse::<ApiVersion>() {
            tracing::warn!(
                kind = %fact.kind,
                group = %fact.group,
                version = %fact.version,
                error = %err,
                "malformed version ranks below every valid version"
            );
        }

        let group = self
            .groups
            .entry(fact.group.clone())
            .or_insert_with(|| GroupVersions {
                versions: BTreeSet::new(),
                preferred_version: fact.version.clone(),
                api_resource_name: fact.api_resource_name.clone(),
            });
        group.versions.insert(fact.version.clone());
        group.preferred_version = preferred_version(&group.versions);
        // Several plural names for one kind only happen with mis-registered
        // APIs; keep the smallest so the choice is stable.
        if fact.api_resource_name < group.api_resource_name {
            group.api_resource_name = fact.api_resource_name.clone();
        }

        self.refresh_preferred_group();
    }

    fn refresh_preferred_group(&mut self) {
        if let Some(preferred) = preferred_group(&self.groups) {
            self.preferred_group = preferred.to_string();
            self.api_resource_name = self.groups[preferred].api_resource_name.clone();
        }
    }

    pub fn supports(&self, operation: Operation) -> bool {
        self.supported_operations.contains(&operation)
    }

    /// Preferred version of the preferred group.
    pub fn preferred_version(&self) -> Option<&str> {
        self.groups
            .get(&self.preferred_group)
            .map(|group| group.preferred_version.as_str())
    }

    /// Whether `group` serves this kind at `version`.
    pub fn serves(&self, group: &str, version: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|g| g.versions.contains(version))
    }

    /// Checks if `target` names this kind: the kind itself, its lowercase
    /// form, its plural name, a short name or `plural.group`.
    pub fn matches(&self, target: &str) -> bool {
        self.kind == target
            || self.kind.to_lowercase() == target
            || self.api_resource_name == target
            || self.short_names.contains(target)
            || self
                .groups
                .iter()
                .any(|(group, gv)| format!("{}.{}", gv.api_resource_name, group) == target)
    }
}

/// Versions that fail to parse sort below every valid version, ordered by
/// their raw text, so a single bad entry cannot hide the valid ones.
fn version_rank(a: &str, b: &str) -> Ordering {
    match (a.parse::<ApiVersion>(), b.parse::<ApiVersion>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Ok(_)) => Ordering::Less,
        (Err(_), Err(_)) => b.cmp(a),
    }
}

fn preferred_version(versions: &BTreeSet<String>) -> String {
    versions
        .iter()
        .max_by(|a, b| version_rank(a, b))
        .cloned()
        .unwrap_or_default()
}

/// Choose the preferred group among all groups serving a kind.
///
/// `extensions` is never preferred over `apps`: it is the deprecated home of
/// the workload kinds and may still advertise a version that compares higher.
/// This is a fixed exception, not a general rule. Otherwise the group with
/// the highest preferred version wins; equal versions go to the
/// lexicographically smallest group name.
fn preferred_group(groups: &BTreeMap<String, GroupVersions>) -> Option<&str> {
    let shadow_extensions = groups.contains_key(APPS_GROUP);
    groups
        .iter()
        .filter(|(name, _)| !(shadow_extensions && name.as_str() == EXTENSIONS_GROUP))
        .max_by(|(a_name, a), (b_name, b)| {
            version_rank(&a.preferred_version, &b.preferred_version)
                .then_with(|| b_name.cmp(a_name))
        })
        .map(|(name, _)| name.as_str())
}

/// Read-only mapping from kind to descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRegistry {
    descriptors: BTreeMap<String, ResourceDescriptor>,
}

impl ResourceRegistry {
    /// Build a registry by merging `facts` in any order.
    pub fn from_facts<'a, I>(facts: I) -> Self
    where
        I: IntoIterator<Item = &'a GroupVersionFact>,
    {
        let mut descriptors: BTreeMap<String, ResourceDescriptor> = BTreeMap::new();
        for fact in facts {
            match descriptors.get_mut(&fact.kind) {
                Some(descriptor) => descriptor.absorb(fact),
                None => {
                    descriptors.insert(fact.kind.clone(), ResourceDescriptor::from_fact(fact));
                }
            }
        }
        tracing::debug!(kinds = descriptors.len(), "built resource registry");
        ResourceRegistry { descriptors }
    }

    /// Merge out-of-band kinds (e.g. custom resources) into a new registry.
    ///
    /// Additive only: for a known kind, only groups not yet recorded are
    /// added and the existing preferred group is kept; unknown kinds are
    /// inserted whole.
    pub fn merge_custom<'a, I>(&self, facts: I) -> Self
    where
        I: IntoIterator<Item = &'a GroupVersionFact>,
    {
        let incoming = ResourceRegistry::from_facts(facts);
        let mut descriptors = self.descriptors.clone();

        for (kind, custom) in incoming.descriptors {
            match descriptors.get_mut(&kind) {
                Some(existing) => {
                    for (group, versions) in custom.groups {
                        if existing.groups.contains_key(&group) {
                            continue;
                        }
                        tracing::debug!(%kind, %group, "adding custom group to known kind");
                        existing.groups.insert(group, versions);
                    }
                    existing.short_names.extend(custom.short_names);
                }
                None => {
                    tracing::debug!(%kind, "adding custom kind");
                    descriptors.insert(kind, custom);
                }
            }
        }

        ResourceRegistry { descriptors }
    }

    pub fn get(&self, kind: &str) -> Option<&ResourceDescriptor> {
        self.descriptors.get(kind)
    }

    /// Look up a kind by exact kind name first, then by alias
    /// (see [`ResourceDescriptor::matches`]).
    pub fn resolve(&self, target: &str) -> Option<&ResourceDescriptor> {
        self.get(target)
            .or_else(|| self.descriptors.values().find(|d| d.matches(target)))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(kind: &str, group: &str, version: &str) -> GroupVersionFact {
        GroupVersionFact::new(kind, group, version, format!("{}s", kind.to_lowercase()))
            .namespaced(true)
            .all_namespaces(true)
            .operations([Operation::List, Operation::Get])
    }

    fn sample_facts() -> Vec<GroupVersionFact> {
        vec![
            fact("Deployment", "apps", "v1"),
            fact("Deployment", "apps", "v1beta2"),
            fact("Deployment", "extensions", "v1beta1"),
            fact("Pod", "core", "v1").short_names(["po"]),
            fact("HorizontalPodAutoscaler", "autoscaling", "v2"),
            fact("HorizontalPodAutoscaler", "autoscaling", "v1"),
            fact("HorizontalPodAutoscaler", "autoscaling", "v2beta2"),
            GroupVersionFact::new("Node", "core", "v1", "nodes")
                .all_namespaces(true)
                .operations([Operation::List]),
            GroupVersionFact::new("Pod", "core", "v1", "pods")
                .operations([Operation::Delete, Operation::Create]),
        ]
    }

    #[test]
    fn unions_versions_and_picks_latest() {
        let registry = ResourceRegistry::from_facts(&sample_facts());
        let hpa = registry.get("HorizontalPodAutoscaler").unwrap();
        let autoscaling = &hpa.groups["autoscaling"];
        assert_eq!(
            autoscaling.versions,
            BTreeSet::from(["v1".to_string(), "v2".to_string(), "v2beta2".to_string()])
        );
        assert_eq!(autoscaling.preferred_version, "v2");
        assert_eq!(hpa.preferred_version(), Some("v2"));
    }

    #[test]
    fn unions_operations_and_flags() {
        let registry = ResourceRegistry::from_facts(&sample_facts());
        let pod = registry.get("Pod").unwrap();
        assert!(pod.is_namespaced);
        assert!(pod.supports_all_namespaces);
        assert_eq!(
            pod.supported_operations,
            BTreeSet::from([
                Operation::List,
                Operation::Get,
                Operation::Create,
                Operation::Delete
            ])
        );

        let node = registry.get("Node").unwrap();
        assert!(!node.is_namespaced);
        assert_eq!(node.api_resource_name, "nodes");
        assert_eq!(node.preferred_group, "core");
    }

    #[test]
    fn merge_is_idempotent() {
        let once = ResourceRegistry::from_facts(&[fact("Deployment", "apps", "v1")]);
        let twice = ResourceRegistry::from_facts(&[
            fact("Deployment", "apps", "v1"),
            fact("Deployment", "apps", "v1"),
        ]);
        assert_eq!(once, twice);

        let facts = sample_facts();
        let doubled: Vec<_> = facts.iter().chain(facts.iter()).cloned().collect();
        assert_eq!(
            ResourceRegistry::from_facts(&facts),
            ResourceRegistry::from_facts(&doubled)
        );
    }

    #[test]
    fn merge_is_commutative() {
        let facts = sample_facts();
        let expected = ResourceRegistry::from_facts(&facts);

        let mut reversed = facts.clone();
        reversed.reverse();
        assert_eq!(ResourceRegistry::from_facts(&reversed), expected);

        for shift in 1..facts.len() {
            let mut rotated = facts.clone();
            rotated.rotate_left(shift);
            assert_eq!(ResourceRegistry::from_facts(&rotated), expected, "shift {shift}");
        }

        let mut swapped = facts.clone();
        swapped.swap(0, 2);
        swapped.swap(4, 6);
        assert_eq!(ResourceRegistry::from_facts(&swapped), expected);
    }

    #[test]
    fn apps_is_preferred_over_extensions() {
        // extensions advertising a "higher" version must still lose to apps
        let orders = [
            vec![
                fact("Deployment", "extensions", "v2"),
                fact("Deployment", "apps", "v1beta1"),
            ],
            vec![
                fact("Deployment", "apps", "v1beta1"),
                fact("Deployment", "extensions", "v2"),
            ],
        ];
        for facts in orders {
            let registry = ResourceRegistry::from_facts(&facts);
            let deployment = registry.get("Deployment").unwrap();
            assert_eq!(deployment.preferred_group, "apps");
            assert_eq!(deployment.groups.len(), 2);
        }
    }

    #[test]
    fn exception_does_not_create_cycles() {
        // extensions beats other, other beats apps, apps beats extensions
        let facts = [
            fact("Deployment", "extensions", "v1"),
            fact("Deployment", "apps", "v1beta1"),
            fact("Deployment", "example.io", "v1beta2"),
        ];
        let expected = ResourceRegistry::from_facts(&facts);
        assert_eq!(expected.get("Deployment").unwrap().preferred_group, "example.io");
        for shift in 1..facts.len() {
            let mut rotated = facts.to_vec();
            rotated.rotate_left(shift);
            assert_eq!(ResourceRegistry::from_facts(&rotated), expected);
        }
    }

    #[test]
    fn higher_version_group_wins_otherwise() {
        let registry = ResourceRegistry::from_facts(&[
            fact("Ingress", "extensions", "v1beta1"),
            fact("Ingress", "networking.k8s.io", "v1"),
        ]);
        assert_eq!(
            registry.get("Ingress").unwrap().preferred_group,
            "networking.k8s.io"
        );
    }

    #[test]
    fn equal_versions_tie_break_on_group_name() {
        for facts in [
            [fact("Event", "events.k8s.io", "v1"), fact("Event", "core", "v1")],
            [fact("Event", "core", "v1"), fact("Event", "events.k8s.io", "v1")],
        ] {
            let registry = ResourceRegistry::from_facts(&facts);
            assert_eq!(registry.get("Event").unwrap().preferred_group, "core");
        }
    }

    #[test]
    fn resource_name_follows_preferred_group() {
        let registry = ResourceRegistry::from_facts(&[
            GroupVersionFact::new("Widget", "old.example.io", "v1beta1", "widgetz"),
            GroupVersionFact::new("Widget", "example.io", "v1", "widgets"),
        ]);
        let widget = registry.get("Widget").unwrap();
        assert_eq!(widget.preferred_group, "example.io");
        assert_eq!(widget.api_resource_name, "widgets");
    }

    #[test]
    fn custom_merge_is_additive() {
        let registry = ResourceRegistry::from_facts(&sample_facts());
        let merged = registry.merge_custom(&[
            // known kind, known group: must not touch apps versions
            fact("Deployment", "apps", "v9"),
            // known kind, new group
            fact("Deployment", "example.io", "v3"),
            // new kind
            fact("Widget", "example.io", "v1alpha1"),
        ]);

        let deployment = merged.get("Deployment").unwrap();
        assert_eq!(
            deployment.groups["apps"],
            registry.get("Deployment").unwrap().groups["apps"]
        );
        assert!(deployment.groups.contains_key("example.io"));
        assert_eq!(deployment.preferred_group, "apps");

        let widget = merged.get("Widget").unwrap();
        assert_eq!(widget.preferred_group, "example.io");
        assert_eq!(widget.preferred_version(), Some("v1alpha1"));

        // the source registry is untouched
        assert!(registry.get("Widget").is_none());
        assert_eq!(merged.len(), registry.len() + 1);
    }

    #[test]
    fn malformed_versions_are_never_preferred() {
        let registry = ResourceRegistry::from_facts(&[
            GroupVersionFact::new("Widget", "example.com", "version2", "widgets"),
            GroupVersionFact::new("Widget", "example.com", "v1alpha1", "widgets"),
            GroupVersionFact::new("Widget", "other.io", "latest", "widgets"),
        ]);
        let widget = registry.get("Widget").unwrap();
        assert_eq!(widget.groups["example.com"].preferred_version, "v1alpha1");
        assert_eq!(widget.groups["example.com"].versions.len(), 2);
        assert_eq!(widget.preferred_group, "example.com");
    }

    #[test]
    fn resolves_aliases() {
        let registry = ResourceRegistry::from_facts(&sample_facts());
        assert_eq!(registry.resolve("Pod").unwrap().kind, "Pod");
        assert_eq!(registry.resolve("pod").unwrap().kind, "Pod");
        assert_eq!(registry.resolve("pods").unwrap().kind, "Pod");
        assert_eq!(registry.resolve("po").unwrap().kind, "Pod");
        assert_eq!(registry.resolve("deployments.apps").unwrap().kind, "Deployment");
        assert!(registry.resolve("pod ").is_none());
        assert!(registry.get("pod").is_none());
    }

    #[test]
    fn descriptor_serializes_camel_case() {
        let registry = ResourceRegistry::from_facts(&[fact("Pod", "core", "v1")]);
        let value = serde_json::to_value(&registry).unwrap();
        assert_eq!(value["Pod"]["apiResourceName"], "pods");
        assert_eq!(value["Pod"]["preferredGroup"], "core");
        assert_eq!(value["Pod"]["groups"]["core"]["preferredVersion"], "v1");
        assert_eq!(value["Pod"]["supportedOperations"][0], "list");
    }
}
