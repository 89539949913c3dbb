use std::{collections::BTreeSet, ffi::OsStr, sync::Arc};

use clap_complete::engine::{ArgValueCompleter, CompletionCandidate};
use kube::config::Kubeconfig;

use crate::registry::ResourceRegistry;

/// Create an `ArgValueCompleter` that lists contexts from the active kubeconfig.
pub fn context_value_completer() -> ArgValueCompleter {
    ArgValueCompleter::new(|input: &OsStr| -> Vec<CompletionCandidate> {
        let Ok(kubeconfig) = Kubeconfig::read() else {
            return Vec::new();
        };
        context_candidates(&kubeconfig, input.to_string_lossy().trim())
            .into_iter()
            .map(CompletionCandidate::new)
            .collect()
    })
}

fn context_candidates(kubeconfig: &Kubeconfig, input: &str) -> Vec<String> {
    kubeconfig
        .contexts
        .iter()
        .filter(|named_context| named_context.name.starts_with(input))
        .map(|named_context| named_context.name.clone())
        .collect()
}

/// Create an `ArgValueCompleter` over the kinds of a loaded registry.
///
/// Kinds and their plural names are offered. Values may be comma-delimited;
/// only the last token is completed and the earlier ones are kept.
pub fn kind_value_completer(registry: Arc<ResourceRegistry>) -> ArgValueCompleter {
    ArgValueCompleter::new(move |input: &OsStr| -> Vec<CompletionCandidate> {
        kind_candidates(&registry, input.to_string_lossy().trim())
            .into_iter()
            .map(CompletionCandidate::new)
            .collect()
    })
}

/// Completion values for `input`, in sorted order without duplicates.
pub fn kind_candidates(registry: &ResourceRegistry, input: &str) -> Vec<String> {
    let (done, current) = match input.rsplit_once(',') {
        Some((done, current)) => (format!("{done},"), current),
        None => (String::new(), input),
    };

    let names: BTreeSet<&str> = registry
        .descriptors()
        .flat_map(|descriptor| [descriptor.kind.as_str(), descriptor.api_resource_name.as_str()])
        .filter(|name| name.starts_with(current))
        .collect();

    names.into_iter().map(|name| format!("{done}{name}")).collect()
}

#[cfg(test)]
mod tests {
    use kube::config::NamedContext;

    use super::*;
    use crate::discover::{GroupVersionFact, Operation};

    fn registry() -> ResourceRegistry {
        ResourceRegistry::from_facts(&[
            GroupVersionFact::new("Pod", "core", "v1", "pods").operations([Operation::List]),
            GroupVersionFact::new("PodTemplate", "core", "v1", "podtemplates")
                .operations([Operation::List]),
            GroupVersionFact::new("Deployment", "apps", "v1", "deployments")
                .operations([Operation::List]),
        ])
    }

    #[test]
    fn completes_kinds_and_plurals() {
        let registry = registry();
        assert_eq!(kind_candidates(&registry, "Po"), ["Pod", "PodTemplate"]);
        assert_eq!(kind_candidates(&registry, "po"), ["pods", "podtemplates"]);
        assert_eq!(kind_candidates(&registry, "").len(), 6);
        assert!(kind_candidates(&registry, "Widget").is_empty());
    }

    #[test]
    fn completes_last_comma_token() {
        assert_eq!(
            kind_candidates(&registry(), "pods,dep"),
            ["pods,deployments"]
        );
        assert_eq!(
            kind_candidates(&registry(), "pods,"),
            [
                "pods,Deployment",
                "pods,Pod",
                "pods,PodTemplate",
                "pods,deployments",
                "pods,pods",
                "pods,podtemplates"
            ]
        );
    }

    #[test]
    fn completes_contexts_by_prefix() {
        let kubeconfig = Kubeconfig {
            contexts: ["kind-dev", "kind-prod", "staging"]
                .into_iter()
                .map(|name| NamedContext {
                    name: name.to_string(),
                    context: None,
                })
                .collect(),
            ..Default::default()
        };
        assert_eq!(
            context_candidates(&kubeconfig, "kind"),
            ["kind-dev", "kind-prod"]
        );
    }
}
