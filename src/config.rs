//! Connecting to a cluster.
//!
//! Credentials and endpoints are read by [`kube::Config`]; this module only
//! picks the context and the namespace callers should default to.

use kube::{
    Config,
    config::{KubeConfigOptions, Kubeconfig},
};

use crate::client::Client;

/// Overrides for [`connect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Kubeconfig context. The current context (or the in-cluster service
    /// account) is used when unset.
    pub context: Option<String>,
    /// Namespace for namespaced requests. Falls back to the context's
    /// namespace.
    pub namespace: Option<String>,
}

/// A transport plus the scope it was configured for.
#[derive(Clone)]
pub struct Connection {
    pub client: kube::Client,
    pub namespace: String,
    /// `None` when connected through the in-cluster configuration.
    pub context: Option<String>,
}

impl Connection {
    /// Run live discovery over this connection.
    pub async fn discover(&self) -> crate::Result<Client<kube::Client>> {
        Client::load(self.client.clone()).await
    }
}

/// Build a [`kube::Client`] from the kubeconfig or the in-cluster
/// environment.
///
/// # Errors
/// Returns an error if no usable configuration is found or the named
/// context does not exist.
pub async fn connect(options: &ConnectOptions) -> anyhow::Result<Connection> {
    let config = match &options.context {
        Some(context) => {
            Config::from_kubeconfig(&KubeConfigOptions {
                context: Some(context.clone()),
                ..Default::default()
            })
            .await?
        }
        None => Config::infer().await?,
    };

    let namespace = resolve_namespace(options.namespace.as_deref(), &config.default_namespace);
    let context = match &options.context {
        Some(context) => Some(context.clone()),
        None => Kubeconfig::read().ok().and_then(|kubeconfig| kubeconfig.current_context),
    };
    tracing::debug!(?context, %namespace, cluster_url = %config.cluster_url, "connecting");

    Ok(Connection {
        client: kube::Client::try_from(config)?,
        namespace,
        context,
    })
}

/// Detects the Kubernetes context based on the provided `context` argument.
///
/// Context determination follows this priority:
/// 1. Uses the context if explicitly specified.
/// 2. Retrieves the current context from the kubeconfig file.
///
/// # Errors
/// Returns an error if the kubeconfig file cannot be read or if no current context is set in the kubeconfig.
pub fn determine_context(context: Option<&str>) -> anyhow::Result<String> {
    match context {
        Some(context) => Ok(context.to_string()),
        None => current_context(&Kubeconfig::read()?),
    }
}

fn current_context(kubeconfig: &Kubeconfig) -> anyhow::Result<String> {
    kubeconfig
        .current_context
        .clone()
        .ok_or_else(|| anyhow::anyhow!("current_context is not set"))
}

fn resolve_namespace(explicit: Option<&str>, config_default: &str) -> String {
    match explicit {
        Some(namespace) if !namespace.is_empty() => namespace.to_string(),
        _ if !config_default.is_empty() => config_default.to_string(),
        _ => crate::request::DEFAULT_NAMESPACE.to_string(),
    }
}
