use std::sync::Arc;

use clap::{CommandFactory, Parser};
use kubeclient::{Client, ConnectOptions, ResourceRegistry, connect, determine_context};

#[derive(Debug, Parser)]
#[command(
    name = "kubeclient-complete",
    about = "Showcase dynamic context and kind completion support"
)]
struct Cli {
    #[arg(long, add = kubeclient::context_value_completer())]
    /// Please type the context name you want to target.
    context: Option<String>,

    #[arg(long)]
    /// Please type the kind you want to target.
    kind: Option<String>,
}

async fn load_registry() -> ResourceRegistry {
    let client = match connect(&ConnectOptions::default()).await {
        Ok(connection) => Client::load(connection.client).await.ok(),
        Err(_) => None,
    };
    client
        .map(|client| client.resources().clone())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let registry = Arc::new(load_registry().await);

    let completion_registry = Arc::clone(&registry);
    kubeclient::clap_complete::CompleteEnv::with_factory(move || {
        Cli::command().mut_arg("kind", |arg| {
            arg.add(kubeclient::kind_value_completer(Arc::clone(&completion_registry)))
        })
    })
    .complete();

    let cli = Cli::parse();
    let context = determine_context(cli.context.as_deref())?;
    println!("Using context: {context}");
    if let Some(kind) = cli.kind {
        match registry.resolve(&kind) {
            Some(descriptor) => println!(
                "{} served by {}/{}",
                descriptor.kind,
                descriptor.preferred_group,
                descriptor.preferred_version().unwrap_or_default()
            ),
            None => println!("{kind} is not known to the cluster"),
        }
    }
    Ok(())
}
