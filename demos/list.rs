use clap::Parser;
use kubeclient::{
    Client, ConnectOptions, connect,
    retry::{RequestRetryExt, RetryPolicy},
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "kubeclient-list", about = "List any discovered kind")]
struct Cli {
    /// Kind, plural name or short name, e.g. `Deployment`, `pods`, `svc`.
    #[arg(long)]
    kind: String,

    #[arg(long)]
    context: Option<String>,

    #[arg(short, long)]
    namespace: Option<String>,

    #[arg(short = 'A', long)]
    all_namespaces: bool,

    /// Label selector clause, may be repeated.
    #[arg(short = 'l', long = "selector")]
    selectors: Vec<String>,

    /// Page size.
    #[arg(long, default_value_t = 100)]
    limit: u32,

    /// Also register the cluster's custom resource definitions.
    #[arg(long)]
    custom_resources: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let connection = connect(&ConnectOptions {
        context: cli.context.clone(),
        namespace: cli.namespace.clone(),
    })
    .await?;
    println!(
        "context={} namespace={}",
        connection.context.as_deref().unwrap_or("in-cluster"),
        connection.namespace
    );

    let mut client = Client::load(connection.client.clone()).await?;
    if cli.custom_resources {
        client = client.load_custom_resources().await?;
    }

    let mut request = client.resource(&cli.kind)?.limit(cli.limit);
    request = if cli.all_namespaces {
        request.all_namespaces()
    } else {
        request.namespace(&connection.namespace)
    };
    for selector in &cli.selectors {
        request = request.label_selector(selector.as_str())?;
    }

    let list = request.paginate_with_retry(RetryPolicy::default()).await?;
    for item in &list.items {
        println!(
            "{}/{}",
            item.metadata.namespace.as_deref().unwrap_or("-"),
            item.metadata.name.as_deref().unwrap_or_default()
        );
    }
    println!("{} {} item(s)", list.items.len(), request.kind());

    Ok(())
}
