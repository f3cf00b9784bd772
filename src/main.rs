//! psp-reconciler - ensure PodSecurityPolicy and RBAC objects for a managed resource

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use kube::Client;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use psp_reconciler::retry::{retry_with_backoff, RetryConfig};
use psp_reconciler::{
    ensure_all, ensure_identity, KubeStore, ManagedResource, MemoryStore, ResourceDescriptor,
};

/// psp-reconciler - keep a resource's PodSecurityPolicy, ServiceAccount and RBAC in place
#[derive(Parser, Debug)]
#[command(name = "psp-reconciler", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile the dependent objects against the current cluster
    ///
    /// Ensures the ServiceAccount first, then the PodSecurityPolicy,
    /// ClusterRole and ClusterRoleBinding. Each pass is retried as a whole.
    Reconcile(ReconcileArgs),

    /// Print the desired objects as YAML without contacting a cluster
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct ReconcileArgs {
    /// Path to the resource descriptor YAML
    #[arg(short = 'f', long = "descriptor", env = "PSP_RECONCILER_DESCRIPTOR")]
    descriptor: PathBuf,

    /// Do not ensure the ServiceAccount
    #[arg(long)]
    skip_identity: bool,

    /// Maximum passes per operation (0 = retry forever)
    #[arg(long, env = "PSP_RECONCILER_MAX_ATTEMPTS", default_value = "5")]
    max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    #[arg(long, env = "PSP_RECONCILER_INITIAL_DELAY_MS", default_value = "200")]
    initial_delay_ms: u64,

    /// Upper bound on the retry delay, in seconds
    #[arg(long, env = "PSP_RECONCILER_MAX_DELAY_SECS", default_value = "30")]
    max_delay_secs: u64,
}

impl ReconcileArgs {
    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
            ..Default::default()
        }
    }
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Path to the resource descriptor YAML
    #[arg(short = 'f', long = "descriptor", env = "PSP_RECONCILER_DESCRIPTOR")]
    descriptor: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reconcile(args) => run_reconcile(args).await,
        Commands::Render(args) => run_render(args).await,
    }
}

async fn load_descriptor(path: &Path) -> anyhow::Result<ResourceDescriptor> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read descriptor {:?}: {}", path, e))?;
    let descriptor: ResourceDescriptor = serde_yaml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse descriptor {:?}: {}", path, e))?;
    if descriptor.name.is_empty() || descriptor.namespace.is_empty() {
        anyhow::bail!("descriptor {:?} must set name and namespace", path);
    }
    Ok(descriptor)
}

/// Reconcile against the cluster from the current kubeconfig or in-cluster config
async fn run_reconcile(args: ReconcileArgs) -> anyhow::Result<()> {
    let descriptor = load_descriptor(&args.descriptor).await?;
    let retry = args.retry_config();

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;
    let store = KubeStore::new(client);

    tracing::info!(
        name = %descriptor.prefixed_name(),
        namespace = %descriptor.namespace(),
        psp = %descriptor.psp_name(),
        owns_psp = descriptor.owns_psp(),
        "Reconciling dependent objects"
    );

    if !args.skip_identity {
        retry_with_backoff(&retry, "ensure_identity", || {
            ensure_identity(&descriptor, &store)
        })
        .await?;
    }
    retry_with_backoff(&retry, "ensure_all", || ensure_all(&descriptor, &store)).await?;

    tracing::info!(name = %descriptor.prefixed_name(), "Dependent objects reconciled");
    Ok(())
}

/// Reconcile into an empty in-memory store and print what it holds
async fn run_render(args: RenderArgs) -> anyhow::Result<()> {
    let descriptor = load_descriptor(&args.descriptor).await?;
    let store = MemoryStore::new();

    ensure_identity(&descriptor, &store).await?;
    ensure_all(&descriptor, &store).await?;

    for object in store.objects() {
        let yaml = serde_yaml::to_string(&object)
            .map_err(|e| anyhow::anyhow!("Failed to serialize object: {}", e))?;
        println!("---\n{}", yaml.trim_end());
    }
    Ok(())
}
