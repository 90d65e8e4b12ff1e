use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use platform_api::config::PlatformConfig;
use platform_api::import::{TerraformOutput, import_terraform};
use platform_api::k8s::KubeCluster;
use platform_api::provision::{ProvisionRequest, Provisioner};
use platform_api::resources::{
    ResourceSettings, Resources, validate_application_id, validate_environment_name,
};
use platform_api::server::{AppState, create_router};
use platform_api::store::{DocumentStore, GitStore};
use platform_api::types::{Application, Environment, Tenant};

#[derive(Parser)]
#[command(name = "platform-api")]
#[command(about = "Provisions applications on a multi-tenant Kubernetes platform", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short, env = "PLATFORM_API_CONFIG", default_value = "platform.toml")]
    config: PathBuf,

    /// Local working tree of the document store
    #[arg(long, env = "PLATFORM_API_GIT_DIRECTORY")]
    git_directory: Option<PathBuf>,

    /// Only read and write files; never pull, commit or push
    #[arg(long)]
    directory_only: bool,

    /// Platform environment this control plane serves (dev or prod)
    #[arg(long, env = "PLATFORM_API_ENVIRONMENT")]
    platform_environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Provision an application and its environments once
    Provision(ApplicationArgs),

    /// Print the Kubernetes objects an application would get, as YAML
    Render(ApplicationArgs),

    /// Import `terraform output -json` into tenant and application documents
    ImportTerraform {
        /// File holding the Terraform output
        #[arg(long)]
        file: PathBuf,
    },

    /// Fast-forward the document store from its remote
    Pull,
}

#[derive(Args)]
struct ApplicationArgs {
    #[arg(long)]
    tenant_id: String,

    #[arg(long)]
    tenant_name: String,

    #[arg(long)]
    application_id: String,

    #[arg(long)]
    application_name: String,

    /// Environment name; repeat for several
    #[arg(long = "environment", required = true)]
    environments: Vec<String>,
}

impl ApplicationArgs {
    fn tenant(&self) -> Tenant {
        Tenant {
            id: self.tenant_id.clone(),
            name: self.tenant_name.clone(),
        }
    }

    fn into_request(self) -> ProvisionRequest {
        ProvisionRequest {
            tenant: self.tenant(),
            application_id: self.application_id,
            application_name: self.application_name,
            environments: self.environments,
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<PlatformConfig> {
    let mut config = PlatformConfig::load(&cli.config)?;
    if let Some(directory) = &cli.git_directory {
        config.git.directory = directory.clone();
    }
    if cli.directory_only {
        config.git.directory_only = true;
    }
    if let Some(environment) = &cli.platform_environment {
        config.platform.platform_environment = environment.clone();
    }
    config.platform.validate()?;
    Ok(config)
}

fn render(config: &PlatformConfig, args: &ApplicationArgs) -> anyhow::Result<String> {
    validate_application_id(&args.application_id)?;
    for name in &args.environments {
        validate_environment_name(name)?;
    }

    let tenant = args.tenant();
    let mut application = Application::new(&tenant, &args.application_id, &args.application_name);
    for name in &args.environments {
        application.upsert_environment(Environment::new(name));
    }

    let resources = Resources::new(
        &tenant,
        &application,
        &ResourceSettings {
            azure_group_id: &config.platform.azure_group_id,
            acr: &config.platform.acr,
            storage: &config.platform.storage,
            mongo: &config.mongo,
            local_dev_user: config.platform.local_dev_user.as_deref(),
        },
    );
    Ok(serde_yaml::to_string(&resources)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("platform_api=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let store: Arc<dyn DocumentStore> = Arc::new(GitStore::open(config.git.clone())?);
            let cluster = Arc::new(KubeCluster::try_default().await?);
            let provisioner =
                Provisioner::new(cluster.clone(), store.clone(), config.platform, config.mongo);

            let state = Arc::new(AppState::new(store, cluster, provisioner));
            let app = create_router(state);
            let addr = config.server.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
        Commands::Provision(args) => {
            let request = args.into_request();
            request.validate()?;

            let store: Arc<dyn DocumentStore> = Arc::new(GitStore::open(config.git.clone())?);
            let cluster = Arc::new(KubeCluster::try_default().await?);
            let provisioner = Provisioner::new(cluster, store, config.platform, config.mongo);

            let application = provisioner.provision_application(request).await?;
            println!("{}", serde_json::to_string_pretty(&application)?);
        }
        Commands::Render(args) => {
            print!("{}", render(&config, &args)?);
        }
        Commands::ImportTerraform { file } => {
            let output = TerraformOutput::from_json(&fs::read_to_string(&file)?)?;
            let store = GitStore::open(config.git.clone())?;

            let summary = import_terraform(&store, &output, &config.platform.platform_environment)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Pull => {
            let store = GitStore::open(config.git.clone())?;
            store.pull()?;
            info!("Pulled {}", store.directory().display());
        }
    }

    Ok(())
}
