use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use observability_operator::config::{
    LogFormat, OperatorConfig, DEFAULT_NAMESPACE, DEFAULT_REQUEUE_SECONDS,
};
use observability_operator::{controller, telemetry, Error};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version information
    Version,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Namespace the managed workloads are installed into
    #[arg(long, env = "OPERATOR_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Delay between reconciliation passes
    #[arg(long, env = "REQUEUE_SECONDS", default_value_t = DEFAULT_REQUEUE_SECONDS)]
    requeue_seconds: u64,

    /// YAML file replacing the built-in legacy installation list
    #[arg(long, env = "LEGACY_INSTALLS_FILE")]
    legacy_installs: Option<PathBuf>,

    /// Port of the health and metrics endpoints
    #[arg(long, env = "API_PORT", default_value_t = 8080)]
    api_port: u16,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("Observability Operator v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    telemetry::init_tracing(args.log_format)?;

    info!(
        "Starting Observability Operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = OperatorConfig::new(
        &args.namespace,
        args.requeue_seconds,
        args.legacy_installs.as_deref(),
    )?;
    info!(
        "Managing workloads in namespace {} ({} legacy installations checked)",
        config.namespace,
        config.legacy_installations.len()
    );

    // Initialize Kubernetes client
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    info!("Connected to Kubernetes cluster");

    let state = Arc::new(controller::ControllerState::new(client, config)?);

    // Start the REST API server
    #[cfg(feature = "rest-api")]
    {
        let api_state = state.clone();
        let port = args.api_port;
        tokio::spawn(async move {
            if let Err(e) = observability_operator::rest_api::run_server(api_state, port).await {
                tracing::error!("REST API server error: {:?}", e);
            }
        });
    }
    #[cfg(not(feature = "rest-api"))]
    let _ = args.api_port;

    // Run the main controller loop
    let result = controller::run_controller(state).await;

    // Flush any remaining traces
    telemetry::shutdown_telemetry();

    result
}
