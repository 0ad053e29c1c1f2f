use clap::Parser;
use kube::{Api, Client, runtime::watcher};
use mysql_operator::{
    MySql,
    cluster::KubeCluster,
    config::{Cli, Command, RunArgs},
    controller::MySqlController,
    crd, event, telemetry, watch,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Crd => {
            print!("{}", crd::manifest()?);
            Ok(())
        }
        Command::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    telemetry::init(args.log_format);

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes");

    let api: Api<MySql> = match &args.namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };
    let cluster = KubeCluster::new(client, event::make_reporter(&args.reporter));
    let controller = MySqlController::new(cluster, args.service_type);

    info!(
        namespace = args.namespace.as_deref().unwrap_or("<all>"),
        service_type = ?args.service_type,
        "Starting watch on the mysql resource"
    );
    watch::start_watch(api, watcher::Config::default(), &controller, shutdown_signal()).await;

    info!("controller terminated");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
