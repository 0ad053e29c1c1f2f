//! Command line and environment configuration.

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "mysql-operator", version)]
#[command(about = "Provisions a single-instance MySQL server for every MySql resource")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the MySql CRD manifest to stdout
    Crd,
    /// Watch MySql resources and provision or tear down their objects
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Namespace to watch; all namespaces when unset
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// How the MySQL Service is exposed
    #[arg(long, env = "MYSQL_SERVICE_TYPE", value_enum, default_value_t = ServiceType::Headless)]
    pub service_type: ServiceType,

    /// Controller name reported on Kubernetes Events
    #[arg(long, env = "REPORTER_NAME", default_value = "mysql-operator")]
    pub reporter: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceType {
    /// ClusterIP service with `clusterIP: None`
    #[default]
    Headless,
    /// Service reachable on every node's port
    NodePort,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
