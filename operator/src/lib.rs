//! Kubernetes operator for `MySql` custom resources.
//!
//! Each `MySql` object gets a Service, a PersistentVolumeClaim and a
//! single-replica Deployment when it is added; they are torn down again when
//! it is deleted.

pub mod cluster;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod event;
pub mod resources;
pub mod telemetry;
pub mod watch;

pub use crd::{MySql, MySqlSpec};
pub use error::Error;
