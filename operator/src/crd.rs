use kube::CustomResourceExt;
use kube_derive::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Desired state of a single-instance MySQL server.
///
/// The controller only reads this spec; it never writes back a status.
#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "myproject.io",
    version = "v1alpha1",
    kind = "MySql",
    plural = "mysqls",
    singular = "mysql",
    derive = "Default",
    derive = "PartialEq",
    namespaced
)]
pub struct MySqlSpec {
    /// Container image running the server, e.g. `mysql:5.6`.
    pub image: String,
    /// Injected into the container as `MYSQL_ROOT_PASSWORD`.
    pub root_password: String,
}

/// Renders the CRD manifest as YAML.
pub fn manifest() -> Result<String, Error> {
    Ok(serde_yaml::to_string(&MySql::crd())?)
}
