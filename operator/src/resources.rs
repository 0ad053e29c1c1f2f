//! Builders for the objects backing a MySql resource.
//!
//! Every object carries the `app=mysql` label, which is also how they are
//! found again at teardown. Names are derived from the MySql name only.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy},
        core::v1::{
            Container, ContainerPort, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec,
            PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Service, ServicePort,
            ServiceSpec, Volume, VolumeMount, VolumeResourceRequirements,
        },
    },
    apimachinery::pkg::{
        api::resource::Quantity, apis::meta::v1::LabelSelector, util::intstr::IntOrString,
    },
};
use kube::api::ObjectMeta;

use crate::{config::ServiceType, crd::MySqlSpec};

pub const APP_LABEL: &str = "app";
pub const APP_NAME: &str = "mysql";
pub const MYSQL_PORT: i32 = 3306;
pub const CONTAINER_NAME: &str = "mysql-ctr";
pub const VOLUME_NAME: &str = "mysql-persistent-storage";
pub const DATA_DIR: &str = "/var/lib/mysql";
pub const STORAGE_REQUEST: &str = "20Gi";
pub const ROOT_PASSWORD_ENV: &str = "MYSQL_ROOT_PASSWORD";

pub fn app_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), APP_NAME.to_string())])
}

/// Label selector matching everything the operator created.
pub fn app_selector() -> String {
    format!("{APP_LABEL}={APP_NAME}")
}

pub fn pvc_name(name: &str) -> String {
    format!("{name}-pv-claim")
}

fn labelled_meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: Some(app_labels()),
        ..Default::default()
    }
}

pub fn service(name: &str, service_type: ServiceType) -> Service {
    let (type_, cluster_ip) = match service_type {
        ServiceType::Headless => (None, Some("None".to_string())),
        ServiceType::NodePort => (Some("NodePort".to_string()), None),
    };

    Service {
        metadata: labelled_meta(name),
        spec: Some(ServiceSpec {
            selector: Some(app_labels()),
            ports: Some(vec![ServicePort {
                port: MYSQL_PORT,
                target_port: Some(IntOrString::Int(MYSQL_PORT)),
                ..Default::default()
            }]),
            type_,
            cluster_ip,
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn persistent_volume_claim(name: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: labelled_meta(&pvc_name(name)),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".into()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(STORAGE_REQUEST.into()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Pod template running the server with its data directory on the claim.
pub fn pod_template(name: &str, spec: &MySqlSpec) -> PodTemplateSpec {
    let container = Container {
        name: CONTAINER_NAME.into(),
        image: Some(spec.image.clone()),
        env: Some(vec![EnvVar {
            name: ROOT_PASSWORD_ENV.into(),
            value: Some(spec.root_password.clone()),
            ..Default::default()
        }]),
        ports: Some(vec![ContainerPort {
            container_port: MYSQL_PORT,
            ..Default::default()
        }]),
        volume_mounts: Some(vec![VolumeMount {
            name: VOLUME_NAME.into(),
            mount_path: DATA_DIR.into(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    PodTemplateSpec {
        metadata: Some(labelled_meta(name)),
        spec: Some(PodSpec {
            containers: vec![container],
            volumes: Some(vec![Volume {
                name: VOLUME_NAME.into(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: pvc_name(name),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

/// Single replica; `Recreate` so the old pod releases the RWO claim first.
pub fn deployment(name: &str, spec: &MySqlSpec) -> Deployment {
    Deployment {
        metadata: labelled_meta(name),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(app_labels()),
                ..Default::default()
            },
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".into()),
                ..Default::default()
            }),
            template: pod_template(name, spec),
            ..Default::default()
        }),
        ..Default::default()
    }
}
