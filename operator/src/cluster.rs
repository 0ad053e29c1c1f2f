//! The slice of the Kubernetes API the controller calls into.

use async_trait::async_trait;
use k8s_openapi::api::{
    apps::v1::{Deployment, ReplicaSet},
    core::v1::{PersistentVolumeClaim, Pod, Service},
};
use kube::{
    Api, Client,
    api::{DeleteParams, ListParams, PostParams},
};
use kube_runtime::events::{Recorder, Reporter};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::{
    crd::MySql,
    error::Result,
    event::{Reason, emit_event},
};

/// Create/delete operations used by the MySql handlers.
///
/// Collection deletes take a label selector such as `app=mysql`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<()>;

    async fn create_persistent_volume_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> Result<()>;

    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<()>;

    async fn delete_deployments(&self, namespace: &str, selector: &str) -> Result<()>;

    async fn delete_replica_sets(&self, namespace: &str, selector: &str) -> Result<()>;

    async fn delete_pods(&self, namespace: &str, selector: &str) -> Result<()>;

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()>;

    async fn delete_persistent_volume_claim(&self, namespace: &str, name: &str) -> Result<()>;

    /// Record a Kubernetes Event against the MySql object.
    async fn publish_event(&self, mysql: &MySql, reason: Reason, note: &str) -> Result<()>;
}

/// [`ClusterApi`] backed by a live API server connection.
pub struct KubeCluster {
    client: Client,
    recorder: Recorder,
}

impl KubeCluster {
    pub fn new(client: Client, reporter: Reporter) -> Self {
        Self {
            recorder: Recorder::new(client.clone(), reporter),
            client,
        }
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), service).await?;
        debug!(namespace, name = ?service.metadata.name, "created Service");
        Ok(())
    }

    async fn create_persistent_volume_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> Result<()> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), claim).await?;
        debug!(namespace, name = ?claim.metadata.name, "created PersistentVolumeClaim");
        Ok(())
    }

    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), deployment).await?;
        debug!(namespace, name = ?deployment.metadata.name, "created Deployment");
        Ok(())
    }

    async fn delete_deployments(&self, namespace: &str, selector: &str) -> Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.delete_collection(&DeleteParams::default(), &ListParams::default().labels(selector))
            .await?;
        Ok(())
    }

    async fn delete_replica_sets(&self, namespace: &str, selector: &str) -> Result<()> {
        let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        api.delete_collection(&DeleteParams::default(), &ListParams::default().labels(selector))
            .await?;
        Ok(())
    }

    async fn delete_pods(&self, namespace: &str, selector: &str) -> Result<()> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.delete_collection(&DeleteParams::default(), &ListParams::default().labels(selector))
            .await?;
        Ok(())
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn delete_persistent_volume_claim(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn publish_event(&self, mysql: &MySql, reason: Reason, note: &str) -> Result<()> {
        emit_event(&self.recorder, mysql, reason, note).await
    }
}
