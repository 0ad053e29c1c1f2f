//! Add/update/delete handlers for MySql resources.
//!
//! Adding a MySql creates its Service, PersistentVolumeClaim and Deployment in
//! that order, stopping at the first failure other than "already exists".
//! Deleting it removes everything labelled `app=mysql` plus the named Service
//! and claim, logging failures and carrying on. Updates change nothing.

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{error, info, instrument, warn};

use crate::{
    cluster::ClusterApi,
    config::ServiceType,
    crd::MySql,
    error::{Error, Result},
    event::Reason,
    resources,
    watch::ResourceEventHandler,
};

pub struct MySqlController<C> {
    cluster: C,
    service_type: ServiceType,
}

impl<C: ClusterApi> MySqlController<C> {
    pub fn new(cluster: C, service_type: ServiceType) -> Self {
        Self {
            cluster,
            service_type,
        }
    }

    /// Creates the Service, claim and Deployment for `mysql`.
    #[instrument(skip_all, fields(name = %mysql.name_any(), namespace = %namespace_of(mysql)))]
    pub async fn provision(&self, mysql: &MySql) -> Result<()> {
        let name = mysql
            .metadata
            .name
            .as_deref()
            .ok_or(Error::MissingObjectKey(".metadata.name"))?;
        let ns = namespace_of(mysql);

        info!("Making svc");
        tolerate_existing(
            "Service",
            self.cluster
                .create_service(&ns, &resources::service(name, self.service_type))
                .await,
        )?;

        info!("Making pvc");
        tolerate_existing(
            "PersistentVolumeClaim",
            self.cluster
                .create_persistent_volume_claim(&ns, &resources::persistent_volume_claim(name))
                .await,
        )?;

        info!("Making deployment");
        tolerate_existing(
            "Deployment",
            self.cluster
                .create_deployment(&ns, &resources::deployment(name, &mysql.spec))
                .await,
        )?;

        Ok(())
    }

    /// Deletes everything created for `mysql`. Returns how many deletions failed.
    #[instrument(skip_all, fields(name = %mysql.name_any(), namespace = %namespace_of(mysql)))]
    pub async fn deprovision(&self, mysql: &MySql) -> usize {
        let name = mysql.name_any();
        let ns = namespace_of(mysql);
        let selector = resources::app_selector();
        let pvc_name = resources::pvc_name(&name);

        let results = [
            (
                "deployments",
                self.cluster.delete_deployments(&ns, &selector).await,
            ),
            ("service", self.cluster.delete_service(&ns, &name).await),
            (
                "replica sets",
                self.cluster.delete_replica_sets(&ns, &selector).await,
            ),
            (
                "pvc",
                self.cluster
                    .delete_persistent_volume_claim(&ns, &pvc_name)
                    .await,
            ),
            ("pods", self.cluster.delete_pods(&ns, &selector).await),
        ];

        let mut failed = 0;
        for (what, res) in results {
            if let Err(error) = res {
                failed += 1;
                warn!(%error, "failed to delete {what}");
            }
        }
        failed
    }

    async fn report(&self, mysql: &MySql, reason: Reason, note: &str) {
        if let Err(error) = self.cluster.publish_event(mysql, reason, note).await {
            warn!(%error, reason = reason.as_str(), "failed to publish event");
        }
    }
}

#[async_trait]
impl<C: ClusterApi> ResourceEventHandler<MySql> for MySqlController<C> {
    async fn on_add(&self, mysql: &MySql) {
        info!(name = %mysql.name_any(), "Handling MySql add");
        match self.provision(mysql).await {
            Ok(()) => {
                self.report(
                    mysql,
                    Reason::Provisioned,
                    "Created Service, PersistentVolumeClaim and Deployment",
                )
                .await
            }
            Err(e) => {
                error!(error = %e, name = %mysql.name_any(), "failed to provision MySql");
                self.report(mysql, Reason::ProvisionFailed, &e.to_string())
                    .await
            }
        }
    }

    async fn on_update(&self, _old: &MySql, new: &MySql) {
        // Nothing in the spec can change without disrupting the running server.
        info!(name = %new.name_any(), "Handling MySql update");
    }

    async fn on_delete(&self, mysql: &MySql) {
        info!(name = %mysql.name_any(), "Handling MySql delete");
        match self.deprovision(mysql).await {
            0 => {
                self.report(mysql, Reason::Deprovisioned, "Deleted MySql objects")
                    .await
            }
            failed => {
                self.report(
                    mysql,
                    Reason::DeprovisionFailed,
                    &format!("{failed} deletions failed"),
                )
                .await
            }
        }
    }
}

fn namespace_of(mysql: &MySql) -> String {
    mysql.namespace().unwrap_or_else(|| "default".into())
}

fn tolerate_existing(kind: &str, res: Result<()>) -> Result<()> {
    match res {
        Err(e) if e.is_already_exists() => {
            info!(kind, "already exists, continuing");
            Ok(())
        }
        res => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cluster::MockClusterApi, crd::MySqlSpec, error::api_error};
    use mockall::{Sequence, predicate::eq};

    fn mysql(name: &str) -> MySql {
        let mut mysql = MySql::new(
            name,
            MySqlSpec {
                image: "mysql:5.6".into(),
                root_password: "hunter2".into(),
            },
        );
        mysql.metadata.namespace = Some("db".into());
        mysql
    }

    fn expect_creates(cluster: &mut MockClusterApi, seq: &mut Sequence) {
        cluster
            .expect_create_service()
            .withf(|ns, svc| ns == "db" && svc.metadata.name.as_deref() == Some("foo"))
            .times(1)
            .in_sequence(seq)
            .returning(|_, _| Ok(()));
        cluster
            .expect_create_persistent_volume_claim()
            .withf(|ns, pvc| ns == "db" && pvc.metadata.name.as_deref() == Some("foo-pv-claim"))
            .times(1)
            .in_sequence(seq)
            .returning(|_, _| Ok(()));
        cluster
            .expect_create_deployment()
            .withf(|ns, deploy| {
                let image = deploy
                    .spec
                    .as_ref()
                    .and_then(|s| s.template.spec.as_ref())
                    .and_then(|p| p.containers[0].image.as_deref());
                ns == "db" && deploy.metadata.name.as_deref() == Some("foo")
                    && image == Some("mysql:5.6")
            })
            .times(1)
            .in_sequence(seq)
            .returning(|_, _| Ok(()));
    }

    #[tokio::test]
    async fn add_creates_one_service_claim_and_deployment_in_order() {
        let mut cluster = MockClusterApi::new();
        let mut seq = Sequence::new();
        expect_creates(&mut cluster, &mut seq);
        cluster
            .expect_publish_event()
            .withf(|m, reason, _| m.name_any() == "foo" && *reason == Reason::Provisioned)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let controller = MySqlController::new(cluster, ServiceType::Headless);
        controller.on_add(&mysql("foo")).await;
    }

    #[tokio::test]
    async fn add_uses_configured_service_type() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_create_service()
            .withf(|_, svc| {
                svc.spec.as_ref().and_then(|s| s.type_.as_deref()) == Some("NodePort")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        cluster
            .expect_create_persistent_volume_claim()
            .times(1)
            .returning(|_, _| Ok(()));
        cluster
            .expect_create_deployment()
            .times(1)
            .returning(|_, _| Ok(()));

        let controller = MySqlController::new(cluster, ServiceType::NodePort);
        controller.provision(&mysql("foo")).await.unwrap();
    }

    #[tokio::test]
    async fn add_stops_at_first_failure() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_create_service()
            .times(1)
            .returning(|_, _| Ok(()));
        cluster
            .expect_create_persistent_volume_claim()
            .times(1)
            .returning(|_, _| Err(api_error(403, "Forbidden")));
        cluster.expect_create_deployment().never();
        cluster
            .expect_publish_event()
            .withf(|_, reason, note| *reason == Reason::ProvisionFailed && note.contains("Forbidden"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let controller = MySqlController::new(cluster, ServiceType::Headless);
        controller.on_add(&mysql("foo")).await;
    }

    #[tokio::test]
    async fn add_propagates_the_failing_step_error() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_create_service()
            .times(1)
            .returning(|_, _| Err(api_error(500, "InternalError")));
        cluster.expect_create_persistent_volume_claim().never();
        cluster.expect_create_deployment().never();

        let controller = MySqlController::new(cluster, ServiceType::Headless);
        let err = controller.provision(&mysql("foo")).await.unwrap_err();
        assert!(!err.is_already_exists());
    }

    #[tokio::test]
    async fn add_tolerates_existing_objects() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_create_service()
            .times(1)
            .returning(|_, _| Err(api_error(409, "AlreadyExists")));
        cluster
            .expect_create_persistent_volume_claim()
            .times(1)
            .returning(|_, _| Err(api_error(409, "AlreadyExists")));
        cluster
            .expect_create_deployment()
            .times(1)
            .returning(|_, _| Ok(()));

        let controller = MySqlController::new(cluster, ServiceType::Headless);
        controller.provision(&mysql("foo")).await.unwrap();
    }

    #[tokio::test]
    async fn add_without_name_touches_nothing() {
        let cluster = MockClusterApi::new();
        let controller = MySqlController::new(cluster, ServiceType::Headless);

        let err = controller.provision(&MySql::default()).await.unwrap_err();
        assert!(matches!(err, Error::MissingObjectKey(_)));
    }

    #[tokio::test]
    async fn add_survives_event_publish_failure() {
        let mut cluster = MockClusterApi::new();
        let mut seq = Sequence::new();
        expect_creates(&mut cluster, &mut seq);
        cluster
            .expect_publish_event()
            .times(1)
            .returning(|_, _, _| Err(api_error(403, "Forbidden")));

        let controller = MySqlController::new(cluster, ServiceType::Headless);
        controller.on_add(&mysql("foo")).await;
    }

    #[tokio::test]
    async fn update_does_not_touch_the_cluster() {
        // No expectations: any call on the mock panics.
        let cluster = MockClusterApi::new();
        let controller = MySqlController::new(cluster, ServiceType::Headless);

        let old = mysql("foo");
        let mut new = mysql("foo");
        new.spec.image = "mysql:8.0".into();
        controller.on_update(&old, &new).await;
    }

    fn expect_deletes(cluster: &mut MockClusterApi, seq: &mut Sequence, fail_deployments: bool) {
        cluster
            .expect_delete_deployments()
            .with(eq("db"), eq("app=mysql"))
            .times(1)
            .in_sequence(seq)
            .returning(move |_, _| {
                if fail_deployments {
                    Err(api_error(500, "InternalError"))
                } else {
                    Ok(())
                }
            });
        cluster
            .expect_delete_service()
            .with(eq("db"), eq("foo"))
            .times(1)
            .in_sequence(seq)
            .returning(|_, _| Ok(()));
        cluster
            .expect_delete_replica_sets()
            .with(eq("db"), eq("app=mysql"))
            .times(1)
            .in_sequence(seq)
            .returning(|_, _| Ok(()));
        cluster
            .expect_delete_persistent_volume_claim()
            .with(eq("db"), eq("foo-pv-claim"))
            .times(1)
            .in_sequence(seq)
            .returning(|_, _| Ok(()));
        cluster
            .expect_delete_pods()
            .with(eq("db"), eq("app=mysql"))
            .times(1)
            .in_sequence(seq)
            .returning(|_, _| Ok(()));
    }

    #[tokio::test]
    async fn delete_removes_labelled_objects_service_and_claim() {
        let mut cluster = MockClusterApi::new();
        let mut seq = Sequence::new();
        expect_deletes(&mut cluster, &mut seq, false);
        cluster
            .expect_publish_event()
            .withf(|_, reason, _| *reason == Reason::Deprovisioned)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let controller = MySqlController::new(cluster, ServiceType::Headless);
        controller.on_delete(&mysql("foo")).await;
    }

    #[tokio::test]
    async fn delete_continues_past_failures() {
        let mut cluster = MockClusterApi::new();
        let mut seq = Sequence::new();
        expect_deletes(&mut cluster, &mut seq, true);
        cluster
            .expect_publish_event()
            .withf(|_, reason, note| {
                *reason == Reason::DeprovisionFailed && note == "1 deletions failed"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let controller = MySqlController::new(cluster, ServiceType::Headless);
        controller.on_delete(&mysql("foo")).await;
    }

    #[tokio::test]
    async fn deprovision_counts_every_failed_deletion() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_delete_deployments()
            .returning(|_, _| Err(api_error(500, "InternalError")));
        cluster
            .expect_delete_service()
            .returning(|_, _| Err(api_error(404, "NotFound")));
        cluster
            .expect_delete_replica_sets()
            .returning(|_, _| Ok(()));
        cluster
            .expect_delete_persistent_volume_claim()
            .returning(|_, _| Err(api_error(404, "NotFound")));
        cluster.expect_delete_pods().returning(|_, _| Ok(()));

        let controller = MySqlController::new(cluster, ServiceType::Headless);
        assert_eq!(controller.deprovision(&mysql("foo")).await, 3);
    }

    #[test]
    fn tolerate_existing_swallows_only_already_exists() {
        assert!(tolerate_existing("Service", Err(api_error(409, "AlreadyExists"))).is_ok());
        assert!(tolerate_existing("Service", Ok(())).is_ok());

        let err = tolerate_existing("Service", Err(api_error(403, "Forbidden"))).unwrap_err();
        assert!(err.to_string().contains("Forbidden"));
    }

    #[test]
    fn objects_default_to_the_default_namespace() {
        let mut m = mysql("foo");
        m.metadata.namespace = None;
        assert_eq!(namespace_of(&m), "default");
    }
}
