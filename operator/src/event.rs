use kube::Resource;
use kube::runtime::events::{Event, EventType};
use kube_runtime::events::{Recorder, Reporter};

use crate::error::Error;

/// Outcome of a handler, published as a Kubernetes Event on the MySql object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Provisioned,
    ProvisionFailed,
    Deprovisioned,
    DeprovisionFailed,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Provisioned => "Provisioned",
            Reason::ProvisionFailed => "ProvisionFailed",
            Reason::Deprovisioned => "Deprovisioned",
            Reason::DeprovisionFailed => "DeprovisionFailed",
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Reason::Provisioned | Reason::ProvisionFailed => "Provision",
            Reason::Deprovisioned | Reason::DeprovisionFailed => "Deprovision",
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Reason::Provisioned | Reason::Deprovisioned => EventType::Normal,
            Reason::ProvisionFailed | Reason::DeprovisionFailed => EventType::Warning,
        }
    }
}

/// `POD_NAME` (downward API) identifies the instance when running in-cluster.
pub fn make_reporter(controller: &str) -> Reporter {
    Reporter {
        controller: controller.into(),
        instance: std::env::var("POD_NAME").ok(),
    }
}

pub async fn emit_event<K>(
    recorder: &Recorder,
    obj: &K,
    reason: Reason,
    note: &str,
) -> Result<(), Error>
where
    K: Resource<DynamicType = ()> + std::fmt::Debug,
{
    recorder
        .publish(
            &Event {
                type_: reason.event_type(),
                reason: reason.as_str().into(),
                note: Some(note.into()),
                action: reason.action().into(),
                secondary: None,
            },
            &obj.object_ref(&()),
        )
        .await?;

    Ok(())
}
