use kube::Error as KubeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] KubeError),

    #[error("MySql resource is missing {0}")]
    MissingObjectKey(&'static str),

    #[error("failed to render CRD manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// The API server rejected a create because the object is already there.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Error::Kube(KubeError::Api(resp)) if resp.code == 409 && resp.reason == "AlreadyExists"
        )
    }
}

#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> Error {
    Error::Kube(KubeError::Api(kube::core::ErrorResponse {
        status: "Failure".into(),
        message: format!("{reason} ({code})"),
        reason: reason.into(),
        code,
    }))
}
