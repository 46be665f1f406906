//! Error types for the harness

use artisan_artifact::ArtifactId;

/// Failures of the harness collaborators
///
/// None of these ever reach an artifact's displayed state; they are logged
/// and dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    /// The reporting sink rejected a result
    #[error("reporting sink failed: {0}")]
    Sink(String),

    /// The result store could not persist a value
    #[error("result store failed: {0}")]
    Store(String),
}

/// Runtime registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Another instance is registered under the same id
    #[error("artifact {0} is already registered")]
    AlreadyRegistered(ArtifactId),

    /// No instance is registered under the id
    #[error("artifact {0} is not registered")]
    NotFound(ArtifactId),
}

impl RegistryError {
    /// Artifact the error is about
    #[inline]
    #[must_use]
    pub fn artifact_id(&self) -> ArtifactId {
        match self {
            RegistryError::AlreadyRegistered(id) | RegistryError::NotFound(id) => *id,
        }
    }
}
