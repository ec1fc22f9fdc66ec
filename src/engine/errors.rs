use thiserror::Error;

/// Failure taxonomy for the engine. Every async boundary converts its
/// failures into exactly one of these and reports it through the host
/// `on_error` callback; nothing propagates into the frame loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// Model or terrain fetch/parse failure. The placeholder instance is
    /// removed and the operation is not retried.
    #[error("failed to load {path}: {reason}")]
    LoadFailure { path: String, reason: String },

    /// Backend call failure. The visual mutation already happened and is
    /// left in place; the stored layout may now lag the scene.
    #[error("persistence request failed: {0}")]
    PersistenceFailure(String),

    /// User-initiated abort of an in-flight generation request. Reported
    /// distinctly so the host can avoid rendering it as a hard error.
    #[error("generation request cancelled")]
    Cancelled,

    /// The render surface could not be created. Fatal for the session,
    /// reported once.
    #[error("scene initialization failed: {0}")]
    InitializationFailure(String),
}

impl SceneError {
    /// Cancellations are surfaced to the host but are not hard errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SceneError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_distinguishable() {
        assert!(SceneError::Cancelled.is_cancellation());
        assert!(!SceneError::PersistenceFailure("timeout".into()).is_cancellation());
    }

    #[test]
    fn load_failure_names_the_path() {
        let err = SceneError::LoadFailure {
            path: "models/barrel.glb".into(),
            reason: "404".into(),
        };
        assert!(err.to_string().contains("models/barrel.glb"));
    }
}
