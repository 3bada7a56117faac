use thiserror::Error;

/// Failure kinds surfaced by every public hub operation.
#[derive(Error, Debug)]
pub enum HubError {
    /// Malformed or incomplete input. Nothing was mutated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation referenced a device that is not registered.
    #[error("Device not found: {0}")]
    NotFound(String),

    /// The reading log append failed after the in-memory merge.
    ///
    /// `rolled_back` tells the caller whether the device's live values were
    /// restored or still carry the new reading.
    #[error("Failed to append reading log for {device} (rolled back: {rolled_back}): {source}")]
    Persistence {
        device: String,
        rolled_back: bool,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, HubError>;

impl HubError {
    pub fn validation(msg: impl Into<String>) -> Self {
        HubError::Validation(msg.into())
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        HubError::NotFound(name.into())
    }

    /// Short machine-readable name of the kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            HubError::Validation(_) => "validation",
            HubError::NotFound(_) => "not_found",
            HubError::Persistence { .. } => "persistence",
            HubError::Unknown(_) => "unknown",
        }
    }
}
