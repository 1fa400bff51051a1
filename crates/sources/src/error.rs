use thiserror::Error;

/// Errors raised while producing recommendations.
///
/// Missing similarity data or an empty history is never an error; those
/// paths yield empty candidate lists.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecommendError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("No clusters available for cold-start resolution")]
    NoClustersAvailable,

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Per-candidate failure while building rerank inputs. The candidate is
    /// dropped and the batch continues.
    #[error("Cannot assemble features for {entity}: {reason}")]
    FeatureAssemblyError { entity: String, reason: String },
}

impl RecommendError {
    pub fn user_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: "user",
            id: id.to_string(),
        }
    }
}

/// Result alias for the recommendation pipeline
pub type Result<T> = std::result::Result<T, RecommendError>;

/// Reject a zero-sized limit
pub fn require_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(RecommendError::InvalidArgument(format!(
            "{name} must be greater than zero"
        )));
    }
    Ok(())
}
