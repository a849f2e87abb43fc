//! Unified error type for all Codeflow subsystems.

/// Unified error type for all Codeflow subsystems.
#[derive(Debug, thiserror::Error)]
pub enum CodeflowError {
    // === Collaborator faults ===
    #[error("Text generation failed in stage '{stage}': {message}")]
    GenerationFailed { stage: String, message: String },

    #[error("Embedding request failed: {message}")]
    EmbeddingFailed { message: String },

    #[error("Search query failed: {message}")]
    SearchFailed { message: String },

    #[error("Graph query failed for unit '{unit}': {message}")]
    GraphQueryFailed { unit: String, message: String },

    #[error("Generation output in stage '{stage}' could not be parsed: {message}")]
    MalformedOutput { stage: String, message: String },

    // === Workspace / toolchain ===
    #[error("Workspace for repo '{repo}' is unreachable: {message}")]
    WorkspaceUnavailable { repo: String, message: String },

    #[error("Build toolchain unavailable: {message}")]
    ToolchainMissing { message: String },

    #[error("Publishing change request failed: {message}")]
    PublishFailed { message: String },

    // === Pipeline ===
    #[error("Graph validation failed: {0}")]
    GraphValidation(String),

    #[error("Stage '{stage}' is not registered")]
    UnknownStage { stage: String },

    #[error("Stage '{stage}' faulted: {message}")]
    StageFault { stage: String, message: String },

    #[error("Run exceeded the step limit of {limit} stage executions")]
    StepLimitExceeded { limit: usize },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl CodeflowError {
    /// Returns `true` if the error is transient and the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CodeflowError::GenerationFailed { .. }
                | CodeflowError::EmbeddingFailed { .. }
                | CodeflowError::SearchFailed { .. }
        )
    }

    /// Returns `true` if the error is permanent and retrying will not help.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CodeflowError::WorkspaceUnavailable { .. }
                | CodeflowError::ToolchainMissing { .. }
                | CodeflowError::GraphValidation(_)
                | CodeflowError::UnknownStage { .. }
        )
    }
}

/// A convenience alias for `Result<T, CodeflowError>`.
pub type Result<T> = std::result::Result<T, CodeflowError>;
