//! Unified error taxonomy shared by every crate in the workspace.
//!
//! Flat by design: the (out-of-core) HTTP layer maps each variant to exactly
//! one status code, so there is no benefit to per-component nesting here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodegraphError>;

#[derive(Error, Debug)]
pub enum CodegraphError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("parse failed: {0}")]
    ParseFailed(String),

    #[error("infrastructure error: {0}")]
    Infra(String),

    #[error("llm error: {0}")]
    LlmFailure(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodegraphError {
    pub fn input_invalid(message: impl Into<String>) -> Self {
        Self::InputInvalid(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::ParseFailed(message.into())
    }

    pub fn infra(message: impl Into<String>) -> Self {
        Self::Infra(message.into())
    }

    pub fn llm_failure(message: impl Into<String>) -> Self {
        Self::LlmFailure(message.into())
    }

    /// Short machine-readable tag, matching the kind vocabulary in §7/§9 of
    /// the design document (`input_invalid`, `not_found`, `conflict`,
    /// `infra_failure`, `llm_failure`).
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Self::InputInvalid(_) => "input_invalid",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::ParseFailed(_) => "parse_failed",
            Self::Infra(_) | Self::Database(_) | Self::Io(_) => "infra_failure",
            Self::LlmFailure(_) => "llm_failure",
            Self::Serialization(_) => "infra_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_covers_database_as_infra() {
        let err: CodegraphError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind_tag(), "infra_failure");
    }

    #[test]
    fn display_includes_message() {
        let err = CodegraphError::not_found("repository abc123");
        assert!(err.to_string().contains("abc123"));
    }
}
