//! Shared error types for method analysis

use thiserror::Error;

/// Main error type for defuse operations.
///
/// Analysis assumes a successfully parsed AST and performs no further
/// syntax or type validation. The variants here describe internal
/// invariant violations (a builder defect, not recoverable user input),
/// which is why there is no "empty result" variant: an analysis that
/// finds nothing returns empty fact tables, not an error.
#[derive(Debug, Error)]
pub enum Error {
    /// A program graph lookup or structural invariant failed
    #[error("program graph invariant violated: {0}")]
    GraphInvariant(String),

    /// The method AST has a shape the builder cannot place
    #[error("malformed method AST: {0}")]
    MalformedAst(String),

    /// Wrapped external errors
    #[error(transparent)]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Create a graph invariant violation error
    pub fn graph_invariant(message: impl Into<String>) -> Self {
        Self::GraphInvariant(message.into())
    }

    /// Create a malformed AST error
    pub fn malformed_ast(message: impl Into<String>) -> Self {
        Self::MalformedAst(message.into())
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
