//! Route compilation errors.

/// Errors raised while compiling a file path or pathname into a route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("{path} is not inside the routes root {root}")]
    OutsideRoot { path: String, root: String },

    #[error("{path}: no matcher configured for placeholder [{name}]")]
    UnknownPlaceholder { path: String, name: String },

    #[error("Invalid matcher [{name}]: {reason}")]
    InvalidMatcher { name: String, reason: String },

    #[error("Invalid pattern `{pattern}` at offset {offset}: {message}")]
    Pattern {
        pattern: String,
        offset: usize,
        message: String,
    },

    #[error("{0} is a layout, not a routable page")]
    NotRoutable(String),
}
