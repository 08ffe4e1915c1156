//! Page loading errors.

use folio_routes::CompileError;

use crate::parser::ParseError;

/// Errors raised while discovering or declaring pages.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Pages directory not found: {0}")]
    MissingRoot(String),

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),
}
