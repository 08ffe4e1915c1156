//! Build errors.

use folio_pages::PageError;
use folio_router::{LoaderError, RenderError};

/// Errors that abort a build. Bad links are not among them.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Pages(#[from] PageError),

    #[error("No route matches crawl entry {0}")]
    NoMatch(String),

    #[error("Failed to load {route}: {source}")]
    Loader {
        route: String,
        #[source]
        source: LoaderError,
    },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Failed to serialize {what}: {message}")]
    Serialize { what: String, message: String },

    #[error("Failed to render template: {0}")]
    TemplateError(String),

    #[error("Failed to write output: {0}")]
    WriteError(String),
}
