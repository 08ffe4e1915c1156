//! View renderer seam.

use crate::state::LoadedRoute;

/// Output of a server-side render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsrOutput {
    /// Full HTML document
    pub html: String,

    /// Extra markup for `<head>`
    pub head: String,
}

/// Errors raised while rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to render {pathname}: {message}")]
    Render { pathname: String, message: String },
}

/// Turns loaded routes into views.
///
/// On the client, the router detaches the previous route and attaches the
/// new one after every committed navigation. The build and the dev server
/// only call [`ssr`](Self::ssr).
pub trait Renderer: Send + Sync {
    fn attach(&self, _route: &LoadedRoute) {}

    fn detach(&self, _route: &LoadedRoute) {}

    fn ssr(&self, route: &LoadedRoute) -> Result<SsrOutput, RenderError>;
}
