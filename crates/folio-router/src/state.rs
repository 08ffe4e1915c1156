//! Navigation state and matched/loaded routes.

use std::sync::Arc;

use folio_routes::Params;
use url::Url;

use crate::declaration::RouteDeclaration;
use crate::page::Page;

/// A declaration that matched a URL.
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    pub declaration: Arc<RouteDeclaration>,
    pub url: Url,
    pub params: Params,
}

impl MatchedRoute {
    /// Pattern of the matched route.
    pub fn pathname(&self) -> &str {
        &self.declaration.route.pathname
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// A matched route whose loader has resolved.
#[derive(Debug, Clone)]
pub struct LoadedRoute {
    pub matched: MatchedRoute,
    pub page: Page,

    /// Layout pages, outermost first.
    pub layouts: Vec<Page>,
}

impl LoadedRoute {
    pub fn url(&self) -> &Url {
        &self.matched.url
    }

    pub fn params(&self) -> &Params {
        &self.matched.params
    }

    pub fn pathname(&self) -> &str {
        self.matched.pathname()
    }
}

/// Transitional navigation state, published on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationState {
    /// Target of the navigation in flight, or the settled URL
    pub url: Option<Url>,

    /// Whether a navigation is in flight
    pub loading: bool,
}
