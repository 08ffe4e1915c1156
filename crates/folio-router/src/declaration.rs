//! Route declarations: a route plus the behavior that loads it.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use folio_routes::{Params, Route};
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use url::Url;

use crate::fetch::{FetchError, Fetcher};
use crate::page::{normalize_page_data, Page};

/// Errors raised by loaders.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoaderError {
    #[error("{0}")]
    Message(String),

    #[error("Failed to load {path}: {message}")]
    Source { path: String, message: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl LoaderError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// What a page loader produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    Page(Page),
    Redirect(String),
}

/// What a prefetch callback produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefetched {
    Done,
    Redirect(String),
}

/// Everything a loader gets to see.
#[derive(Clone)]
pub struct LoaderContext {
    /// The URL being loaded
    pub url: Url,

    /// Parameters extracted by the route pattern
    pub params: Params,

    /// The matched route
    pub route: Route,

    /// HTTP client for data requests
    pub fetcher: Option<Arc<dyn Fetcher>>,
}

impl LoaderContext {
    /// Reroute this navigation to another URL.
    pub fn redirect(&self, to: impl Into<String>) -> Loaded {
        Loaded::Redirect(to.into())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Fetch JSON relative to the URL being loaded.
    pub async fn fetch_json(&self, url: &str) -> Result<Value, LoaderError> {
        let fetcher = self
            .fetcher
            .as_ref()
            .ok_or_else(|| LoaderError::message("no fetcher configured for this router"))?;
        let url = self.url.join(url).map_err(|e| LoaderError::Source {
            path: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(fetcher.fetch_json(&url).await?)
    }
}

impl fmt::Debug for LoaderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderContext")
            .field("url", &self.url.as_str())
            .field("params", &self.params)
            .field("route", &self.route.pathname)
            .finish()
    }
}

pub type Loader =
    Arc<dyn Fn(LoaderContext) -> BoxFuture<'static, Result<Loaded, LoaderError>> + Send + Sync>;

pub type PrefetchFn =
    Arc<dyn Fn(LoaderContext) -> BoxFuture<'static, Result<Prefetched, LoaderError>> + Send + Sync>;

pub type LayoutLoader =
    Arc<dyn Fn(LoaderContext) -> BoxFuture<'static, Result<Page, LoaderError>> + Send + Sync>;

/// A layout wrapping a route, outermost first in [`RouteDeclaration::layouts`].
#[derive(Clone)]
pub struct Layout {
    pub id: String,
    pub loader: LayoutLoader,
}

impl Layout {
    pub fn new<F, Fut>(id: impl Into<String>, loader: F) -> Self
    where
        F: Fn(LoaderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page, LoaderError>> + Send + 'static,
    {
        Self {
            id: id.into(),
            loader: Arc::new(move |ctx| loader(ctx).boxed()),
        }
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout").field("id", &self.id).finish()
    }
}

/// A route and the behavior attached to it.
#[derive(Clone)]
pub struct RouteDeclaration {
    pub route: Route,
    pub loader: Loader,
    pub prefetch: Option<PrefetchFn>,

    /// Unconditional redirect. Checked before the loader runs.
    pub redirect: Option<String>,

    /// Owning layouts, outermost first.
    pub layouts: Vec<Layout>,

    /// Source file, for log context.
    pub source: Option<PathBuf>,
}

impl RouteDeclaration {
    pub fn new<F, Fut>(route: Route, loader: F) -> Self
    where
        F: Fn(LoaderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Loaded, LoaderError>> + Send + 'static,
    {
        Self {
            route,
            loader: Arc::new(move |ctx| loader(ctx).boxed()),
            prefetch: None,
            redirect: None,
            layouts: Vec::new(),
            source: None,
        }
    }

    /// A route that only redirects.
    pub fn redirect(route: Route, to: impl Into<String>) -> Self {
        let to = to.into();
        let target = to.clone();
        let mut declaration = Self::new(route, move |_| {
            let target = target.clone();
            async move { Ok(Loaded::Redirect(target)) }
        });
        declaration.redirect = Some(to);
        declaration
    }

    pub fn with_prefetch<F, Fut>(mut self, prefetch: F) -> Self
    where
        F: Fn(LoaderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Prefetched, LoaderError>> + Send + 'static,
    {
        self.prefetch = Some(Arc::new(move |ctx| prefetch(ctx).boxed()));
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layouts.push(layout);
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Source file or pathname, for log messages.
    pub fn describe(&self) -> String {
        self.source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.route.pathname.clone())
    }
}

impl AsRef<Route> for RouteDeclaration {
    fn as_ref(&self) -> &Route {
        &self.route
    }
}

impl fmt::Debug for RouteDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDeclaration")
            .field("route", &self.route.pathname)
            .field("redirect", &self.redirect)
            .field("layouts", &self.layouts)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Result of running a route's loader and its layouts.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteLoad {
    Page { page: Page, layouts: Vec<Page> },
    Redirect(String),
}

/// Load a page, then its layouts concurrently.
///
/// Layouts are not loaded when the page redirects. Page and layout data are
/// normalized to JSON objects.
pub async fn load_route(
    declaration: &RouteDeclaration,
    ctx: LoaderContext,
) -> Result<RouteLoad, LoaderError> {
    let pathname = declaration.route.pathname.clone();

    let page = match (declaration.loader)(ctx.clone()).await? {
        Loaded::Redirect(to) => return Ok(RouteLoad::Redirect(to)),
        Loaded::Page(page) => page,
    };

    let layouts = future::try_join_all(
        declaration
            .layouts
            .iter()
            .map(|layout| (layout.loader)(ctx.clone())),
    )
    .await?;

    Ok(RouteLoad::Page {
        page: normalize_page_data(page, &pathname),
        layouts: layouts
            .into_iter()
            .map(|layout| normalize_page_data(layout, &pathname))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx(route: &Route) -> LoaderContext {
        LoaderContext {
            url: Url::parse("http://localhost/a").unwrap(),
            params: Params::new(),
            route: route.clone(),
            fetcher: None,
        }
    }

    #[tokio::test]
    async fn loads_page_and_layouts() {
        let route = Route::new("/a", None).unwrap();
        let declaration = RouteDeclaration::new(route.clone(), |_| async {
            Ok(Loaded::Page(Page::new("<p>a</p>").with_data(json!("bad"))))
        })
        .with_layout(Layout::new("root", |_| async { Ok(Page::new("<main></main>")) }));

        let load = load_route(&declaration, ctx(&route)).await.unwrap();

        let RouteLoad::Page { page, layouts } = load else {
            panic!("expected a page");
        };
        assert_eq!(page.data, json!({}));
        assert_eq!(layouts.len(), 1);
        assert_eq!(layouts[0].html, "<main></main>");
    }

    #[tokio::test]
    async fn redirect_declarations_redirect() {
        let route = Route::new("/old", None).unwrap();
        let declaration = RouteDeclaration::redirect(route.clone(), "/new");

        assert_eq!(declaration.redirect.as_deref(), Some("/new"));
        assert_eq!(
            load_route(&declaration, ctx(&route)).await.unwrap(),
            RouteLoad::Redirect("/new".to_string())
        );
    }

    #[tokio::test]
    async fn redirecting_pages_skip_their_layouts() {
        let route = Route::new("/old", None).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let declaration = RouteDeclaration::new(route.clone(), |ctx| async move {
            Ok(ctx.redirect("/new"))
        })
        .with_layout(Layout::new("root", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(LoaderError::message("layout broke")) }
        }));

        let load = load_route(&declaration, ctx(&route)).await.unwrap();

        assert_eq!(load, RouteLoad::Redirect("/new".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn loader_errors_propagate() {
        let route = Route::new("/a", None).unwrap();
        let declaration = RouteDeclaration::new(route.clone(), |_| async {
            Err(LoaderError::message("boom"))
        });

        let err = load_route(&declaration, ctx(&route)).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn fetch_without_fetcher_fails() {
        let route = Route::new("/a", None).unwrap();

        let err = ctx(&route).fetch_json("/data.json").await.unwrap_err();
        assert!(err.to_string().contains("no fetcher"));
    }

    #[test]
    fn describes_by_source_then_pathname() {
        let route = Route::new("/a", None).unwrap();
        let declaration = RouteDeclaration::redirect(route, "/b");
        assert_eq!(declaration.describe(), "/a");
        assert_eq!(declaration.with_source("pages/a.md").describe(), "pages/a.md");
    }
}
