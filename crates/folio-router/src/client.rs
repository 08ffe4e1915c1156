//! Client routes rebuilt from a server manifest.
//!
//! Prebuilt pages ship as JSON payloads under `_data/`. The manifest maps
//! every prebuilt pathname to its payload id, so the client loader only has
//! to fetch and deserialize.

use std::collections::BTreeMap;
use std::sync::Arc;

use folio_routes::{normalize_static, RouteManifest};
use url::Url;

use crate::declaration::{Loaded, LoaderContext, LoaderError, RouteDeclaration};
use crate::page::Page;
use crate::router::{NavigationError, Router};

/// Directory holding page payloads, relative to the base URL.
pub const DATA_DIR: &str = "_data";

/// URL of a page payload.
pub fn data_url(base_url: &Url, id: &str) -> Result<Url, url::ParseError> {
    base_url.join(&format!("{DATA_DIR}/{id}.json"))
}

/// Declarations for every route in `manifest`, in manifest order.
pub fn manifest_declarations(
    manifest: &RouteManifest,
    base_url: &Url,
) -> Result<Vec<RouteDeclaration>, NavigationError> {
    let pages = Arc::new(manifest.pages.clone());

    manifest
        .to_routes()?
        .into_iter()
        .map(|route| {
            let pages = Arc::clone(&pages);
            let base_url = base_url.clone();
            Ok(RouteDeclaration::new(route, move |ctx| {
                let pages = Arc::clone(&pages);
                let base_url = base_url.clone();
                async move {
                    let payload = payload_url(&pages, &base_url, &ctx)?;
                    let value = ctx.fetch_json(payload.as_str()).await?;
                    let page: Page =
                        serde_json::from_value(value).map_err(|e| LoaderError::Source {
                            path: payload.to_string(),
                            message: e.to_string(),
                        })?;
                    Ok::<_, LoaderError>(Loaded::Page(page))
                }
            }))
        })
        .collect()
}

fn payload_url(
    pages: &BTreeMap<String, String>,
    base_url: &Url,
    ctx: &LoaderContext,
) -> Result<Url, LoaderError> {
    // Static pages are keyed by their normalized pathname.
    let pathname = if ctx.route.dynamic {
        ctx.url.path().to_string()
    } else {
        normalize_static(ctx.url.path())
    };
    let id = pages
        .get(&pathname)
        .ok_or_else(|| LoaderError::message(format!("no prebuilt page for {pathname}")))?;

    data_url(base_url, id).map_err(|e| LoaderError::Source {
        path: id.clone(),
        message: e.to_string(),
    })
}

impl Router {
    /// Register the routes and redirects of a server manifest.
    pub fn load_manifest(
        &self,
        manifest: &RouteManifest,
    ) -> Result<Vec<Arc<RouteDeclaration>>, NavigationError> {
        for (from, to) in &manifest.redirects {
            self.add_redirect(from, to)?;
        }

        let declarations = manifest_declarations(manifest, self.base_url())?;
        tracing::debug!(
            routes = declarations.len(),
            redirects = manifest.redirects.len(),
            "Loaded route manifest"
        );

        Ok(declarations
            .into_iter()
            .map(|declaration| self.add_route(declaration))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;
    use crate::router::GoOptions;
    use folio_routes::{ManifestRoute, PresortedOrdering};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn manifest() -> RouteManifest {
        let route = |pathname: &str, dynamic: bool, score: u64| ManifestRoute {
            pathname: pathname.to_string(),
            dynamic,
            score,
            order: None,
        };

        RouteManifest {
            routes: vec![
                route("/", false, 5),
                route("/post/:id", true, 53),
                route("/about", false, 5),
            ],
            pages: BTreeMap::from([
                ("/".to_string(), "home".to_string()),
                ("/about".to_string(), "about".to_string()),
                ("/post/1".to_string(), "p1".to_string()),
            ]),
            redirects: BTreeMap::from([("/old".to_string(), "/post/1".to_string())]),
        }
    }

    fn router() -> (Router, Arc<MemoryFetcher>) {
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with_response("http://localhost/_data/home.json", json!({ "html": "home" }))
                .with_response("http://localhost/_data/about.json", json!({ "html": "about" }))
                .with_response(
                    "http://localhost/_data/p1.json",
                    json!({ "title": "One", "html": "<p>1</p>", "data": { "id": 1 } }),
                ),
        );
        let router = Router::builder(Url::parse("http://localhost/").unwrap())
            .ordering(Arc::new(PresortedOrdering))
            .fetcher(fetcher.clone())
            .build();
        router.load_manifest(&manifest()).unwrap();
        (router, fetcher)
    }

    #[tokio::test]
    async fn loads_prebuilt_pages() {
        let (router, fetcher) = router();

        router.go("/old", GoOptions::default()).await.unwrap();

        let route = router.current_route().unwrap();
        assert_eq!(route.url().path(), "/post/1");
        assert_eq!(route.page.title.as_deref(), Some("One"));
        assert_eq!(route.page.data, json!({ "id": 1 }));
        assert_eq!(fetcher.requests(), vec!["http://localhost/_data/p1.json"]);
    }

    #[tokio::test]
    async fn missing_payloads_fail_the_navigation() {
        let (router, _) = router();

        let err = router.go("/post/2", GoOptions::default()).await.unwrap_err();

        assert!(err.to_string().contains("no prebuilt page for /post/2"));
        assert!(!router.state().loading);
    }

    #[tokio::test]
    async fn static_pages_load_under_any_case() {
        let (router, fetcher) = router();

        router.go("/About", GoOptions::default()).await.unwrap();

        let route = router.current_route().unwrap();
        assert_eq!(route.page.html, "about");
        assert_eq!(fetcher.requests(), vec!["http://localhost/_data/about.json"]);
    }

    #[test]
    fn keeps_manifest_order() {
        let (router, _) = router();

        let order: Vec<_> = router
            .routes()
            .read()
            .iter()
            .map(|d| d.route.pathname.clone())
            .collect();
        assert_eq!(order, vec!["/", "/post/:id", "/about"]);
    }
}
