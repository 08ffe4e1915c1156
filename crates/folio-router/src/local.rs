//! Same-origin fetches answered from the route table.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use url::Url;

use crate::declaration::{load_route, LoaderContext, RouteLoad};
use crate::fetch::{FetchError, Fetcher};
use crate::router::{SharedRoutes, MAX_REDIRECTS};

/// Fetcher used during the build and server-side rendering.
///
/// A request for a URL of this site runs the matching route's loader and
/// answers with the page data. Nothing goes over the network; requests to
/// other origins fail.
#[derive(Clone)]
pub struct LocalFetcher {
    routes: SharedRoutes,
    base_url: Url,
}

impl LocalFetcher {
    pub fn new(routes: SharedRoutes, base_url: Url) -> Self {
        Self { routes, base_url }
    }

    async fn fetch(&self, url: &Url) -> Result<Value, FetchError> {
        if url.origin() != self.base_url.origin() {
            return Err(FetchError::Failed {
                url: url.to_string(),
                message: "only same-origin requests are served locally".to_string(),
            });
        }

        let mut url = url.clone();
        for _ in 0..=MAX_REDIRECTS {
            let matched = self.routes.read().match_url(&url);
            let Some(matched) = matched else {
                return Err(FetchError::NotFound(url.to_string()));
            };

            let declaration = Arc::clone(&matched.route);
            let ctx = LoaderContext {
                url: url.clone(),
                params: matched.params,
                route: declaration.route.clone(),
                fetcher: Some(Arc::new(self.clone())),
            };

            let load = match &declaration.redirect {
                Some(to) => RouteLoad::Redirect(to.clone()),
                None => load_route(&declaration, ctx)
                    .await
                    .map_err(|e| FetchError::Failed {
                        url: url.to_string(),
                        message: e.to_string(),
                    })?,
            };

            match load {
                RouteLoad::Page { page, .. } => return Ok(page.data),
                RouteLoad::Redirect(to) => {
                    url = url.join(&to).map_err(|e| FetchError::Failed {
                        url: to.clone(),
                        message: e.to_string(),
                    })?;
                }
            }
        }

        Err(FetchError::Failed {
            url: url.to_string(),
            message: format!("more than {MAX_REDIRECTS} redirects"),
        })
    }
}

impl Fetcher for LocalFetcher {
    fn fetch_json<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Value, FetchError>> {
        Box::pin(self.fetch(url))
    }
}
