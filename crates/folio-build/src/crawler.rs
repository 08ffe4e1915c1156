//! Build-time crawl over rendered pages.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use folio_router::{
    load_route, Fetcher, LoadedRoute, LoaderContext, LocalFetcher, MatchedRoute, Renderer,
    RouteLoad, SharedRoutes,
};
use folio_routes::normalize_static;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::BuildError;
use crate::graph::{BuildLinkGraph, PageRecord, RedirectRecord};
use crate::links::{classify, extract_hrefs, Link, MALFORMED, NOT_FOUND};

/// Crawl configuration.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Absolute URL the site is served from
    pub base_url: Url,

    /// Extra seeds on top of the static routes
    pub entries: Vec<String>,

    /// Status recorded for redirects
    pub redirect_status: u16,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost/").expect("valid default base URL"),
            entries: Vec::new(),
            redirect_status: 308,
        }
    }
}

struct Pending {
    url: Url,
    referrer: Option<String>,
    seed: bool,
}

/// Walks every page reachable from the seeds.
///
/// Pages are visited one at a time. Links found in a page's HTML are queued
/// after it has rendered, and every pathname is visited at most once.
pub struct BuildCrawler {
    routes: SharedRoutes,
    renderer: Arc<dyn Renderer>,
    fetcher: Arc<dyn Fetcher>,
    config: CrawlConfig,
}

impl BuildCrawler {
    pub fn new(routes: SharedRoutes, renderer: Arc<dyn Renderer>, config: CrawlConfig) -> Self {
        let fetcher = Arc::new(LocalFetcher::new(
            Arc::clone(&routes),
            config.base_url.clone(),
        ));
        Self {
            routes,
            renderer,
            fetcher,
            config,
        }
    }

    /// Replace the fetcher handed to loaders.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl the site.
    ///
    /// Bad links end up in the graph. Loader and render failures abort.
    pub async fn crawl(&self) -> Result<BuildLinkGraph, BuildError> {
        let mut graph = BuildLinkGraph::default();
        let mut queued = HashSet::new();
        let mut queue = VecDeque::new();

        for url in self.seeds()? {
            if queued.insert(self.pathname_key(&url)) {
                queue.push_back(Pending {
                    url,
                    referrer: None,
                    seed: true,
                });
            }
        }

        while let Some(pending) = queue.pop_front() {
            if graph.contains(&self.pathname_key(&pending.url)) {
                debug!(pathname = pending.url.path(), "Already crawled");
                continue;
            }
            let found = self.visit(&mut graph, pending).await?;
            for next in found {
                let pathname = self.pathname_key(&next.url);
                if graph.contains(&pathname) || !queued.insert(pathname) {
                    continue;
                }
                queue.push_back(next);
            }
        }

        info!(
            pages = graph.links.len(),
            redirects = graph.redirects.len(),
            bad_links = graph.bad_links.len(),
            "Crawl finished"
        );
        Ok(graph)
    }

    /// Dedup key for a URL.
    ///
    /// Static routes match case-insensitively, so pathnames they match are
    /// normalized the same way their patterns are.
    fn pathname_key(&self, url: &Url) -> String {
        let pathname = url.path();
        match self.routes.read().match_pathname(pathname) {
            Some(matched) if !matched.route.route.dynamic => normalize_static(pathname),
            _ => pathname.to_string(),
        }
    }

    /// Static routes in table order, then configured entries.
    fn seeds(&self) -> Result<Vec<Url>, BuildError> {
        let base = &self.config.base_url;
        let statics: Vec<String> = self
            .routes
            .read()
            .iter()
            .filter(|declaration| !declaration.route.dynamic)
            .map(|declaration| declaration.route.pathname.clone())
            .collect();

        statics
            .iter()
            .chain(self.config.entries.iter())
            .map(|entry| {
                base.join(entry.trim_start_matches('/'))
                    .map_err(|e| BuildError::InvalidUrl {
                        url: entry.clone(),
                        message: e.to_string(),
                    })
            })
            .collect()
    }

    async fn visit(
        &self,
        graph: &mut BuildLinkGraph,
        pending: Pending,
    ) -> Result<Vec<Pending>, BuildError> {
        let Pending {
            url,
            referrer,
            seed,
        } = pending;
        let pathname = self.pathname_key(&url);

        let matched = self.routes.read().match_url(&url);
        let Some(matched) = matched else {
            if seed {
                return Err(BuildError::NoMatch(url.to_string()));
            }
            warn!(pathname = %pathname, "No route matches link");
            graph.add_bad_link(&pathname, NOT_FOUND, referrer.as_deref());
            return Ok(Vec::new());
        };

        let declaration = Arc::clone(&matched.route);
        let load = match &declaration.redirect {
            Some(to) => RouteLoad::Redirect(to.clone()),
            None => {
                let ctx = LoaderContext {
                    url: url.clone(),
                    params: matched.params.clone(),
                    route: declaration.route.clone(),
                    fetcher: Some(Arc::clone(&self.fetcher)),
                };
                load_route(&declaration, ctx)
                    .await
                    .map_err(|source| BuildError::Loader {
                        route: declaration.describe(),
                        source,
                    })?
            }
        };

        let (page, layouts) = match load {
            RouteLoad::Page { page, layouts } => (page, layouts),
            RouteLoad::Redirect(to) => {
                let target = url.join(&to).map_err(|e| BuildError::InvalidUrl {
                    url: to.clone(),
                    message: e.to_string(),
                })?;
                let internal = target.origin() == self.config.base_url.origin();
                debug!(from = %pathname, to = %target, "Recorded redirect");
                graph.redirects.insert(
                    pathname,
                    RedirectRecord {
                        to: if internal {
                            target.path().to_string()
                        } else {
                            target.to_string()
                        },
                        status: self.config.redirect_status,
                    },
                );
                return Ok(match classify(target.as_str(), &url, &self.config.base_url) {
                    Link::Internal(target) => vec![Pending {
                        url: target,
                        referrer,
                        seed: false,
                    }],
                    _ => Vec::new(),
                });
            }
        };

        let payload = serde_json::to_value(&page).map_err(|e| BuildError::Serialize {
            what: pathname.clone(),
            message: e.to_string(),
        })?;
        let mut data_ids = vec![graph.add_data(&payload)];
        for layout in layouts.iter().filter(|layout| layout.has_data()) {
            data_ids.push(graph.add_data(&layout.data));
        }

        let loaded = LoadedRoute {
            matched: MatchedRoute {
                declaration: Arc::clone(&declaration),
                url: url.clone(),
                params: matched.params,
            },
            page,
            layouts,
        };
        let ssr = self.renderer.ssr(&loaded)?;

        let mut found = Vec::new();
        for href in extract_hrefs(&ssr.html) {
            match classify(&href, &url, &self.config.base_url) {
                Link::External => {}
                Link::Malformed(href) => {
                    warn!(page = %pathname, href = %href, "Malformed link");
                    graph.add_bad_link(&href, MALFORMED, Some(&pathname));
                }
                Link::Internal(target) => {
                    let target_path = self.pathname_key(&target);
                    if graph.bad_links.contains_key(&target_path) {
                        graph.add_bad_link(&target_path, NOT_FOUND, Some(&pathname));
                    } else if graph.contains(&target_path) || target_path == pathname {
                        continue;
                    } else if !self.routes.read().test(&target_path) {
                        warn!(page = %pathname, href = %href, "No route matches link");
                        graph.add_bad_link(&target_path, NOT_FOUND, Some(&pathname));
                    } else {
                        found.push(Pending {
                            url: target,
                            referrer: Some(pathname.clone()),
                            seed: false,
                        });
                    }
                }
            }
        }

        debug!(pathname = %pathname, links = found.len(), "Rendered page");
        graph.links.insert(
            pathname.clone(),
            PageRecord {
                filename: output_filename(&pathname, self.config.base_url.path()),
                route: declaration.route.pathname.clone(),
                ssr,
                data_ids,
            },
        );
        Ok(found)
    }
}

/// Output file for a pathname, relative to the output directory.
///
/// `/` becomes `index.html`, `/a/` becomes `a/index.html` and `/a` becomes
/// `a.html`. The base path is stripped first.
pub fn output_filename(pathname: &str, base_path: &str) -> String {
    let decoded = folio_routes::decode_pathname(pathname)
        .map(|p| p.into_owned())
        .unwrap_or_else(|| pathname.to_string());
    let relative = decoded
        .strip_prefix(base_path)
        .or_else(|| decoded.strip_prefix('/'))
        .unwrap_or(&decoded);

    if relative.is_empty() || relative.ends_with('/') {
        format!("{relative}index.html")
    } else if relative.ends_with(".html") || relative.ends_with(".htm") {
        relative.to_string()
    } else {
        format!("{relative}.html")
    }
}
