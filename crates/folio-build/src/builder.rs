//! Static site builder.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use folio_pages::Site;
use folio_router::Renderer;
use folio_routes::{Matcher, RouteCompiler, RouteManifest};
use url::Url;

use crate::adapter::{BuildAdapter, SitemapConfig, StaticAdapter, StaticAdapterConfig};
use crate::crawler::{BuildCrawler, CrawlConfig};
use crate::error::BuildError;
use crate::graph::{BadLink, BuildLinkGraph};
use crate::templates::HtmlRenderer;

/// Configuration for building a static site.
#[derive(Clone)]
pub struct BuildConfig {
    /// Source pages directory
    pub pages_dir: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Absolute URL the site is served from
    pub base_url: Url,

    /// Site title
    pub title: String,

    /// Extra crawl seeds
    pub entries: Vec<String>,

    /// Status recorded for redirects
    pub redirect_status: u16,

    /// `[name]` placeholder rewrites
    pub matchers: Vec<Matcher>,

    pub sitemap: SitemapConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let crawl = CrawlConfig::default();
        Self {
            pages_dir: PathBuf::from("pages"),
            output_dir: PathBuf::from("dist"),
            base_url: crawl.base_url,
            title: "Documentation".to_string(),
            entries: crawl.entries,
            redirect_status: crawl.redirect_status,
            matchers: Vec::new(),
            sitemap: SitemapConfig::default(),
        }
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages generated
    pub pages: usize,

    /// Number of redirects recorded
    pub redirects: usize,

    /// Links that were not followed, by target
    pub bad_links: BTreeMap<String, BadLink>,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Static site builder.
///
/// Declares the pages, crawls them from the static routes and hands the
/// link graph to an adapter.
pub struct StaticBuilder {
    config: BuildConfig,
    renderer: Arc<dyn Renderer>,
    adapter: Box<dyn BuildAdapter>,
}

impl StaticBuilder {
    pub fn new(config: BuildConfig) -> Self {
        let renderer = Arc::new(HtmlRenderer::new(
            config.title.clone(),
            config.base_url.path().to_string(),
        ));
        let adapter = Box::new(StaticAdapter::new(StaticAdapterConfig {
            output_dir: config.output_dir.clone(),
            base_url: config.base_url.clone(),
            sitemap: config.sitemap.clone(),
        }));

        Self {
            config,
            renderer,
            adapter,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_adapter(mut self, adapter: Box<dyn BuildAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Build the static site.
    pub async fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        let compiler = RouteCompiler::new(&self.config.pages_dir)
            .with_matchers(self.config.matchers.clone());
        let mut site = Site::new(compiler);
        let declared = site.load()?;
        tracing::info!(pages = declared, "Declared pages");

        let crawler = BuildCrawler::new(
            Arc::clone(site.routes()),
            Arc::clone(&self.renderer),
            CrawlConfig {
                base_url: self.config.base_url.clone(),
                entries: self.config.entries.clone(),
                redirect_status: self.config.redirect_status,
            },
        );
        let graph = crawler.crawl().await?;

        for (target, bad) in &graph.bad_links {
            tracing::warn!(
                link = %target,
                reason = %bad.reason,
                referrers = ?bad.referrers,
                "Bad link"
            );
        }

        let manifest = manifest(&site, &graph);

        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;
        let report = self.adapter.write(&graph, &manifest)?;

        Ok(BuildResult {
            pages: report.pages,
            redirects: graph.redirects.len(),
            bad_links: graph.bad_links,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }
}

/// Route manifest with the payload of every built page.
fn manifest(site: &Site, graph: &BuildLinkGraph) -> RouteManifest {
    let routes = site.routes().read();
    let mut manifest = RouteManifest::from_table(&*routes);
    manifest.pages = graph
        .links
        .iter()
        .filter_map(|(pathname, record)| {
            record
                .data_ids
                .first()
                .map(|id| (pathname.clone(), id.clone()))
        })
        .collect();
    manifest.redirects = graph.redirect_map();
    manifest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MANIFEST_FILE;
    use std::path::Path;
    use tempfile::tempdir;

    fn write(root: &Path, file: &str, content: &str) {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn builds_simple_site() {
        let temp = tempdir().unwrap();
        let pages = temp.path().join("pages");
        let out = temp.path().join("dist");

        write(&pages, "index.md", "---\ntitle: Home\n---\n# Welcome\n\n[Guide](/guide/)\n");
        write(&pages, "guide/index.md", "# Guide\n\n[Post](/post/1) [Old](/old) [Gone](/gone)\n");
        write(&pages, "post/:id.md", "# Post\n");
        write(&pages, "old.md", "---\nredirect: /guide/\n---\n");
        write(&pages, "@layout.md", "<div class=\"site\"><slot></slot></div>\n");

        let config = BuildConfig {
            pages_dir: pages,
            output_dir: out.clone(),
            title: "Docs".to_string(),
            ..Default::default()
        };

        let result = StaticBuilder::new(config).build().await.unwrap();

        assert_eq!(result.pages, 3);
        assert_eq!(result.redirects, 1);
        assert_eq!(
            result.bad_links.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["/gone"]
        );

        let home = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(home.contains("<title>Home - Docs</title>"));
        assert!(home.contains(r#"<div class="site">"#));
        assert!(home.contains(r#"id="folio-redirects">{"/old":"/guide/"}"#));
        assert!(out.join("guide/index.html").exists());
        assert!(out.join("post/1.html").exists());
        assert!(out.join("old.html").exists());

        let manifest: RouteManifest =
            serde_json::from_str(&fs::read_to_string(out.join(MANIFEST_FILE)).unwrap()).unwrap();
        assert!(manifest.pages.contains_key("/post/1"));
        assert_eq!(manifest.redirects["/old"], "/guide/");
    }

    #[tokio::test]
    async fn missing_pages_directory_fails() {
        let temp = tempdir().unwrap();

        let config = BuildConfig {
            pages_dir: temp.path().join("nope"),
            output_dir: temp.path().join("dist"),
            ..Default::default()
        };

        let err = StaticBuilder::new(config).build().await.unwrap_err();
        assert!(matches!(err, BuildError::Pages(_)));
    }
}
