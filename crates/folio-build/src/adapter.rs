//! Writing a crawled site to disk.

use std::fs;
use std::path::{Path, PathBuf};

use folio_router::DATA_DIR;
use folio_routes::RouteManifest;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::crawler::output_filename;
use crate::error::BuildError;
use crate::graph::BuildLinkGraph;

/// File name of the route manifest in the output directory.
pub const MANIFEST_FILE: &str = "_routes.json";

/// `id` of the script element carrying the redirect map.
pub const REDIRECTS_SCRIPT_ID: &str = "folio-redirects";

/// Materializes a crawl.
pub trait BuildAdapter: Send + Sync {
    fn write(
        &self,
        graph: &BuildLinkGraph,
        manifest: &RouteManifest,
    ) -> Result<AdapterReport, BuildError>;
}

/// What an adapter wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterReport {
    pub pages: usize,
    pub data_files: usize,
    pub redirects: usize,
    pub files: Vec<PathBuf>,
}

/// `sitemap.xml` settings. Empty fields are left out of every entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    pub enabled: bool,
    pub changefreq: Option<String>,
    pub priority: Option<f32>,
    pub lastmod: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StaticAdapterConfig {
    pub output_dir: PathBuf,
    pub base_url: Url,
    pub sitemap: SitemapConfig,
}

/// Adapter for static hosting.
///
/// Writes one HTML file per page, a stub page per redirect, the data
/// payloads and the route manifest. Hosts cannot answer redirects, so every
/// page embeds the redirect map for the client router.
pub struct StaticAdapter {
    config: StaticAdapterConfig,
}

impl StaticAdapter {
    pub fn new(config: StaticAdapterConfig) -> Self {
        Self { config }
    }

    fn write_file(
        &self,
        report: &mut AdapterReport,
        relative: &str,
        contents: &str,
    ) -> Result<(), BuildError> {
        let path = self.config.output_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
        }
        fs::write(&path, contents).map_err(|e| write_error(&path, e))?;
        debug!(path = %path.display(), "Wrote file");
        report.files.push(path);
        Ok(())
    }

    fn sitemap(&self, graph: &BuildLinkGraph) -> String {
        let sitemap = &self.config.sitemap;
        let urls: Vec<String> = graph
            .links
            .keys()
            .map(|pathname| {
                let mut loc = self.config.base_url.clone();
                loc.set_path(pathname);
                let mut entry =
                    format!("  <url>\n    <loc>{}</loc>\n", escape_html(loc.as_str()));
                if let Some(lastmod) = &sitemap.lastmod {
                    entry.push_str(&format!(
                        "    <lastmod>{}</lastmod>\n",
                        escape_html(lastmod)
                    ));
                }
                if let Some(changefreq) = &sitemap.changefreq {
                    entry.push_str(&format!(
                        "    <changefreq>{}</changefreq>\n",
                        escape_html(changefreq)
                    ));
                }
                if let Some(priority) = sitemap.priority {
                    entry.push_str(&format!("    <priority>{priority:.1}</priority>\n"));
                }
                entry.push_str("  </url>");
                entry
            })
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{}
</urlset>
"#,
            urls.join("\n")
        )
    }
}

impl BuildAdapter for StaticAdapter {
    fn write(
        &self,
        graph: &BuildLinkGraph,
        manifest: &RouteManifest,
    ) -> Result<AdapterReport, BuildError> {
        let mut report = AdapterReport::default();
        let redirects = redirects_script(graph)?;
        let base_path = self.config.base_url.path();

        for record in graph.links.values() {
            let html = inject_head(&record.ssr.html, &redirects);
            self.write_file(&mut report, &record.filename, &html)?;
            report.pages += 1;
        }

        for (from, redirect) in &graph.redirects {
            let filename = output_filename(from, base_path);
            if graph.links.values().any(|page| page.filename == filename) {
                continue;
            }
            let stub = redirect_stub(&redirect.to, &redirects);
            self.write_file(&mut report, &filename, &stub)?;
            report.redirects += 1;
        }

        for (id, value) in &graph.data {
            let json = serde_json::to_string(value).map_err(|e| BuildError::Serialize {
                what: id.clone(),
                message: e.to_string(),
            })?;
            self.write_file(&mut report, &format!("{DATA_DIR}/{id}.json"), &json)?;
            report.data_files += 1;
        }

        let manifest_json =
            serde_json::to_string_pretty(manifest).map_err(|e| BuildError::Serialize {
                what: MANIFEST_FILE.to_string(),
                message: e.to_string(),
            })?;
        self.write_file(&mut report, MANIFEST_FILE, &manifest_json)?;

        if self.config.sitemap.enabled {
            self.write_file(&mut report, "sitemap.xml", &self.sitemap(graph))?;

            let robots = format!(
                "User-agent: *\nAllow: /\nSitemap: {}sitemap.xml\n",
                self.config.base_url
            );
            self.write_file(&mut report, "robots.txt", &robots)?;
        }

        info!(
            pages = report.pages,
            redirects = report.redirects,
            data = report.data_files,
            output = %self.config.output_dir.display(),
            "Wrote static site"
        );
        Ok(report)
    }
}

/// Inline script with the redirect map, safe to embed in HTML.
fn redirects_script(graph: &BuildLinkGraph) -> Result<String, BuildError> {
    let json = serde_json::to_string(&graph.redirect_map()).map_err(|e| BuildError::Serialize {
        what: "redirect map".to_string(),
        message: e.to_string(),
    })?;
    Ok(format!(
        r#"<script type="application/json" id="{REDIRECTS_SCRIPT_ID}">{}</script>"#,
        json.replace("</", "<\\/")
    ))
}

/// Insert `markup` before `</head>`, or at the start when there is none.
fn inject_head(html: &str, markup: &str) -> String {
    match html.find("</head>") {
        Some(pos) => format!("{}{markup}\n{}", &html[..pos], &html[pos..]),
        None => format!("{markup}\n{html}"),
    }
}

fn redirect_stub(to: &str, redirects: &str) -> String {
    let to = escape_html(to);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta http-equiv="refresh" content="0; url={to}">
  <link rel="canonical" href="{to}">
{redirects}
</head>
<body>
  <a href="{to}">Redirecting to {to}</a>
</body>
</html>
"#
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn write_error(path: &Path, e: std::io::Error) -> BuildError {
    BuildError::WriteError(format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PageRecord, RedirectRecord};
    use folio_router::SsrOutput;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn graph() -> BuildLinkGraph {
        let mut graph = BuildLinkGraph::default();
        let home = graph.add_data(&json!({ "html": "<h1>Home</h1>", "data": {} }));
        let page = |filename: &str, html: &str, id: &str| PageRecord {
            filename: filename.to_string(),
            route: "/".to_string(),
            ssr: SsrOutput {
                html: html.to_string(),
                head: String::new(),
            },
            data_ids: vec![id.to_string()],
        };
        graph.links.insert(
            "/".to_string(),
            page("index.html", "<html><head></head><body>home</body></html>", &home),
        );
        graph.links.insert(
            "/guide/".to_string(),
            page("guide/index.html", "<p>guide</p>", &home),
        );
        graph.redirects.insert(
            "/old".to_string(),
            RedirectRecord {
                to: "/guide/".to_string(),
                status: 308,
            },
        );
        graph
    }

    fn adapter(output_dir: &Path, sitemap: SitemapConfig) -> StaticAdapter {
        StaticAdapter::new(StaticAdapterConfig {
            output_dir: output_dir.to_path_buf(),
            base_url: Url::parse("https://example.com/").unwrap(),
            sitemap,
        })
    }

    #[test]
    fn writes_pages_data_and_redirects() {
        let temp = tempdir().unwrap();
        let manifest = RouteManifest::default();

        let report = adapter(temp.path(), SitemapConfig::default())
            .write(&graph(), &manifest)
            .unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!(report.redirects, 1);
        assert_eq!(report.data_files, 1);

        let home = fs::read_to_string(temp.path().join("index.html")).unwrap();
        assert!(home.contains(
            r#"<script type="application/json" id="folio-redirects">{"/old":"/guide/"}</script>
</head>"#
        ));

        let stub = fs::read_to_string(temp.path().join("old.html")).unwrap();
        assert!(stub.contains(r#"content="0; url=/guide/""#));

        assert!(temp.path().join("guide/index.html").exists());
        assert!(temp.path().join(MANIFEST_FILE).exists());
        assert!(!temp.path().join("sitemap.xml").exists());

        let id = &graph().links["/"].data_ids[0];
        let data = fs::read_to_string(temp.path().join(format!("_data/{id}.json"))).unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&data).unwrap()["html"],
            "<h1>Home</h1>"
        );
    }

    #[test]
    fn writes_sitemap_and_robots() {
        let temp = tempdir().unwrap();
        let sitemap = SitemapConfig {
            enabled: true,
            changefreq: Some("weekly".to_string()),
            priority: Some(0.5),
            lastmod: None,
        };

        adapter(temp.path(), sitemap)
            .write(&graph(), &RouteManifest::default())
            .unwrap();

        let xml = fs::read_to_string(temp.path().join("sitemap.xml")).unwrap();
        assert!(xml.contains("<loc>https://example.com/guide/</loc>"));
        assert!(xml.contains("<changefreq>weekly</changefreq>"));
        assert!(xml.contains("<priority>0.5</priority>"));
        assert!(!xml.contains("lastmod"));
        assert!(!xml.contains("/old"));

        let robots = fs::read_to_string(temp.path().join("robots.txt")).unwrap();
        assert!(robots.contains("Sitemap: https://example.com/sitemap.xml"));
    }

    #[test]
    fn escapes_closing_tags_in_the_redirect_map() {
        let mut graph = BuildLinkGraph::default();
        graph.redirects.insert(
            "/x".to_string(),
            RedirectRecord {
                to: "/</script>".to_string(),
                status: 308,
            },
        );

        let script = redirects_script(&graph).unwrap();

        assert_eq!(script.matches("</script>").count(), 1);
        assert_eq!(inject_head("<p>x</p>", "<s></s>"), "<s></s>\n<p>x</p>");
    }
}
