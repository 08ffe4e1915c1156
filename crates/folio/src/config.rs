//! `folio.toml` configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use folio_build::{BuildConfig, SitemapConfig};
use folio_routes::Matcher;
use folio_server::DevServerConfig;
use serde::Deserialize;
use url::Url;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FolioConfig {
    pub site: SiteConfig,
    pub build: BuildSettings,
    pub matchers: Vec<MatcherConfig>,
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    /// Absolute URL the site is served from
    pub base_url: String,
    pub pages_dir: PathBuf,
    pub output: PathBuf,
    /// Static files served by the dev server under `/assets`
    pub assets: Option<PathBuf>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Documentation".to_string(),
            base_url: "http://localhost/".to_string(),
            pages_dir: PathBuf::from("pages"),
            output: PathBuf::from("dist"),
            assets: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Crawl seeds on top of the static routes
    pub entries: Vec<String>,
    pub redirect_status: u16,
    pub sitemap: SitemapConfig,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            redirect_status: 308,
            sitemap: SitemapConfig::default(),
        }
    }
}

/// A `[[matchers]]` entry. Exactly one of `pattern` and `literal` is set.
#[derive(Debug, Deserialize)]
pub struct MatcherConfig {
    pub name: String,
    pub pattern: Option<String>,
    pub literal: Option<String>,
}

impl MatcherConfig {
    pub fn to_matcher(&self) -> Result<Matcher> {
        match (&self.pattern, &self.literal) {
            (Some(pattern), None) => Ok(Matcher::pattern(&self.name, pattern)),
            (None, Some(literal)) => Ok(Matcher::literal(&self.name, literal)),
            _ => bail!(
                "Matcher `{}` needs exactly one of `pattern` or `literal`",
                self.name
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub open: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7777,
            open: true,
        }
    }
}

impl FolioConfig {
    /// Load the config file, or the defaults when it does not exist.
    ///
    /// A file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: FolioConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// The site URL, with a trailing slash.
    pub fn base_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.site.base_url).with_context(|| {
            format!(
                "`site.base_url` must be an absolute URL such as http://localhost/, got `{}`",
                self.site.base_url
            )
        })?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn matchers(&self) -> Result<Vec<Matcher>> {
        self.matchers.iter().map(MatcherConfig::to_matcher).collect()
    }

    pub fn build_config(&self) -> Result<BuildConfig> {
        Ok(BuildConfig {
            pages_dir: self.site.pages_dir.clone(),
            output_dir: self.site.output.clone(),
            base_url: self.base_url()?,
            title: self.site.title.clone(),
            entries: self.build.entries.clone(),
            redirect_status: self.build.redirect_status,
            matchers: self.matchers()?,
            sitemap: self.build.sitemap.clone(),
        })
    }

    pub fn dev_config(&self) -> Result<DevServerConfig> {
        Ok(DevServerConfig {
            pages_dir: self.site.pages_dir.clone(),
            assets_dir: self.site.assets.clone(),
            port: self.server.port,
            host: self.server.host.clone(),
            open: self.server.open,
            title: self.site.title.clone(),
            redirect_status: self.build.redirect_status,
            matchers: self.matchers()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();

        let config = FolioConfig::load(&temp.path().join("folio.toml")).unwrap();

        assert_eq!(config.site.pages_dir, PathBuf::from("pages"));
        assert_eq!(config.build.redirect_status, 308);
        assert_eq!(config.server.port, 7777);
        assert_eq!(config.base_url().unwrap().as_str(), "http://localhost/");
    }

    #[test]
    fn parses_every_section() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("folio.toml");
        fs::write(
            &path,
            r#"
[site]
title = "Guide"
base_url = "https://example.com/docs"

[build]
entries = ["/hidden"]
redirect_status = 301

[build.sitemap]
enabled = true
changefreq = "weekly"

[[matchers]]
name = "lang"
pattern = "en|fr"

[[matchers]]
name = "version"
literal = "v2"

[server]
port = 8080
open = false
"#,
        )
        .unwrap();

        let config = FolioConfig::load(&path).unwrap();

        assert_eq!(config.site.title, "Guide");
        assert_eq!(
            config.base_url().unwrap().as_str(),
            "https://example.com/docs/"
        );
        assert_eq!(config.build.entries, vec!["/hidden"]);
        assert!(config.build.sitemap.enabled);
        assert_eq!(config.build.sitemap.changefreq.as_deref(), Some("weekly"));
        assert_eq!(config.matchers().unwrap().len(), 2);

        let dev = config.dev_config().unwrap();
        assert_eq!(dev.port, 8080);
        assert!(!dev.open);
        assert_eq!(dev.redirect_status, 301);

        let build = config.build_config().unwrap();
        assert_eq!(build.entries, vec!["/hidden"]);
        assert_eq!(build.output_dir, PathBuf::from("dist"));
    }

    #[test]
    fn rejects_ambiguous_matchers() {
        let matcher = MatcherConfig {
            name: "x".to_string(),
            pattern: Some("a".to_string()),
            literal: Some("b".to_string()),
        };

        assert!(matcher.to_matcher().is_err());
    }

    #[test]
    fn rejects_relative_base_urls() {
        let config = FolioConfig {
            site: SiteConfig {
                base_url: "/docs/".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let err = config.base_url().unwrap_err();
        assert!(err.to_string().contains("absolute URL"));
    }

    #[test]
    fn malformed_files_are_errors() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("folio.toml");
        fs::write(&path, "[site\ntitle = 1").unwrap();

        assert!(FolioConfig::load(&path).is_err());
    }
}
