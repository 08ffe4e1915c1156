//! Site assembly: page files become route declarations.
//!
//! Each page is declared with a loader that re-reads its file, so edits
//! show up without redeclaring. Only changes that affect routing (new or
//! removed files, redirects, layout ownership) go through [`Site::reconcile`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use folio_routes::{file_role, layout_marker, FileRole, RouteCompiler, RouteTable};
use folio_router::{Layout, Loaded, LoaderError, Page, RouteDeclaration, SharedRoutes};
use parking_lot::RwLock;
use serde_json::Value;

use crate::discovery::{discover, is_page_source};
use crate::error::PageError;
use crate::parser::{parse_page, ParsedPage};

/// File name of the default layout of a directory.
pub const DEFAULT_LAYOUT: &str = "@layout.md";

/// A file system change under the pages root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChange {
    Added(PathBuf),
    Removed(PathBuf),
    Modified(PathBuf),
}

impl SourceChange {
    pub fn path(&self) -> &Path {
        match self {
            Self::Added(p) | Self::Removed(p) | Self::Modified(p) => p,
        }
    }
}

/// What a reconciliation did to the route table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Pathnames of declarations added
    pub added: Vec<String>,

    /// Pathnames of declarations removed
    pub removed: Vec<String>,
}

impl Reconciled {
    /// Whether clients need a fresh route list.
    pub fn routes_changed(&self) -> bool {
        let mut added = self.added.clone();
        let mut removed = self.removed.clone();
        added.sort();
        removed.sort();
        added != removed
    }

    fn merge(&mut self, other: Reconciled) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
    }
}

/// The pages of a site, declared into a route table.
pub struct Site {
    compiler: RouteCompiler,
    routes: SharedRoutes,
    pages: BTreeMap<PathBuf, Arc<RouteDeclaration>>,
    layouts: BTreeSet<PathBuf>,
}

impl Site {
    /// Create a site with its own route table.
    pub fn new(compiler: RouteCompiler) -> Self {
        Self::with_routes(compiler, Arc::new(RwLock::new(RouteTable::new())))
    }

    /// Create a site that declares into an existing table.
    pub fn with_routes(compiler: RouteCompiler, routes: SharedRoutes) -> Self {
        Self {
            compiler,
            routes,
            pages: BTreeMap::new(),
            layouts: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.compiler.root()
    }

    pub fn routes(&self) -> &SharedRoutes {
        &self.routes
    }

    /// Declarations by source file.
    pub fn pages(&self) -> &BTreeMap<PathBuf, Arc<RouteDeclaration>> {
        &self.pages
    }

    /// Discover and declare every page under the root.
    pub fn load(&mut self) -> Result<usize, PageError> {
        let files = discover(self.compiler.root())?;

        self.layouts = files
            .iter()
            .filter(|f| f.role == FileRole::Layout)
            .map(|f| f.path.clone())
            .collect();

        for file in files.iter().filter(|f| f.role != FileRole::Layout) {
            self.declare(&file.path)?;
        }

        tracing::debug!(
            pages = self.pages.len(),
            layouts = self.layouts.len(),
            "Loaded site"
        );
        Ok(self.pages.len())
    }

    /// Apply a file system change to the route table.
    pub fn reconcile(&mut self, change: &SourceChange) -> Result<Reconciled, PageError> {
        let path = change.path();
        if !is_page_source(path) || !path.starts_with(self.compiler.root()) {
            return Ok(Reconciled::default());
        }

        if file_role(path) == FileRole::Layout {
            let changed = match change {
                SourceChange::Added(_) => self.layouts.insert(path.to_path_buf()),
                SourceChange::Removed(_) => self.layouts.remove(path),
                SourceChange::Modified(_) => false,
            };
            return if changed { self.redeclare_all() } else { Ok(Reconciled::default()) };
        }

        // A file that fails to compile or parse keeps its previous route.
        let replacement = match change {
            SourceChange::Removed(_) => None,
            _ => Some(self.declaration(path)?),
        };

        let mut outcome = Reconciled::default();
        if let Some(previous) = self.undeclare(path) {
            outcome.removed.push(previous);
        }
        if let Some(declaration) = replacement {
            outcome.added.push(self.insert(path, declaration));
        }

        tracing::debug!(path = %path.display(), ?outcome, "Reconciled page");
        Ok(outcome)
    }

    fn redeclare_all(&mut self) -> Result<Reconciled, PageError> {
        let mut outcome = Reconciled::default();
        let replacements = self
            .pages
            .keys()
            .map(|path| Ok((path.clone(), self.declaration(path)?)))
            .collect::<Result<Vec<_>, PageError>>()?;

        for (path, declaration) in replacements {
            let mut single = Reconciled::default();
            if let Some(previous) = self.undeclare(&path) {
                single.removed.push(previous);
            }
            single.added.push(self.insert(&path, declaration));
            outcome.merge(single);
        }

        Ok(outcome)
    }

    fn undeclare(&mut self, path: &Path) -> Option<String> {
        let declaration = self.pages.remove(path)?;
        self.routes.write().remove(&declaration);
        Some(declaration.route.pathname.clone())
    }

    fn declare(&mut self, path: &Path) -> Result<String, PageError> {
        let declaration = self.declaration(path)?;
        Ok(self.insert(path, declaration))
    }

    fn declaration(&self, path: &Path) -> Result<Arc<RouteDeclaration>, PageError> {
        let route = self.compiler.compile(path)?;
        let parsed = read_parsed(path)?;

        let declaration = match parsed.frontmatter.redirect {
            Some(to) => RouteDeclaration::redirect(route, to),
            None => {
                let file = path.to_path_buf();
                let mut declaration =
                    RouteDeclaration::new(route, move |_| load_page(file.clone()));
                if parsed.frontmatter.layout {
                    for layout in self.layouts_for(path) {
                        declaration = declaration.with_layout(layout_loader(self.root(), layout));
                    }
                }
                declaration
            }
        }
        .with_source(path);

        Ok(Arc::new(declaration))
    }

    fn insert(&mut self, path: &Path, declaration: Arc<RouteDeclaration>) -> String {
        let pathname = declaration.route.pathname.clone();
        self.routes.write().add(Arc::clone(&declaration));
        self.pages.insert(path.to_path_buf(), declaration);
        pathname
    }

    /// Layout files owning `path`, outermost first.
    ///
    /// A page with a layout marker (`intro@wide.md`) is wrapped only by the
    /// nearest `@layout.wide.md`. Other pages nest every default layout from
    /// the root down to their directory.
    pub fn layouts_for(&self, path: &Path) -> Vec<PathBuf> {
        let root = self.compiler.root();
        let mut dirs: Vec<&Path> = path
            .ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(root))
            .collect();
        dirs.reverse();

        if let Some(name) = layout_marker(path) {
            let file = format!("@layout.{name}.md");
            let named = dirs
                .iter()
                .rev()
                .map(|dir| dir.join(&file))
                .find(|candidate| self.layouts.contains(candidate));
            match named {
                Some(layout) => return vec![layout],
                None => tracing::warn!(
                    path = %path.display(),
                    layout = %name,
                    "Named layout not found, using default layouts"
                ),
            }
        }

        dirs.iter()
            .map(|dir| dir.join(DEFAULT_LAYOUT))
            .filter(|candidate| self.layouts.contains(candidate))
            .collect()
    }
}

fn read_parsed(path: &Path) -> Result<ParsedPage, PageError> {
    let source = fs::read_to_string(path).map_err(|e| PageError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    parse_page(&source).map_err(|source| PageError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Read and parse a page file into a [`Page`].
pub async fn read_page(path: &Path) -> Result<(Page, Option<String>), LoaderError> {
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoaderError::Source {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let parsed = parse_page(&source).map_err(|e| LoaderError::Source {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let redirect = parsed.frontmatter.redirect.clone();
    Ok((to_page(parsed), redirect))
}

fn to_page(parsed: ParsedPage) -> Page {
    Page {
        title: parsed.title().map(str::to_string),
        html: parsed.html,
        frontmatter: parsed.raw_frontmatter,
        data: parsed.frontmatter.data.unwrap_or(Value::Null),
    }
}

async fn load_page(path: PathBuf) -> Result<Loaded, LoaderError> {
    let (page, redirect) = read_page(&path).await?;
    Ok(match redirect {
        Some(to) => Loaded::Redirect(to),
        None => Loaded::Page(page),
    })
}

fn layout_loader(root: &Path, path: PathBuf) -> Layout {
    let id = path
        .strip_prefix(root)
        .unwrap_or(&path)
        .to_string_lossy()
        .into_owned();

    Layout::new(id, move |_| {
        let path = path.clone();
        async move { read_page(&path).await.map(|(page, _)| page) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_router::{Resolution, Router};
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};
    use url::Url;

    fn write(root: &Path, file: &str, content: &str) {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> (TempDir, Site) {
        let temp = tempdir().unwrap();
        let root = temp.path().join("pages");
        write(&root, "index.md", "# Home");
        write(&root, "@layout.md", "<div class=\"root\"></div>");
        write(&root, "@404.md", "# Not found");
        write(&root, "guide/@layout.md", "<div class=\"guide\"></div>");
        write(&root, "guide/[2]setup.md", "# Setup");
        write(&root, "guide/[1]intro.md", "---\ndata:\n  step: 1\n---\n# Intro");
        write(&root, "guide/bare.md", "---\nlayout: false\n---\n# Bare");
        write(&root, "@layout.wide.md", "<div class=\"wide\"></div>");
        write(&root, "guide/landing@wide.md", "# Landing");
        write(&root, "old.md", "---\nredirect: /guide/intro\n---\n");
        write(&root, "post/:id.md", "# Post");

        let mut site = Site::new(RouteCompiler::new(root));
        site.load().unwrap();
        (temp, site)
    }

    fn router(site: &Site) -> Router {
        Router::builder(Url::parse("http://localhost/").unwrap())
            .routes(Arc::clone(site.routes()))
            .build()
    }

    fn pathnames(site: &Site) -> Vec<String> {
        site.routes()
            .read()
            .iter()
            .map(|d| d.route.pathname.clone())
            .collect()
    }

    #[test]
    fn declares_pages_in_match_order() {
        let (_temp, site) = fixture();

        assert_eq!(
            pathnames(&site),
            vec![
                "/guide/intro",
                "/guide/setup",
                "/guide/bare",
                "/guide/landing",
                "/post/:id",
                "/",
                "/old",
                "/(.*)",
            ]
        );
    }

    #[tokio::test]
    async fn loads_pages_with_nested_layouts() {
        let (_temp, site) = fixture();
        let router = router(&site);

        let Resolution::Loaded(route) = router.load("/guide/intro").await.unwrap() else {
            panic!("expected a page");
        };

        assert_eq!(route.page.title.as_deref(), Some("Intro"));
        assert_eq!(route.page.data, serde_json::json!({ "step": 1 }));
        let layouts: Vec<_> = route.layouts.iter().map(|l| l.html.trim()).collect();
        assert_eq!(
            layouts,
            vec!["<div class=\"root\"></div>", "<div class=\"guide\"></div>"]
        );
    }

    #[tokio::test]
    async fn honours_layout_opt_outs_and_named_layouts() {
        let (_temp, site) = fixture();
        let router = router(&site);

        let Resolution::Loaded(bare) = router.load("/guide/bare").await.unwrap() else {
            panic!("expected a page");
        };
        assert!(bare.layouts.is_empty());

        let Resolution::Loaded(landing) = router.load("/guide/landing").await.unwrap() else {
            panic!("expected a page");
        };
        assert_eq!(landing.layouts.len(), 1);
        assert!(landing.layouts[0].html.contains("wide"));
    }

    #[tokio::test]
    async fn frontmatter_redirects_and_catch_all() {
        let (_temp, site) = fixture();
        let router = router(&site);

        let Resolution::Redirect(to) = router.load("/old").await.unwrap() else {
            panic!("expected a redirect");
        };
        assert_eq!(to.path(), "/guide/intro");

        let Resolution::Loaded(missing) = router.load("/nowhere/at/all").await.unwrap() else {
            panic!("expected the not-found page");
        };
        assert_eq!(missing.pathname(), "/(.*)");
    }

    #[test]
    fn reconciles_added_and_removed_pages() {
        let (temp, mut site) = fixture();
        let root = temp.path().join("pages");

        write(&root, "faq.md", "# FAQ");
        let added = site.reconcile(&SourceChange::Added(root.join("faq.md"))).unwrap();
        assert_eq!(added.added, vec!["/faq"]);
        assert!(added.routes_changed());
        assert!(site.routes().read().test("/faq"));

        let modified = site
            .reconcile(&SourceChange::Modified(root.join("faq.md")))
            .unwrap();
        assert!(!modified.routes_changed());

        fs::remove_file(root.join("faq.md")).unwrap();
        let removed = site
            .reconcile(&SourceChange::Removed(root.join("faq.md")))
            .unwrap();
        assert_eq!(removed.removed, vec!["/faq"]);
        assert!(!pathnames(&site).contains(&"/faq".to_string()));

        let ignored = site
            .reconcile(&SourceChange::Added(root.join("notes.txt")))
            .unwrap();
        assert_eq!(ignored, Reconciled::default());
    }

    #[test]
    fn broken_saves_keep_the_previous_route() {
        let (temp, mut site) = fixture();
        let root = temp.path().join("pages");
        write(&root, "faq.md", "# FAQ");
        site.reconcile(&SourceChange::Added(root.join("faq.md")))
            .unwrap();

        write(&root, "faq.md", "---\nlayout: sometimes\n---\n# FAQ");
        let result = site.reconcile(&SourceChange::Modified(root.join("faq.md")));

        assert!(result.is_err());
        assert!(site.routes().read().test("/faq"));
        assert!(site.pages().contains_key(&root.join("faq.md")));
    }

    #[tokio::test]
    async fn new_layouts_apply_to_existing_pages() {
        let (temp, mut site) = fixture();
        let root = temp.path().join("pages");
        write(&root, "post/@layout.md", "<div class=\"post\"></div>");

        let outcome = site
            .reconcile(&SourceChange::Added(root.join("post/@layout.md")))
            .unwrap();
        assert!(!outcome.routes_changed());

        let Resolution::Loaded(post) = router(&site).load("/post/1").await.unwrap() else {
            panic!("expected a page");
        };
        assert_eq!(post.layouts.len(), 2);
        assert_eq!(post.params().get("id").map(String::as_str), Some("1"));
    }
}
