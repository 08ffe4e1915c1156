//! Route compilation from file system paths.
//!
//! A page file such as `pages/guide/[1]intro.md` becomes the route
//! `/guide/intro` with order `1`. The conventions understood here:
//!
//! - `[N]name.ext`: order prefix, used only as a sort tie-break
//! - `index.ext`: resolves to the directory (`/guide/`)
//! - `@404.ext`: not-found marker, compiled to the catch-all `<dir>/(.*)`
//! - `@layout.ext`: a layout, never a route; `@layout.name.ext` is a named layout
//! - `name@layout-name.ext`: page owned by a named layout; the marker is stripped
//! - `(group)/` and `_markdoc/` directories: stripped from the route
//! - `[name]`: placeholder substituted by the matcher of the same name

use std::fmt;
use std::path::{Component, Path};
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::CompileError;
use crate::pattern::{check_embeddable, CompiledPattern};
use crate::score::score;

/// Basename stem marking a not-found page.
pub const NOT_FOUND_MARKER: &str = "@404";

/// Basename stem marking a layout.
pub const LAYOUT_MARKER: &str = "@layout";

/// Directory holding markdoc tag and node definitions.
pub const MARKDOC_DIR: &str = "_markdoc";

static ORDER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(\d+)\]").expect("valid order prefix regex"));

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([A-Za-z_][A-Za-z0-9_]*)\]").expect("valid placeholder regex")
});

/// A compiled, matchable route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Pathname in URL pattern syntax.
    pub pathname: String,

    /// Compiled matcher for `pathname`.
    pub pattern: CompiledPattern,

    /// Whether the route matches a family of URLs.
    pub dynamic: bool,

    /// Relative specificity. Only meaningful compared to other scores.
    pub score: u64,

    /// Order prefix from the file name.
    pub order: Option<u32>,
}

impl Route {
    /// Build a route from a pathname, as done for programmatic registration.
    pub fn new(pathname: &str, order: Option<u32>) -> Result<Self, CompileError> {
        finish(pathname.to_string(), false, order)
    }

    /// Build a route keeping a score computed elsewhere.
    pub fn with_score(
        pathname: &str,
        dynamic: bool,
        score: u64,
        order: Option<u32>,
    ) -> Result<Self, CompileError> {
        let pattern = CompiledPattern::new(pathname, !dynamic)?;
        Ok(Self {
            pathname: pathname.to_string(),
            pattern,
            dynamic,
            score,
            order,
        })
    }
}

impl AsRef<Route> for Route {
    fn as_ref(&self) -> &Route {
        self
    }
}

/// Context handed to function matchers.
#[derive(Debug, Clone, Copy)]
pub struct MatcherContext<'a> {
    /// The page file being compiled.
    pub file_path: &'a Path,
}

type RewriteFn = dyn Fn(&str, &MatcherContext<'_>) -> Option<String> + Send + Sync;

/// Rewrites applied to a route pathname during compilation.
#[derive(Clone)]
pub enum Matcher {
    /// `[name]` becomes the inline capture group `:name(regex)`.
    Pattern { name: String, regex: String },

    /// `[name]` is replaced verbatim.
    Literal { name: String, value: String },

    /// Arbitrary rewrite. Returning `None` leaves the pathname unchanged.
    Rewrite(Arc<RewriteFn>),
}

impl Matcher {
    pub fn pattern(name: impl Into<String>, regex: impl Into<String>) -> Self {
        Self::Pattern {
            name: name.into(),
            regex: regex.into(),
        }
    }

    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Literal {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn rewrite<F>(f: F) -> Self
    where
        F: Fn(&str, &MatcherContext<'_>) -> Option<String> + Send + Sync + 'static,
    {
        Self::Rewrite(Arc::new(f))
    }

    fn validate(&self) -> Result<(), CompileError> {
        let (name, regex) = match self {
            Self::Pattern { name, regex } => (name, Some(regex)),
            Self::Literal { name, .. } => (name, None),
            Self::Rewrite(_) => return Ok(()),
        };

        let valid_name = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(CompileError::InvalidMatcher {
                name: name.clone(),
                reason: "name must be an identifier".to_string(),
            });
        }

        if let Some(regex) = regex {
            if regex.is_empty() {
                return Err(CompileError::InvalidMatcher {
                    name: name.clone(),
                    reason: "regex is empty".to_string(),
                });
            }
            check_embeddable(regex).map_err(|reason| CompileError::InvalidMatcher {
                name: name.clone(),
                reason,
            })?;
        }

        Ok(())
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern { name, regex } => write!(f, "Pattern([{name}] = {regex})"),
            Self::Literal { name, value } => write!(f, "Literal([{name}] = {value:?})"),
            Self::Rewrite(_) => f.write_str("Rewrite(..)"),
        }
    }
}

/// What a file under the routes root is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Page,
    NotFound,
    Layout,
}

/// Classify a file by its basename.
pub fn file_role(file_path: &Path) -> FileRole {
    let stem = file_stem(file_path);
    let stem = ORDER_PREFIX.replace(&stem, "");
    match stem.as_ref() {
        NOT_FOUND_MARKER => FileRole::NotFound,
        s if is_layout_stem(s) => FileRole::Layout,
        _ => FileRole::Page,
    }
}

/// Name of a named layout file (`@layout.wide.md` -> `wide`).
pub fn layout_name(file_path: &Path) -> Option<String> {
    let stem = file_stem(file_path);
    stem.strip_prefix(LAYOUT_MARKER)?
        .strip_prefix('.')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Named layout marker embedded in a page file name (`intro@wide.md` -> `wide`).
pub fn layout_marker(file_path: &Path) -> Option<String> {
    let stem = file_stem(file_path);
    let (_, marker) = split_layout_marker(&stem);
    marker.map(str::to_string)
}

/// Compiles page files below a routes root.
#[derive(Debug, Clone)]
pub struct RouteCompiler {
    root: std::path::PathBuf,
    matchers: Vec<Matcher>,
}

impl RouteCompiler {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root: root.into(),
            matchers: Vec::new(),
        }
    }

    /// Append a matcher. Matchers apply in registration order.
    pub fn matcher(mut self, matcher: Matcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn with_matchers(mut self, matchers: Vec<Matcher>) -> Self {
        self.matchers.extend(matchers);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn compile(&self, file_path: &Path) -> Result<Route, CompileError> {
        compile(&self.root, file_path, &self.matchers)
    }
}

/// Compile a page file into a route.
pub fn compile(
    routes_root: &Path,
    file_path: &Path,
    matchers: &[Matcher],
) -> Result<Route, CompileError> {
    for matcher in matchers {
        matcher.validate()?;
    }

    let relative = file_path
        .strip_prefix(routes_root)
        .map_err(|_| CompileError::OutsideRoot {
            path: file_path.display().to_string(),
            root: routes_root.display().to_string(),
        })?;

    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let basename = segments
        .pop()
        .ok_or_else(|| CompileError::NotRoutable(file_path.display().to_string()))?;

    let order = ORDER_PREFIX
        .captures(&basename)
        .and_then(|c| c[1].parse::<u32>().ok());

    let stem = file_stem(Path::new(&basename));
    let stem = ORDER_PREFIX.replace(&stem, "").into_owned();

    let dirs: Vec<String> = segments
        .iter()
        .map(|s| ORDER_PREFIX.replace(s, "").into_owned())
        .filter(|s| !is_metadata_dir(s))
        .collect();

    if is_layout_stem(&stem) {
        return Err(CompileError::NotRoutable(file_path.display().to_string()));
    }

    if stem == NOT_FOUND_MARKER {
        let mut pathname = String::from("/");
        for dir in &dirs {
            pathname.push_str(dir);
            pathname.push('/');
        }
        pathname.push_str("(.*)");
        return finish(pathname, true, order);
    }

    let (name, _) = split_layout_marker(&stem);

    let mut pathname = String::from("/");
    pathname.push_str(&dirs.join("/"));
    if name == "index" {
        if !dirs.is_empty() {
            pathname.push('/');
        }
    } else {
        if !dirs.is_empty() {
            pathname.push('/');
        }
        pathname.push_str(name);
    }

    let ctx = MatcherContext { file_path };
    let pathname = apply_matchers(pathname, matchers, &ctx)?;

    finish(pathname, false, order)
}

/// Substitute placeholders and apply rewrites, in registration order.
fn apply_matchers(
    mut pathname: String,
    matchers: &[Matcher],
    ctx: &MatcherContext<'_>,
) -> Result<String, CompileError> {
    for matcher in matchers {
        match matcher {
            Matcher::Pattern { name, regex } => {
                pathname = replace_placeholder(&pathname, name, &format!(":{name}({regex})"));
            }
            Matcher::Literal { name, value } => {
                pathname = replace_placeholder(&pathname, name, value);
            }
            Matcher::Rewrite(rewrite) => {
                if let Some(rewritten) = rewrite(&pathname, ctx) {
                    pathname = rewritten;
                }
            }
        }
    }

    if let Some(captures) = PLACEHOLDER.captures(&pathname) {
        return Err(CompileError::UnknownPlaceholder {
            path: ctx.file_path.display().to_string(),
            name: captures[1].to_string(),
        });
    }

    Ok(pathname)
}

fn replace_placeholder(pathname: &str, name: &str, replacement: &str) -> String {
    pathname.replace(&format!("[{name}]"), replacement)
}

/// Compile the final pathname, deciding dynamic-ness and score.
fn finish(pathname: String, catch_all: bool, order: Option<u32>) -> Result<Route, CompileError> {
    let probe = CompiledPattern::new(&pathname, false)?;
    let dynamic = catch_all || probe.is_dynamic();

    let (pathname, pattern) = if dynamic {
        (pathname, probe)
    } else {
        let normalized = normalize_static(&pathname);
        let pattern = CompiledPattern::new(&normalized, true)?;
        (normalized, pattern)
    };

    let score = score(&pathname);

    Ok(Route {
        pathname,
        pattern,
        dynamic,
        score,
        order,
    })
}

/// Lower-case a static pathname, collapse repeated slashes and ensure a leading slash.
pub fn normalize_static(pathname: &str) -> String {
    let mut normalized = String::with_capacity(pathname.len() + 1);
    if !pathname.starts_with('/') {
        normalized.push('/');
    }
    for c in pathname.chars() {
        if c == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.extend(c.to_lowercase());
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

fn is_layout_stem(stem: &str) -> bool {
    stem == LAYOUT_MARKER || stem.starts_with(&format!("{LAYOUT_MARKER}."))
}

fn is_metadata_dir(segment: &str) -> bool {
    segment == MARKDOC_DIR || (segment.starts_with('(') && segment.ends_with(')'))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn split_layout_marker(stem: &str) -> (&str, Option<&str>) {
    match stem.find('@') {
        Some(pos) if pos > 0 => (&stem[..pos], Some(&stem[pos + 1..])),
        _ => (stem, None),
    }
}
