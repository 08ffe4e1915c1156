//! Ordered route table.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::compiler::Route;
use crate::ordering::{RouteOrdering, ScoredOrdering};
use crate::pattern::Params;

/// A route that matched a pathname.
#[derive(Debug)]
pub struct Matched<T> {
    /// The matching entry.
    pub route: Arc<T>,

    /// Extracted parameters.
    pub params: Params,
}

impl<T> Clone for Matched<T> {
    fn clone(&self) -> Self {
        Self {
            route: Arc::clone(&self.route),
            params: self.params.clone(),
        }
    }
}

/// Ordered collection of routes.
///
/// Entries are anything that exposes a [`Route`], so the same table type
/// holds bare routes on the server and declarations with loaders on the
/// client. Entries are compared by reference for `add`/`remove`.
pub struct RouteTable<T> {
    entries: Vec<Arc<T>>,
    ordering: Arc<dyn RouteOrdering>,
}

impl<T: AsRef<Route>> RouteTable<T> {
    /// Create a table that scores routes itself.
    pub fn new() -> Self {
        Self::with_ordering(Arc::new(ScoredOrdering))
    }

    /// Create a table with an explicit ordering strategy.
    pub fn with_ordering(ordering: Arc<dyn RouteOrdering>) -> Self {
        Self {
            entries: Vec::new(),
            ordering,
        }
    }

    pub fn ordering(&self) -> &Arc<dyn RouteOrdering> {
        &self.ordering
    }

    /// Add a route. Adding the same entry twice is a no-op.
    ///
    /// Returns whether the table changed.
    pub fn add(&mut self, route: Arc<T>) -> bool {
        if self.contains(&route) {
            return false;
        }
        self.entries.push(route);
        self.sort();
        true
    }

    /// Remove a route. Returns whether it was present.
    pub fn remove(&mut self, route: &Arc<T>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|r| !Arc::ptr_eq(r, route));
        let removed = self.entries.len() != before;
        if removed {
            self.sort();
        }
        removed
    }

    /// Whether this exact entry is registered.
    pub fn contains(&self, route: &Arc<T>) -> bool {
        self.entries.iter().any(|r| Arc::ptr_eq(r, route))
    }

    /// Match a URL's pathname. The first route in table order wins.
    pub fn match_url(&self, url: &Url) -> Option<Matched<T>> {
        self.match_pathname(url.path())
    }

    /// Match a raw (possibly percent-encoded) pathname.
    pub fn match_pathname(&self, pathname: &str) -> Option<Matched<T>> {
        let decoded = decode_pathname(pathname)?;

        self.entries.iter().find_map(|entry| {
            self.ordering
                .matches((**entry).as_ref(), &decoded)
                .map(|params| Matched {
                    route: Arc::clone(entry),
                    params,
                })
        })
    }

    /// Whether any route matches the pathname.
    pub fn test(&self, pathname: &str) -> bool {
        self.match_pathname(pathname).is_some()
    }

    /// Entries in match order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sort(&mut self) {
        let ordering = Arc::clone(&self.ordering);
        // Stable, so equal routes keep insertion order.
        self.entries
            .sort_by(|a, b| ordering.compare((**a).as_ref(), (**b).as_ref()));
    }
}

impl<T: AsRef<Route>> Default for RouteTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: AsRef<Route>> fmt::Debug for RouteTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field(
                "routes",
                &self
                    .entries
                    .iter()
                    .map(|r| (**r).as_ref().pathname.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("ordering", &self.ordering)
            .finish()
    }
}

/// Percent-decode a pathname. Returns `None` if it is not valid UTF-8.
pub fn decode_pathname(pathname: &str) -> Option<Cow<'_, str>> {
    percent_decode_str(pathname).decode_utf8().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::ordering::PresortedOrdering;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn route(pathname: &str) -> Arc<Route> {
        Arc::new(Route::new(pathname, None).unwrap())
    }

    fn pathnames(table: &RouteTable<Route>) -> Vec<&str> {
        table.iter().map(|r| r.pathname.as_str()).collect()
    }

    #[test]
    fn sorts_by_specificity() {
        let mut table = RouteTable::new();
        table.add(route("/(.*)"));
        table.add(route("/post/:id"));
        table.add(route("/"));
        table.add(route("/post/new"));

        assert_eq!(pathnames(&table), vec!["/post/new", "/post/:id", "/", "/(.*)"]);
    }

    #[test]
    fn add_is_idempotent() {
        let mut table = RouteTable::new();
        let r = route("/a");

        assert!(table.add(Arc::clone(&r)));
        assert!(!table.add(Arc::clone(&r)));
        assert_eq!(table.len(), 1);

        // Equal but distinct routes are separate entries.
        assert!(table.add(route("/a")));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn removes_by_reference() {
        let mut table = RouteTable::new();
        let a = route("/a");
        let b = route("/b");
        table.add(Arc::clone(&a));
        table.add(Arc::clone(&b));

        assert!(table.remove(&a));
        assert!(!table.remove(&a));
        assert_eq!(pathnames(&table), vec!["/b"]);
    }

    #[test]
    fn order_prefix_breaks_ties() {
        let root = Path::new("/pages");
        let mut table = RouteTable::new();
        table.add(Arc::new(compile(root, &root.join("[2]b.md"), &[]).unwrap()));
        table.add(Arc::new(compile(root, &root.join("[1]a.md"), &[]).unwrap()));

        assert_eq!(pathnames(&table), vec!["/a", "/b"]);
    }

    #[test]
    fn insertion_order_breaks_remaining_ties() {
        let mut table = RouteTable::new();
        table.add(route("/b"));
        table.add(route("/a"));

        assert_eq!(pathnames(&table), vec!["/b", "/a"]);
    }

    #[test]
    fn matches_first_route_with_params() {
        let mut table = RouteTable::new();
        table.add(route("/"));
        table.add(route("/post/:id"));
        table.add(route("/(.*)"));

        let url = Url::parse("http://localhost/post/42").unwrap();
        let matched = table.match_url(&url).unwrap();
        assert_eq!(matched.route.pathname, "/post/:id");
        assert_eq!(matched.params.get("id").map(String::as_str), Some("42"));

        let missing = table.match_pathname("/missing").unwrap();
        assert_eq!(missing.route.pathname, "/(.*)");

        assert_eq!(table.match_pathname("/").unwrap().route.pathname, "/");
    }

    #[test]
    fn static_routes_round_trip() {
        let root = Path::new("/pages");
        let mut table = RouteTable::new();
        for file in ["index.md", "docs/intro.md", "docs/index.md", "about.md", "@404.md"] {
            table.add(Arc::new(compile(root, &root.join(file), &[]).unwrap()));
        }

        let statics: Vec<Arc<Route>> = table.iter().filter(|r| !r.dynamic).cloned().collect();
        for r in statics {
            let url = Url::parse("http://localhost")
                .unwrap()
                .join(&r.pathname)
                .unwrap();
            let matched = table.match_url(&url).unwrap();
            assert!(Arc::ptr_eq(&matched.route, &r), "{}", r.pathname);
        }
    }

    #[test]
    fn decodes_percent_encoded_pathnames() {
        let mut table = RouteTable::new();
        table.add(route("/tag/:name"));

        let matched = table.match_pathname("/tag/hello%20world").unwrap();
        assert_eq!(
            matched.params.get("name").map(String::as_str),
            Some("hello world")
        );
        assert!(!table.test("/tag/%FF"));
    }

    #[test]
    fn presorted_tables_keep_insertion_order() {
        let mut table = RouteTable::with_ordering(Arc::new(PresortedOrdering));
        table.add(route("/(.*)"));
        table.add(route("/docs"));

        assert_eq!(pathnames(&table), vec!["/(.*)", "/docs"]);
        assert_eq!(table.match_pathname("/docs").unwrap().route.pathname, "/(.*)");
    }
}
