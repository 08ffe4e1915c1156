//! Serializable route list mirrored from the server to the client.
//!
//! The client does not see the file system, so it cannot recompute order
//! prefixes. The server ships its routes already sorted, together with their
//! scores, and the client rebuilds a table with
//! [`PresortedOrdering`](crate::PresortedOrdering).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compiler::Route;
use crate::error::CompileError;
use crate::ordering::PresortedOrdering;
use crate::table::RouteTable;

/// One route in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRoute {
    pub pathname: String,
    pub dynamic: bool,
    pub score: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl ManifestRoute {
    pub fn from_route(route: &Route) -> Self {
        Self {
            pathname: route.pathname.clone(),
            dynamic: route.dynamic,
            score: route.score,
            order: route.order,
        }
    }

    /// Recompile the pattern, keeping the server's score and order.
    pub fn to_route(&self) -> Result<Route, CompileError> {
        Route::with_score(&self.pathname, self.dynamic, self.score, self.order)
    }
}

/// Sorted routes plus the payload asset of every prebuilt page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteManifest {
    pub routes: Vec<ManifestRoute>,

    /// Static pathname -> page payload asset id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pages: BTreeMap<String, String>,

    /// Source pathname -> redirect target.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub redirects: BTreeMap<String, String>,
}

impl RouteManifest {
    /// Snapshot a table in its current match order.
    pub fn from_table<T: AsRef<Route>>(table: &RouteTable<T>) -> Self {
        Self {
            routes: table
                .iter()
                .map(|r| ManifestRoute::from_route((**r).as_ref()))
                .collect(),
            pages: BTreeMap::new(),
            redirects: BTreeMap::new(),
        }
    }

    /// Rebuild the routes in manifest order.
    pub fn to_routes(&self) -> Result<Vec<Route>, CompileError> {
        self.routes.iter().map(ManifestRoute::to_route).collect()
    }

    /// Rebuild a table that keeps the manifest order.
    pub fn to_table(&self) -> Result<RouteTable<Route>, CompileError> {
        let mut table = RouteTable::with_ordering(Arc::new(PresortedOrdering));
        for route in self.to_routes()? {
            table.add(Arc::new(route));
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn client_table_reproduces_server_order() {
        let root = Path::new("/pages");
        let mut server = RouteTable::new();
        for file in ["[2]b.md", "[1]a.md", "@404.md", "post/:id.md", "index.md"] {
            server.add(Arc::new(crate::compile(root, &root.join(file), &[]).unwrap()));
        }

        let manifest = RouteManifest::from_table(&server);
        let json = serde_json::to_string(&manifest).unwrap();
        let client = serde_json::from_str::<RouteManifest>(&json)
            .unwrap()
            .to_table()
            .unwrap();

        let server_order: Vec<_> = server.iter().map(|r| r.pathname.clone()).collect();
        let client_order: Vec<_> = client.iter().map(|r| r.pathname.clone()).collect();
        assert_eq!(client_order, server_order);

        for pathname in ["/a", "/post/42", "/nowhere", "/"] {
            assert_eq!(
                client.match_pathname(pathname).map(|m| m.route.pathname.clone()),
                server.match_pathname(pathname).map(|m| m.route.pathname.clone()),
            );
        }
    }

    #[test]
    fn omits_empty_fields() {
        let manifest = RouteManifest {
            routes: vec![ManifestRoute {
                pathname: "/".to_string(),
                dynamic: false,
                score: 1,
                order: None,
            }],
            pages: BTreeMap::new(),
            redirects: BTreeMap::new(),
        };

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "routes": [{ "pathname": "/", "dynamic": false, "score": 1 }] })
        );
    }
}
