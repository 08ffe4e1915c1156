//! The link graph produced by a crawl.

use std::collections::{BTreeMap, BTreeSet};

use folio_router::SsrOutput;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Length of content hashes used as data asset ids.
pub const DATA_ID_LEN: usize = 16;

/// A rendered page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// Output file, relative to the output directory
    pub filename: String,

    /// Pattern of the matched route
    pub route: String,

    pub ssr: SsrOutput,

    /// Data assets the page uses. The first is the page payload.
    pub data_ids: Vec<String>,
}

/// A link that was not followed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadLink {
    pub reason: String,

    /// Pages containing the link
    pub referrers: BTreeSet<String>,
}

/// A redirect discovered while loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectRecord {
    pub to: String,
    pub status: u16,
}

/// Everything a crawl found, keyed by pathname.
#[derive(Debug, Clone, Default)]
pub struct BuildLinkGraph {
    pub links: BTreeMap<String, PageRecord>,
    pub bad_links: BTreeMap<String, BadLink>,
    pub redirects: BTreeMap<String, RedirectRecord>,

    /// Content-addressed JSON payloads
    pub data: BTreeMap<String, Value>,
}

impl BuildLinkGraph {
    /// Whether `pathname` was already handled in any way.
    pub fn contains(&self, pathname: &str) -> bool {
        self.links.contains_key(pathname)
            || self.bad_links.contains_key(pathname)
            || self.redirects.contains_key(pathname)
    }

    /// Store a JSON payload, returning its content hash.
    ///
    /// Identical payloads share one id.
    pub fn add_data(&mut self, value: &Value) -> String {
        let id = data_id(value);
        self.data.entry(id.clone()).or_insert_with(|| value.clone());
        id
    }

    pub fn add_bad_link(&mut self, pathname: &str, reason: &str, referrer: Option<&str>) {
        let entry = self
            .bad_links
            .entry(pathname.to_string())
            .or_insert_with(|| BadLink {
                reason: reason.to_string(),
                referrers: BTreeSet::new(),
            });
        if let Some(referrer) = referrer {
            entry.referrers.insert(referrer.to_string());
        }
    }

    /// Redirect sources mapped to their targets.
    pub fn redirect_map(&self) -> BTreeMap<String, String> {
        self.redirects
            .iter()
            .map(|(from, r)| (from.clone(), r.to.clone()))
            .collect()
    }
}

/// Content hash of a JSON value.
pub fn data_id(value: &Value) -> String {
    let serialized = value.to_string();
    let digest = Sha256::digest(serialized.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(DATA_ID_LEN);
    id
}
