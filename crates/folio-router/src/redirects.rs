//! Session redirect table.

use std::collections::HashMap;

use url::Url;

/// Redirects known to the router, keyed by URL without fragment.
///
/// Append-only for the life of a session. Cycles are not detected here; the
/// router bounds the number of hops it follows instead.
#[derive(Debug, Clone, Default)]
pub struct RedirectTable {
    redirects: HashMap<String, Url>,
}

impl RedirectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a redirect. Later inserts for the same source win.
    pub fn insert(&mut self, from: &Url, to: Url) {
        self.redirects.insert(key(from), to);
    }

    /// Target for `url`, carrying over its fragment when the target has none.
    pub fn get(&self, url: &Url) -> Option<Url> {
        let mut to = self.redirects.get(&key(url))?.clone();
        if to.fragment().is_none() {
            to.set_fragment(url.fragment());
        }
        Some(to)
    }

    pub fn len(&self) -> usize {
        self.redirects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redirects.is_empty()
    }
}

fn key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn ignores_fragments_in_keys() {
        let mut table = RedirectTable::new();
        table.insert(&url("http://x/a#top"), url("http://x/b"));

        assert_eq!(
            table.get(&url("http://x/a#part")).unwrap().as_str(),
            "http://x/b#part"
        );
        assert_eq!(table.get(&url("http://x/a")).unwrap().as_str(), "http://x/b");
        assert!(table.get(&url("http://x/c")).is_none());
        assert_eq!(table.len(), 1);
    }
}
