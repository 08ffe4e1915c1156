//! Session history seam.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// State object stored with each history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryState {
    /// Monotonic index assigned by the router
    pub index: u64,

    /// Caller-supplied state from `GoOptions::state`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
}

impl HistoryState {
    pub fn new(index: u64) -> Self {
        Self { index, user: None }
    }
}

/// Browser history operations the router depends on.
pub trait History: Send + Sync {
    fn push(&self, url: &Url, state: HistoryState);

    fn replace(&self, url: &Url, state: HistoryState);

    /// State of the current entry.
    fn state(&self) -> Option<HistoryState>;

    /// Leave the app with a full document navigation.
    fn assign(&self, url: &Url);
}

#[derive(Debug, Default)]
struct MemoryHistoryInner {
    entries: Vec<(Url, HistoryState)>,
    cursor: usize,
    assigned: Vec<Url>,
}

/// In-memory history used for SSR and tests.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    inner: Mutex<MemoryHistoryInner>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<(Url, HistoryState)> {
        self.inner.lock().entries.clone()
    }

    /// URL of the current entry.
    pub fn current_url(&self) -> Option<Url> {
        let inner = self.inner.lock();
        inner.entries.get(inner.cursor).map(|(url, _)| url.clone())
    }

    /// URLs handed to [`History::assign`].
    pub fn assigned(&self) -> Vec<Url> {
        self.inner.lock().assigned.clone()
    }

    /// Move back one entry, returning what a `popstate` event would carry.
    pub fn back(&self) -> Option<(Url, HistoryState)> {
        let mut inner = self.inner.lock();
        if inner.cursor == 0 || inner.entries.is_empty() {
            return None;
        }
        inner.cursor -= 1;
        inner.entries.get(inner.cursor).cloned()
    }

    /// Move forward one entry.
    pub fn forward(&self) -> Option<(Url, HistoryState)> {
        let mut inner = self.inner.lock();
        if inner.cursor + 1 >= inner.entries.len() {
            return None;
        }
        inner.cursor += 1;
        inner.entries.get(inner.cursor).cloned()
    }
}

impl History for MemoryHistory {
    fn push(&self, url: &Url, state: HistoryState) {
        let mut inner = self.inner.lock();
        if !inner.entries.is_empty() {
            let keep = inner.cursor + 1;
            inner.entries.truncate(keep);
        }
        inner.entries.push((url.clone(), state));
        inner.cursor = inner.entries.len() - 1;
    }

    fn replace(&self, url: &Url, state: HistoryState) {
        let mut inner = self.inner.lock();
        if inner.entries.is_empty() {
            inner.entries.push((url.clone(), state));
            inner.cursor = 0;
        } else {
            let cursor = inner.cursor;
            inner.entries[cursor] = (url.clone(), state);
        }
    }

    fn state(&self) -> Option<HistoryState> {
        let inner = self.inner.lock();
        inner.entries.get(inner.cursor).map(|(_, state)| state.clone())
    }

    fn assign(&self, url: &Url) {
        self.inner.lock().assigned.push(url.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("http://localhost").unwrap().join(path).unwrap()
    }

    #[test]
    fn push_truncates_forward_entries() {
        let history = MemoryHistory::new();
        history.replace(&url("/a"), HistoryState::new(1));
        history.push(&url("/b"), HistoryState::new(2));
        history.push(&url("/c"), HistoryState::new(3));

        let (back, state) = history.back().unwrap();
        assert_eq!(back.path(), "/b");
        assert_eq!(state.index, 2);

        history.push(&url("/d"), HistoryState::new(4));
        let paths: Vec<_> = history
            .entries()
            .into_iter()
            .map(|(u, _)| u.path().to_string())
            .collect();
        assert_eq!(paths, vec!["/a", "/b", "/d"]);
        assert!(history.forward().is_none());
    }

    #[test]
    fn replace_overwrites_current_entry() {
        let history = MemoryHistory::new();
        history.push(&url("/a"), HistoryState::new(1));
        history.replace(&url("/b"), HistoryState::new(2));

        assert_eq!(history.entries().len(), 1);
        assert_eq!(history.current_url().unwrap().path(), "/b");
        assert_eq!(history.state().unwrap().index, 2);
    }
}
