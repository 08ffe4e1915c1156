//! HTTP client seam handed to loaders.
//!
//! Loaders never reach for a process-wide client. The router (or the build)
//! passes a [`Fetcher`] in the loader context, so same-origin requests can be
//! served locally during build and SSR.

use std::collections::HashMap;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use url::Url;

/// Errors from a [`Fetcher`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("No resource at {0}")]
    NotFound(String),

    #[error("Request to {url} failed: {message}")]
    Failed { url: String, message: String },
}

/// Fetches JSON resources.
pub trait Fetcher: Send + Sync {
    fn fetch_json<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Value, FetchError>>;
}

/// Fetcher answering from a fixed map of URLs. Records every request.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    responses: HashMap<String, Value>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: impl Into<String>, body: Value) -> Self {
        self.responses.insert(url.into(), body);
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch_json<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Value, FetchError>> {
        Box::pin(async move {
            let key = url.as_str().to_string();
            self.requests.lock().push(key.clone());
            self.responses
                .get(&key)
                .cloned()
                .ok_or(FetchError::NotFound(key))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_fetcher_serves_and_records() {
        let fetcher = MemoryFetcher::new().with_response("http://x/a.json", json!({ "a": 1 }));
        let url = Url::parse("http://x/a.json").unwrap();
        let missing = Url::parse("http://x/b.json").unwrap();

        assert_eq!(fetcher.fetch_json(&url).await.unwrap(), json!({ "a": 1 }));
        assert!(matches!(
            fetcher.fetch_json(&missing).await,
            Err(FetchError::NotFound(_))
        ));
        assert_eq!(fetcher.requests(), vec!["http://x/a.json", "http://x/b.json"]);
    }
}
