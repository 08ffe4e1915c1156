//! Static builds for folio sites.
//!
//! Crawls every page reachable from the static routes, renders it through
//! the same loaders the dev server uses and writes the result with a
//! [`BuildAdapter`].

pub mod adapter;
pub mod builder;
pub mod crawler;
pub mod error;
pub mod graph;
pub mod links;
pub mod templates;

pub use adapter::{
    AdapterReport, BuildAdapter, SitemapConfig, StaticAdapter, StaticAdapterConfig, MANIFEST_FILE,
    REDIRECTS_SCRIPT_ID,
};
pub use builder::{BuildConfig, BuildResult, StaticBuilder};
pub use crawler::{output_filename, BuildCrawler, CrawlConfig};
pub use error::BuildError;
pub use graph::{data_id, BadLink, BuildLinkGraph, PageRecord, RedirectRecord, DATA_ID_LEN};
pub use links::{classify, extract_hrefs, Link};
pub use templates::{compose, HtmlRenderer, SLOT};
