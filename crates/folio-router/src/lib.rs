//! Navigation engine for folio sites.
//!
//! [`Router`] drives navigations through redirects, hooks and loaders.
//! History, scrolling, rendering and data fetching sit behind traits so the
//! same engine runs in the browser, in the dev server and during the build.

pub mod client;
pub mod declaration;
pub mod fetch;
pub mod history;
pub mod hooks;
pub mod local;
pub mod page;
pub mod prefetch;
pub mod redirects;
pub mod renderer;
pub mod router;
pub mod scroll;
pub mod state;

pub use client::{data_url, manifest_declarations, DATA_DIR};
pub use declaration::{
    load_route, Layout, Loaded, LoaderContext, LoaderError, Prefetched, RouteDeclaration,
    RouteLoad,
};
pub use fetch::{FetchError, Fetcher, MemoryFetcher};
pub use history::{History, HistoryState, MemoryHistory};
pub use hooks::{AfterNavigate, BeforeNavigate, HookId};
pub use local::LocalFetcher;
pub use page::{normalize_page_data, Page};
pub use prefetch::{PrefetchScheduler, PREFETCH_DELAY};
pub use redirects::RedirectTable;
pub use renderer::{RenderError, Renderer, SsrOutput};
pub use router::{
    GoOptions, NavigationError, Resolution, Router, RouterBuilder, RouterMode, SharedRoutes,
    SsrResponse, MAX_REDIRECTS,
};
pub use scroll::{
    MemoryStorage, MemoryViewport, ScrollDelegate, ScrollOptions, ScrollPosition, ScrollStorage,
    SessionScrollDelegate, Viewport,
};
pub use state::{LoadedRoute, MatchedRoute, NavigationState};
