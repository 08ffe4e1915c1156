//! Navigation state machine.
//!
//! A navigation goes `idle -> navigating -> idle`. Redirects loop inside the
//! navigating state, bounded by [`MAX_REDIRECTS`]. Cancellation and loader
//! errors both land back in idle.
//!
//! Overlapping navigations are allowed. Each one takes a token when it
//! starts, and only the holder of the latest token may commit, so a slow
//! loader for a superseded navigation never clobbers a newer one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use folio_routes::{CompileError, RouteOrdering, RouteTable, ScoredOrdering};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::watch;
use url::Url;

use crate::declaration::{
    load_route, LoaderContext, LoaderError, Prefetched, RouteDeclaration, RouteLoad,
};
use crate::fetch::Fetcher;
use crate::history::{History, HistoryState, MemoryHistory};
use crate::hooks::{run_before, AfterNavigate, BeforeNavigate, Decision, HookId, Hooks};
use crate::redirects::RedirectTable;
use crate::renderer::{RenderError, Renderer, SsrOutput};
use crate::scroll::{ScrollDelegate, ScrollOptions};
use crate::state::{LoadedRoute, MatchedRoute, NavigationState};

/// Maximum redirect hops followed by one navigation.
pub const MAX_REDIRECTS: usize = 20;

/// Route table shared between routers.
pub type SharedRoutes = Arc<RwLock<RouteTable<RouteDeclaration>>>;

/// Errors surfaced by [`Router::go`], [`Router::prefetch`] and [`Router::ssr`].
#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("No route matches {0}")]
    NoMatch(String),

    #[error("Too many redirects while navigating to {url} (limit {limit})")]
    RedirectLimit { url: String, limit: usize },

    #[error("Loader for {route} failed: {source}")]
    Loader {
        route: String,
        #[source]
        source: LoaderError,
    },

    #[error("No renderer configured")]
    NoRenderer,

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Where the router runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouterMode {
    /// Owns history and scroll.
    #[default]
    Client,

    /// Renders without touching history or scroll.
    Server,
}

/// Options for [`Router::go`].
#[derive(Debug, Clone)]
pub struct GoOptions {
    /// Scroll after the navigation commits
    pub scroll: bool,

    /// Replace the current history entry instead of pushing
    pub replace: bool,

    /// Keep the focused element
    pub keep_focus: bool,

    /// Extra state stored with the history entry
    pub state: Option<Value>,
}

impl Default for GoOptions {
    fn default() -> Self {
        Self {
            scroll: true,
            replace: false,
            keep_focus: false,
            state: None,
        }
    }
}

/// Result of resolving a URL without committing it.
#[derive(Debug, Clone)]
pub enum Resolution {
    Loaded(LoadedRoute),
    Redirect(Url),
}

/// Result of [`Router::ssr`].
#[derive(Debug, Clone)]
pub enum SsrResponse {
    Page(SsrOutput),
    Redirect(Url),
}

#[derive(Debug, Default)]
struct Session {
    current: Option<LoadedRoute>,

    /// History index of the current entry
    history_index: u64,

    /// Highest index handed out so far
    last_index: u64,

    /// Token of the latest navigation
    token: u64,
}

struct RouterInner {
    base_url: Url,
    mode: RouterMode,
    routes: SharedRoutes,
    redirects: RwLock<RedirectTable>,
    hooks: Mutex<Hooks>,
    history: Arc<dyn History>,
    scroll: Option<Arc<dyn ScrollDelegate>>,
    renderer: Option<Arc<dyn Renderer>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    disabled: AtomicBool,
    session: Mutex<Session>,
    state: watch::Sender<NavigationState>,
}

/// Client- and server-side router.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

/// Builder for [`Router`].
pub struct RouterBuilder {
    base_url: Url,
    mode: RouterMode,
    routes: Option<SharedRoutes>,
    ordering: Option<Arc<dyn RouteOrdering>>,
    history: Option<Arc<dyn History>>,
    scroll: Option<Arc<dyn ScrollDelegate>>,
    renderer: Option<Arc<dyn Renderer>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    disabled: bool,
}

impl RouterBuilder {
    pub fn mode(mut self, mode: RouterMode) -> Self {
        self.mode = mode;
        self
    }

    /// Share an existing route table. Takes precedence over [`ordering`](Self::ordering).
    pub fn routes(mut self, routes: SharedRoutes) -> Self {
        self.routes = Some(routes);
        self
    }

    pub fn ordering(mut self, ordering: Arc<dyn RouteOrdering>) -> Self {
        self.ordering = Some(ordering);
        self
    }

    pub fn history(mut self, history: Arc<dyn History>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn scroll(mut self, scroll: Arc<dyn ScrollDelegate>) -> Self {
        self.scroll = Some(scroll);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn build(self) -> Router {
        let routes = self.routes.unwrap_or_else(|| {
            let ordering = self.ordering.unwrap_or_else(|| Arc::new(ScoredOrdering));
            Arc::new(RwLock::new(RouteTable::with_ordering(ordering)))
        });
        let (state, _) = watch::channel(NavigationState::default());
        let history: Arc<dyn History> = match self.history {
            Some(history) => history,
            None => Arc::new(MemoryHistory::new()),
        };
        // Continue after the entry the session was loaded on.
        let start = history.state().map(|state| state.index).unwrap_or_default();

        Router {
            inner: Arc::new(RouterInner {
                base_url: self.base_url,
                mode: self.mode,
                routes,
                redirects: RwLock::new(RedirectTable::new()),
                hooks: Mutex::new(Hooks::default()),
                history,
                scroll: self.scroll,
                renderer: self.renderer,
                fetcher: self.fetcher,
                disabled: AtomicBool::new(self.disabled),
                session: Mutex::new(Session {
                    history_index: start,
                    last_index: start,
                    ..Session::default()
                }),
                state,
            }),
        }
    }
}

impl Router {
    /// Start building a router for the app mounted at `base_url`.
    pub fn builder(mut base_url: Url) -> RouterBuilder {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        RouterBuilder {
            base_url,
            mode: RouterMode::default(),
            routes: None,
            ordering: None,
            history: None,
            scroll: None,
            renderer: None,
            fetcher: None,
            disabled: false,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn mode(&self) -> RouterMode {
        self.inner.mode
    }

    pub fn routes(&self) -> &SharedRoutes {
        &self.inner.routes
    }

    /// Register a declaration, returning the handle needed to remove it.
    pub fn add_route(&self, declaration: RouteDeclaration) -> Arc<RouteDeclaration> {
        let declaration = Arc::new(declaration);
        self.inner.routes.write().add(Arc::clone(&declaration));
        declaration
    }

    pub fn remove_route(&self, declaration: &Arc<RouteDeclaration>) -> bool {
        self.inner.routes.write().remove(declaration)
    }

    /// Record a redirect consulted before matching.
    pub fn add_redirect(&self, from: &str, to: &str) -> Result<(), NavigationError> {
        let from = self.join(&self.inner.base_url, from)?;
        let to = self.join(&from, to)?;
        self.inner.redirects.write().insert(&from, to);
        Ok(())
    }

    pub fn before_navigate<F>(&self, hook: F) -> HookId
    where
        F: Fn(&mut BeforeNavigate<'_>) + Send + Sync + 'static,
    {
        self.inner.hooks.lock().add_before(Arc::new(hook))
    }

    pub fn after_navigate<F>(&self, hook: F) -> HookId
    where
        F: Fn(&AfterNavigate<'_>) + Send + Sync + 'static,
    {
        self.inner.hooks.lock().add_after(Arc::new(hook))
    }

    pub fn remove_hook(&self, id: HookId) -> bool {
        self.inner.hooks.lock().remove(id)
    }

    /// Watch navigation state changes.
    pub fn subscribe(&self) -> watch::Receiver<NavigationState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> NavigationState {
        self.inner.state.borrow().clone()
    }

    pub fn current_route(&self) -> Option<LoadedRoute> {
        self.inner.session.lock().current.clone()
    }

    /// History index of the current entry.
    pub fn history_index(&self) -> u64 {
        self.inner.session.lock().history_index
    }

    pub fn is_disabled(&self) -> bool {
        self.inner.disabled.load(Ordering::Relaxed)
    }

    /// Send every navigation to the browser.
    pub fn set_disabled(&self, disabled: bool) {
        self.inner.disabled.store(disabled, Ordering::Relaxed);
    }

    /// Whether `url` belongs to this app: same origin, under the base path.
    pub fn owns(&self, url: &Url) -> bool {
        let base = &self.inner.base_url;
        if url.origin() != base.origin() {
            return false;
        }

        let prefix = base.path();
        url.path().starts_with(prefix) || url.path() == prefix.trim_end_matches('/')
    }

    /// Resolve a path or URL. Fragment-only targets resolve against the
    /// current URL, everything else against the base URL.
    pub fn resolve(&self, target: &str) -> Result<Url, NavigationError> {
        if target.starts_with('#') {
            if let Some(current) = self.current_url() {
                return self.join(&current, target);
            }
        }
        self.join(&self.inner.base_url, target)
    }

    /// Navigate to `target`.
    ///
    /// Targets outside the app, or any target while the router is disabled,
    /// fall back to a full document navigation and never fail.
    pub async fn go(&self, target: &str, options: GoOptions) -> Result<(), NavigationError> {
        let url = self.resolve(target)?;
        self.navigate(url, options, None).await
    }

    /// Handle a browser `popstate`.
    ///
    /// Entries carrying the current history index were produced by this
    /// router and are ignored.
    pub async fn handle_popstate(
        &self,
        url: Url,
        state: Option<HistoryState>,
    ) -> Result<(), NavigationError> {
        let Some(state) = state else {
            tracing::debug!(url = %url, "Ignoring popstate without router state");
            return Ok(());
        };

        if state.index == self.history_index() {
            tracing::debug!(index = state.index, "Ignoring popstate for the current entry");
            return Ok(());
        }

        self.navigate(url, GoOptions::default(), Some(state)).await
    }

    /// Resolve redirects and run the matched route's prefetch callback.
    ///
    /// Leaves history, navigation state and hooks alone. Targets outside the
    /// app are ignored; owned targets without a route are an error.
    pub async fn prefetch(&self, target: &str) -> Result<(), NavigationError> {
        let mut url = self.resolve(target)?;
        let mut hops = 0;

        loop {
            if self.is_disabled() || !self.owns(&url) {
                return Ok(());
            }

            let redirect = self.inner.redirects.read().get(&url);
            if let Some(to) = redirect {
                url = hop(&url, to.as_str(), &mut hops)?;
                continue;
            }

            let matched = self.match_url(&url)?;
            let declaration = Arc::clone(&matched.declaration);
            if let Some(to) = &declaration.redirect {
                url = hop(&url, to, &mut hops)?;
                continue;
            }

            let Some(prefetch) = &declaration.prefetch else {
                return Ok(());
            };

            match prefetch(self.loader_context(&matched)).await {
                Ok(Prefetched::Done) => return Ok(()),
                Ok(Prefetched::Redirect(to)) => url = hop(&url, &to, &mut hops)?,
                Err(source) => {
                    return Err(NavigationError::Loader {
                        route: declaration.describe(),
                        source,
                    })
                }
            }
        }
    }

    /// Load `target` without committing anything.
    ///
    /// The first redirect is returned rather than followed, which is what an
    /// HTTP response wants.
    pub async fn load(&self, target: &str) -> Result<Resolution, NavigationError> {
        let url = self.resolve(target)?;

        let redirect = self.inner.redirects.read().get(&url);
        if let Some(to) = redirect {
            return Ok(Resolution::Redirect(to));
        }

        let matched = self.match_url(&url)?;
        if let Some(to) = &matched.declaration.redirect {
            return Ok(Resolution::Redirect(self.join(&url, to)?));
        }

        match self.run_loader(&matched).await? {
            RouteLoad::Redirect(to) => Ok(Resolution::Redirect(self.join(&url, &to)?)),
            RouteLoad::Page { page, layouts } => Ok(Resolution::Loaded(LoadedRoute {
                matched,
                page,
                layouts,
            })),
        }
    }

    /// Load and render `target` to HTML.
    pub async fn ssr(&self, target: &str) -> Result<SsrResponse, NavigationError> {
        let renderer = self
            .inner
            .renderer
            .clone()
            .ok_or(NavigationError::NoRenderer)?;

        match self.load(target).await? {
            Resolution::Redirect(to) => Ok(SsrResponse::Redirect(to)),
            Resolution::Loaded(route) => Ok(SsrResponse::Page(renderer.ssr(&route)?)),
        }
    }

    async fn navigate(
        &self,
        url: Url,
        options: GoOptions,
        popped: Option<HistoryState>,
    ) -> Result<(), NavigationError> {
        if self.is_disabled() || !self.owns(&url) {
            tracing::debug!(url = %url, "Leaving the app");
            self.inner.history.assign(&url);
            return Ok(());
        }

        if self.is_hash_change(&url) {
            self.change_hash(url, &options, popped).await;
            return Ok(());
        }

        let token = self.begin();
        match self.resolve_and_load(url.clone(), token).await {
            Ok(Some(loaded)) => {
                self.commit(token, loaded, &url, &options, popped).await;
                Ok(())
            }
            Ok(None) => {
                self.settle(token);
                Ok(())
            }
            Err(e) => {
                self.settle(token);
                if let NavigationError::Loader { route, source } = &e {
                    tracing::error!(route = %route, error = %source, "Loader failed");
                }
                Err(e)
            }
        }
    }

    /// Follow redirects, run hooks and load. `None` means the navigation was
    /// cancelled, superseded or left the app.
    async fn resolve_and_load(
        &self,
        mut url: Url,
        token: u64,
    ) -> Result<Option<LoadedRoute>, NavigationError> {
        let mut hops = 0;

        loop {
            if !self.owns(&url) {
                tracing::debug!(url = %url, "Redirected out of the app");
                self.inner.history.assign(&url);
                return Ok(None);
            }

            let redirect = self.inner.redirects.read().get(&url);
            if let Some(to) = redirect {
                url = hop(&url, to.as_str(), &mut hops)?;
                continue;
            }

            let matched = self.match_url(&url)?;

            let before = self.inner.hooks.lock().before();
            let from = self.current_route();
            match run_before(&before, from.as_ref(), &matched) {
                Decision::Cancel => {
                    tracing::debug!(url = %url, "Navigation cancelled by hook");
                    return Ok(None);
                }
                Decision::Redirect(to) => {
                    url = hop(&url, &to, &mut hops)?;
                    continue;
                }
                Decision::Proceed => {}
            }

            if let Some(to) = &matched.declaration.redirect {
                let next = hop(&url, to, &mut hops)?;
                self.inner.redirects.write().insert(&url, next.clone());
                url = next;
                continue;
            }

            self.publish(Some(url.clone()), true);
            let load = self.run_loader(&matched).await?;

            if !self.is_current(token) {
                tracing::debug!(url = %url, "Discarding superseded navigation");
                return Ok(None);
            }

            match load {
                RouteLoad::Redirect(to) => url = hop(&url, &to, &mut hops)?,
                RouteLoad::Page { page, layouts } => {
                    return Ok(Some(LoadedRoute {
                        matched,
                        page,
                        layouts,
                    }))
                }
            }
        }
    }

    async fn commit(
        &self,
        token: u64,
        loaded: LoadedRoute,
        requested: &Url,
        options: &GoOptions,
        popped: Option<HistoryState>,
    ) {
        let client = self.inner.mode == RouterMode::Client;
        let url = loaded.url().clone();

        let (previous, index) = {
            let mut session = self.inner.session.lock();
            if session.token != token {
                tracing::debug!(url = %url, "Discarding superseded navigation");
                return;
            }

            let previous = session.current.take();
            if client {
                if let (Some(scroll), Some(_)) = (&self.inner.scroll, &previous) {
                    scroll.save_position(session.history_index);
                }

                match &popped {
                    Some(state) => {
                        session.history_index = state.index;
                        // Redirected while travelling through history.
                        if &url != requested {
                            self.inner.history.replace(&url, state.clone());
                        }
                    }
                    None => {
                        session.last_index += 1;
                        let state = HistoryState {
                            index: session.last_index,
                            user: options.state.clone(),
                        };
                        if previous.is_none() || options.replace {
                            self.inner.history.replace(&url, state);
                        } else {
                            self.inner.history.push(&url, state);
                        }
                        session.history_index = session.last_index;
                    }
                }
            }

            session.current = Some(loaded.clone());
            (previous, session.history_index)
        };

        self.publish(Some(url.clone()), false);
        tracing::debug!(url = %url, route = loaded.pathname(), "Navigated");

        if !client {
            return;
        }

        if let Some(renderer) = &self.inner.renderer {
            if let Some(previous) = &previous {
                renderer.detach(previous);
            }
            renderer.attach(&loaded);
        }

        if let Some(scroll) = &self.inner.scroll {
            let restore = popped.as_ref().and_then(|state| scroll.saved_position(state));
            let scroll_options = ScrollOptions {
                enabled: options.scroll,
                hash: url.fragment().map(str::to_string),
                restore,
                keep_focus: options.keep_focus,
                index,
            };
            scroll.scroll(&scroll_options).await;
            scroll.commit();
        }

        if let Some(previous) = &previous {
            let after = self.inner.hooks.lock().after();
            let event = AfterNavigate {
                from: previous,
                to: &loaded,
            };
            for hook in after {
                hook(&event);
            }
        }
    }

    async fn change_hash(&self, url: Url, options: &GoOptions, popped: Option<HistoryState>) {
        let client = self.inner.mode == RouterMode::Client;

        let index = {
            let mut session = self.inner.session.lock();
            session.token += 1;

            if client {
                if let Some(scroll) = &self.inner.scroll {
                    scroll.save_position(session.history_index);
                }

                match &popped {
                    Some(state) => session.history_index = state.index,
                    None => {
                        session.last_index += 1;
                        let state = HistoryState {
                            index: session.last_index,
                            user: options.state.clone(),
                        };
                        if options.replace {
                            self.inner.history.replace(&url, state);
                        } else {
                            self.inner.history.push(&url, state);
                        }
                        session.history_index = session.last_index;
                    }
                }
            }

            if let Some(current) = session.current.as_mut() {
                current.matched.url = url.clone();
            }
            session.history_index
        };

        self.publish(Some(url.clone()), false);
        tracing::debug!(url = %url, "Hash changed");

        if !client {
            return;
        }

        if let Some(scroll) = &self.inner.scroll {
            let restore = popped.as_ref().and_then(|state| scroll.saved_position(state));
            scroll
                .scroll(&ScrollOptions {
                    enabled: options.scroll,
                    hash: url.fragment().map(str::to_string),
                    restore,
                    keep_focus: options.keep_focus,
                    index,
                })
                .await;
            scroll.commit();
        }
    }

    fn is_hash_change(&self, url: &Url) -> bool {
        if url.fragment().is_none() {
            return false;
        }
        let Some(current) = self.current_url() else {
            return false;
        };

        let mut a = current;
        let mut b = url.clone();
        a.set_fragment(None);
        b.set_fragment(None);
        a == b
    }

    async fn run_loader(&self, matched: &MatchedRoute) -> Result<RouteLoad, NavigationError> {
        let declaration = Arc::clone(&matched.declaration);
        load_route(&declaration, self.loader_context(matched))
            .await
            .map_err(|source| NavigationError::Loader {
                route: declaration.describe(),
                source,
            })
    }

    fn loader_context(&self, matched: &MatchedRoute) -> LoaderContext {
        LoaderContext {
            url: matched.url.clone(),
            params: matched.params.clone(),
            route: matched.declaration.route.clone(),
            fetcher: self.inner.fetcher.clone(),
        }
    }

    fn match_url(&self, url: &Url) -> Result<MatchedRoute, NavigationError> {
        let matched = self
            .inner
            .routes
            .read()
            .match_url(url)
            .ok_or_else(|| NavigationError::NoMatch(url.to_string()))?;

        Ok(MatchedRoute {
            declaration: matched.route,
            url: url.clone(),
            params: matched.params,
        })
    }

    fn current_url(&self) -> Option<Url> {
        self.inner
            .session
            .lock()
            .current
            .as_ref()
            .map(|route| route.url().clone())
    }

    fn begin(&self) -> u64 {
        let mut session = self.inner.session.lock();
        session.token += 1;
        session.token
    }

    fn is_current(&self, token: u64) -> bool {
        self.inner.session.lock().token == token
    }

    /// Return to idle unless a newer navigation owns the state.
    fn settle(&self, token: u64) {
        if self.is_current(token) {
            self.publish(self.current_url(), false);
        }
    }

    fn publish(&self, url: Option<Url>, loading: bool) {
        self.inner
            .state
            .send_replace(NavigationState { url, loading });
    }

    fn join(&self, base: &Url, target: &str) -> Result<Url, NavigationError> {
        base.join(target).map_err(|e| NavigationError::InvalidUrl {
            url: target.to_string(),
            message: e.to_string(),
        })
    }
}

fn hop(from: &Url, to: &str, hops: &mut usize) -> Result<Url, NavigationError> {
    *hops += 1;
    if *hops > MAX_REDIRECTS {
        return Err(NavigationError::RedirectLimit {
            url: from.to_string(),
            limit: MAX_REDIRECTS,
        });
    }

    let next = from.join(to).map_err(|e| NavigationError::InvalidUrl {
        url: to.to_string(),
        message: e.to_string(),
    })?;
    tracing::debug!(from = %from, to = %next, "Following redirect");
    Ok(next)
}
