//! Development server implementation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json,
};
use folio_build::HtmlRenderer;
use folio_pages::{PageError, Site, SourceChange};
use folio_router::{
    LoadedRoute, LocalFetcher, MatchedRoute, NavigationError, Page, Renderer, Resolution, Router,
    RouterMode, SharedRoutes,
};
use folio_routes::{file_role, FileRole, Matcher, RouteCompiler, RouteManifest};
use tower_http::services::ServeDir;
use url::Url;

use crate::watcher::FileWatcher;
use crate::websocket::{hmr_client_script, HmrHub, HmrMessage, HMR_PATH};

/// Path of the live route manifest.
pub const MANIFEST_PATH: &str = "/__routes.json";

const HMR_SCRIPT_PATH: &str = "/__hmr.js";

/// Configuration for the development server.
#[derive(Clone)]
pub struct DevServerConfig {
    /// Directory containing pages
    pub pages_dir: PathBuf,

    /// Static files served under `/assets`
    pub assets_dir: Option<PathBuf>,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// Site title
    pub title: String,

    /// Status for redirect responses
    pub redirect_status: u16,

    /// `[name]` placeholder rewrites
    pub matchers: Vec<Matcher>,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            pages_dir: PathBuf::from("pages"),
            assets_dir: None,
            port: 7777,
            host: "127.0.0.1".to_string(),
            open: true,
            title: "Documentation".to_string(),
            redirect_status: 308,
            matchers: Vec::new(),
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Invalid redirect status {0}")]
    InvalidStatus(u16),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error(transparent)]
    Pages(#[from] PageError),
}

/// Shared server state.
pub struct AppState {
    routes: SharedRoutes,
    renderer: Arc<dyn Renderer>,
    hmr: HmrHub,
    base_url: Url,
    redirect_status: StatusCode,
}

impl AppState {
    pub fn new(
        routes: SharedRoutes,
        renderer: Arc<dyn Renderer>,
        base_url: Url,
        redirect_status: u16,
    ) -> Result<Self, ServerError> {
        let redirect_status = StatusCode::from_u16(redirect_status)
            .ok()
            .filter(StatusCode::is_redirection)
            .ok_or(ServerError::InvalidStatus(redirect_status))?;

        Ok(Self {
            routes,
            renderer,
            hmr: HmrHub::new(),
            base_url,
            redirect_status,
        })
    }

    pub fn hmr(&self) -> &HmrHub {
        &self.hmr
    }

    /// A router for one request, sharing the live route table.
    fn router(&self) -> Router {
        Router::builder(self.base_url.clone())
            .mode(RouterMode::Server)
            .routes(Arc::clone(&self.routes))
            .fetcher(Arc::new(LocalFetcher::new(
                Arc::clone(&self.routes),
                self.base_url.clone(),
            )))
            .build()
    }
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Start the development server.
    pub async fn start(self) -> Result<(), ServerError> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = address
            .parse()
            .map_err(|_| ServerError::InvalidAddress(address.clone()))?;
        let base_url = Url::parse(&format!("http://{addr}/"))
            .map_err(|_| ServerError::InvalidAddress(address))?;

        // Watcher events carry absolute paths
        let pages_dir = std::fs::canonicalize(&self.config.pages_dir).map_err(|_| {
            PageError::MissingRoot(self.config.pages_dir.display().to_string())
        })?;

        let compiler =
            RouteCompiler::new(pages_dir.clone()).with_matchers(self.config.matchers.clone());
        let mut site = Site::new(compiler);
        let pages = site.load()?;
        tracing::info!(pages, "Loaded pages from {}", pages_dir.display());

        let renderer = Arc::new(HtmlRenderer::new(self.config.title.clone(), "/"));
        let state = Arc::new(AppState::new(
            Arc::clone(site.routes()),
            renderer,
            base_url.clone(),
            self.config.redirect_status,
        )?);

        let (watcher, mut rx) =
            FileWatcher::new(&[pages_dir]).map_err(|e| ServerError::WatchError(e.to_string()))?;

        let hmr = state.hmr.clone();
        tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                apply_change(&mut site, &hmr, &change);
            }
            // Keep watcher alive
            drop(watcher);
        });

        let mut app = app(Arc::clone(&state));
        if let Some(assets) = &self.config.assets_dir {
            app = app.nest_service("/assets", ServeDir::new(assets));
        }

        tracing::info!("Starting dev server at {}", base_url);

        if self.config.open {
            let _ = open::that(base_url.as_str());
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Routes of the dev server. Every path not taken by the server itself is
/// rendered from the route table.
pub fn app(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route(MANIFEST_PATH, get(manifest_handler))
        .route(HMR_PATH, get(ws_handler))
        .route(HMR_SCRIPT_PATH, get(hmr_script_handler))
        .fallback(get(page_handler))
        .with_state(state)
}

/// Reconcile the route table with a source change and notify clients.
pub fn apply_change(site: &mut Site, hmr: &HmrHub, change: &SourceChange) {
    match site.reconcile(change) {
        Ok(outcome) if outcome.routes_changed() => {
            tracing::info!(
                added = ?outcome.added,
                removed = ?outcome.removed,
                "Routes changed"
            );
            hmr.send(HmrMessage::RoutesChanged {
                added: outcome.added,
                removed: outcome.removed,
            });
        }
        Ok(_) => {
            tracing::debug!(path = %change.path().display(), "Page changed");
            hmr.send(HmrMessage::Reload);
        }
        Err(e) => {
            tracing::warn!(path = %change.path().display(), "Failed to reload page: {}", e);
            hmr.send(HmrMessage::Reload);
        }
    }
}

async fn manifest_handler(State(state): State<Arc<AppState>>) -> Json<RouteManifest> {
    let routes = state.routes.read();
    Json(RouteManifest::from_table(&*routes))
}

async fn page_handler(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let target = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    render(&state, target).await
}

/// Server-side render one request.
pub async fn render(state: &AppState, target: &str) -> Response {
    let loaded = match state.router().load(target).await {
        Ok(Resolution::Loaded(route)) => route,
        Ok(Resolution::Redirect(to)) => {
            let location = if to.origin() == state.base_url.origin() {
                match to.query() {
                    Some(query) => format!("{}?{query}", to.path()),
                    None => to.path().to_string(),
                }
            } else {
                to.to_string()
            };
            tracing::debug!(from = target, to = %location, "Redirect");
            return (state.redirect_status, [(header::LOCATION, location)]).into_response();
        }
        Err(NavigationError::NoMatch(url)) => {
            tracing::debug!(url = %url, "No route");
            return (StatusCode::NOT_FOUND, Html(error_page("Page not found"))).into_response();
        }
        Err(NavigationError::Loader { route, source }) => {
            tracing::warn!(
                route = %route,
                url = target,
                error = %source,
                "Loader failed, rendering without data"
            );
            match without_data(state, target) {
                Some(route) => route,
                None => {
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Html(error_page(&source.to_string())),
                    )
                        .into_response()
                }
            }
        }
        Err(e) => {
            tracing::error!(url = target, "Failed to load page: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(error_page(&e.to_string())),
            )
                .into_response();
        }
    };

    let status = if is_not_found(&loaded) {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };

    match state.renderer.ssr(&loaded) {
        Ok(output) => (status, Html(with_hmr_script(&output.html))).into_response(),
        Err(e) => {
            tracing::error!(url = target, "Failed to render page: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(error_page(&e.to_string())),
            )
                .into_response()
        }
    }
}

/// The matched route with an empty page and no layouts.
fn without_data(state: &AppState, target: &str) -> Option<LoadedRoute> {
    let url = state.router().resolve(target).ok()?;
    let matched = state.routes.read().match_url(&url)?;
    Some(LoadedRoute {
        matched: MatchedRoute {
            declaration: matched.route,
            url,
            params: matched.params,
        },
        page: Page::default().with_data(serde_json::Value::Object(Default::default())),
        layouts: Vec::new(),
    })
}

fn is_not_found(route: &LoadedRoute) -> bool {
    route
        .matched
        .declaration
        .source
        .as_deref()
        .is_some_and(|source| file_role(source) == FileRole::NotFound)
}

fn with_hmr_script(html: &str) -> String {
    let script = format!(r#"<script src="{HMR_SCRIPT_PATH}"></script>"#);
    match html.rfind("</body>") {
        Some(pos) => format!("{}{script}\n{}", &html[..pos], &html[pos..]),
        None => format!("{html}\n{script}"),
    }
}

fn error_page(message: &str) -> String {
    let message = message
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>folio</title></head>
<body>
  <pre>{message}</pre>
  <script src="{HMR_SCRIPT_PATH}"></script>
</body>
</html>"#
    )
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Forward notifications to one client.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.hmr.subscribe();

    if !send(&mut socket, &HmrMessage::Connected).await {
        return;
    }

    while let Ok(msg) = rx.recv().await {
        if !send(&mut socket, &msg).await {
            break;
        }
    }
}

async fn send(socket: &mut WebSocket, msg: &HmrMessage) -> bool {
    let Ok(json) = serde_json::to_string(msg) else {
        return false;
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn hmr_script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        hmr_client_script(MANIFEST_PATH),
    )
}
