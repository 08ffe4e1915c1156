//! Preview server command.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::services::ServeDir;

/// Run the serve command.
pub async fn run(port: u16, dir: PathBuf) -> Result<()> {
    if !dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'folio build' first.",
            dir.display()
        );
    }

    let addr: SocketAddr = format!("127.0.0.1:{}", port)
        .parse()
        .context("Invalid address")?;

    tracing::info!("Serving {} at http://{}", dir.display(), addr);

    let pages = get(html_fallback).with_state(Arc::new(dir.clone()));
    let app = Router::new().fallback_service(ServeDir::new(&dir).fallback(pages));

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let url = format!("http://{}", addr);
    let _ = open::that(&url);

    axum::serve(listener, app).await?;

    Ok(())
}

/// `/a` is written as `a.html`.
async fn html_fallback(State(dir): State<Arc<PathBuf>>, uri: Uri) -> Response {
    let Some(path) = folio_routes::decode_pathname(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let relative = path.trim_matches('/');
    if relative.is_empty() || relative.split('/').any(|segment| segment == "..") {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read_to_string(dir.join(format!("{relative}.html"))).await {
        Ok(html) => Html(html).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
