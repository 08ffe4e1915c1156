//! Development server with live reload for folio sites.
//!
//! Renders every request through the route table, watches the pages
//! directory and tells connected pages when routes or content change.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{
    app, apply_change, render, AppState, DevServer, DevServerConfig, ServerError, MANIFEST_PATH,
};
pub use watcher::FileWatcher;
pub use websocket::{hmr_client_script, HmrHub, HmrMessage, HMR_PATH};
