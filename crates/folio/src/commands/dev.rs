//! Development server command.

use std::path::Path;

use anyhow::Result;
use folio_server::DevServer;

use crate::config::FolioConfig;

/// Run the dev server.
pub async fn run(config_path: &Path, port: Option<u16>, open: bool) -> Result<()> {
    let file_config = FolioConfig::load(config_path)?;
    let mut config = file_config.dev_config()?;
    if let Some(port) = port {
        config.port = port;
    }
    config.open &= open;

    tracing::info!("Starting development server on port {}", config.port);

    DevServer::new(config).start().await?;

    Ok(())
}
