//! Static site build command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use folio_build::StaticBuilder;

use crate::config::FolioConfig;

/// Run the build command.
pub async fn run(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    tracing::info!("Building static site...");

    let file_config = FolioConfig::load(config_path)?;
    let mut config = file_config.build_config()?;
    if let Some(output) = output {
        config.output_dir = output;
    }

    let result = StaticBuilder::new(config).build().await?;

    tracing::info!(
        "Built {} pages and {} redirects in {}ms",
        result.pages,
        result.redirects,
        result.duration_ms
    );
    if !result.bad_links.is_empty() {
        tracing::warn!("{} bad links, see warnings above", result.bad_links.len());
    }

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
