//! Scaffold a new folio site.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Files written by `init`, relative to the project root.
const SCAFFOLD: &[(&str, &str)] = &[
    ("folio.toml", DEFAULT_CONFIG),
    ("pages/index.md", DEFAULT_INDEX),
    ("pages/@layout.md", DEFAULT_LAYOUT),
    ("pages/@404.md", DEFAULT_NOT_FOUND),
    ("pages/guide/[1]getting-started.md", DEFAULT_GETTING_STARTED),
    ("pages/guide/[2]routing.md", DEFAULT_ROUTING),
];

/// Run the init command.
pub async fn run(root: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing folio...");

    let pages_dir = root.join("pages");
    if pages_dir.exists() && !yes {
        tracing::warn!("pages/ directory already exists. Use --yes to overwrite.");
        return Ok(());
    }

    for (file, content) in SCAFFOLD {
        let path = root.join(file);
        if path.exists() && !yes {
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {file}"))?;
        tracing::info!("Created {}", file);
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'folio dev' to start the development server.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# folio configuration

[site]
title = "My Documentation"
# Absolute URL the site is deployed to
base_url = "http://localhost/"
pages_dir = "pages"
output = "dist"

[build]
# Pages no link points to
entries = []
redirect_status = 308

[build.sitemap]
enabled = false
changefreq = "weekly"

# [[matchers]]
# name = "lang"
# pattern = "en|fr"

[server]
host = "127.0.0.1"
port = 7777
open = true
"#;

const DEFAULT_INDEX: &str = r#"---
title: Welcome
description: Documentation home
---

# Welcome

This site is built with **folio**.

Start with [Getting Started](/guide/getting-started), or read how
[routing](/guide/routing) maps files to URLs.
"#;

const DEFAULT_LAYOUT: &str = r#"<div class="site">
<nav class="site-nav"><a href="/">Home</a> <a href="/guide/getting-started">Guide</a></nav>
<slot></slot>
</div>
"#;

const DEFAULT_NOT_FOUND: &str = r#"---
title: Not found
---

# Page not found

Go back [home](/).
"#;

const DEFAULT_GETTING_STARTED: &str = r#"---
title: Getting Started
---

# Getting Started

## Development

```bash
folio dev
```

## Building

```bash
folio build
folio serve
```
"#;

const DEFAULT_ROUTING: &str = r#"---
title: Routing
---

# Routing

| File | URL |
| --- | --- |
| `pages/index.md` | `/` |
| `pages/guide/[1]getting-started.md` | `/guide/getting-started` |
| `pages/post/:id.md` | `/post/42` |
| `pages/@404.md` | anything else |

`@layout.md` wraps every page in its directory. Put `<slot></slot>` where
the page goes.
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn scaffolds_a_site() {
        let temp = tempdir().unwrap();

        run(temp.path(), false).await.unwrap();

        for (file, _) in SCAFFOLD {
            assert!(temp.path().join(file).exists(), "{file} missing");
        }
        let config = crate::config::FolioConfig::load(&temp.path().join("folio.toml")).unwrap();
        assert_eq!(config.site.title, "My Documentation");
    }

    #[tokio::test]
    async fn keeps_existing_pages_without_yes() {
        let temp = tempdir().unwrap();
        let index = temp.path().join("pages/index.md");
        fs::create_dir_all(index.parent().unwrap()).unwrap();
        fs::write(&index, "# Mine").unwrap();

        run(temp.path(), false).await.unwrap();

        assert_eq!(fs::read_to_string(&index).unwrap(), "# Mine");
        assert!(!temp.path().join("folio.toml").exists());
    }
}
