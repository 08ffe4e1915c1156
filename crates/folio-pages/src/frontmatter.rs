//! Frontmatter extraction and parsing.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Parsed frontmatter from a page file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Frontmatter {
    /// Page title
    #[serde(default)]
    pub title: Option<String>,

    /// `<meta name="description">` content
    #[serde(default)]
    pub description: Option<String>,

    /// Redirect every request for this page elsewhere
    #[serde(default)]
    pub redirect: Option<String>,

    /// Data handed to the page as loader data
    #[serde(default)]
    pub data: Option<Value>,

    /// `false` renders the page without any layout
    #[serde(default = "default_true")]
    pub layout: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Frontmatter {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            redirect: None,
            data: None,
            layout: true,
        }
    }
}

/// Frontmatter as both the typed fields and the raw key/value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFrontmatter {
    pub fields: Frontmatter,
    pub raw: Map<String, Value>,
}

/// Split a `---` delimited YAML block off the top of a page.
///
/// Returns the block, if any, and the markdown body that follows it.
pub fn extract_frontmatter(
    source: &str,
) -> Result<(Option<ExtractedFrontmatter>, &str), FrontmatterError> {
    let trimmed = source.trim_start();

    if !trimmed.starts_with("---") {
        return Ok((None, source));
    }

    let after_open = &trimmed[3..];
    let Some(close_pos) = after_open.find("\n---") else {
        return Err(FrontmatterError::Unclosed);
    };

    let yaml_content = after_open[..close_pos].trim();
    let remaining = &after_open[close_pos + 4..];

    let raw = if yaml_content.is_empty() {
        Map::new()
    } else {
        match serde_yaml::from_str::<Value>(yaml_content)
            .map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?
        {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(FrontmatterError::NotAMapping),
        }
    };

    let fields: Frontmatter = serde_json::from_value(Value::Object(raw.clone()))
        .map_err(|e| FrontmatterError::InvalidField(e.to_string()))?;

    Ok((
        Some(ExtractedFrontmatter { fields, raw }),
        remaining.trim_start(),
    ))
}

/// Errors that can occur when parsing frontmatter.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("Unclosed frontmatter block - missing closing ---")]
    Unclosed,

    #[error("Invalid YAML in frontmatter: {0}")]
    InvalidYaml(String),

    #[error("Frontmatter must be a mapping")]
    NotAMapping,

    #[error("Invalid frontmatter field: {0}")]
    InvalidField(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_valid_frontmatter() {
        let source = r#"---
title: Intro
description: Getting started
data:
  version: 2
tags: [a, b]
---

# Intro
"#;

        let (fm, content) = extract_frontmatter(source).unwrap();
        let fm = fm.unwrap();

        assert_eq!(fm.fields.title.as_deref(), Some("Intro"));
        assert_eq!(fm.fields.description.as_deref(), Some("Getting started"));
        assert_eq!(fm.fields.data, Some(json!({ "version": 2 })));
        assert!(fm.fields.layout);
        assert_eq!(fm.raw["tags"], json!(["a", "b"]));
        assert!(content.starts_with("# Intro"));
    }

    #[test]
    fn reads_redirect_and_layout_flag() {
        let source = "---\nredirect: /new\nlayout: false\n---\n";

        let (fm, _) = extract_frontmatter(source).unwrap();
        let fm = fm.unwrap().fields;

        assert_eq!(fm.redirect.as_deref(), Some("/new"));
        assert!(!fm.layout);
    }

    #[test]
    fn plain_markdown_passes_through() {
        let page = "# Routing\n\n---\n\nA thematic break is not frontmatter.";

        let (fm, body) = extract_frontmatter(page).unwrap();

        assert_eq!(fm, None);
        assert_eq!(body, page);
    }

    #[test]
    fn empty_block_gives_defaults() {
        let (fm, body) = extract_frontmatter("---
---
body").unwrap();

        assert_eq!(fm.unwrap().fields, Frontmatter::default());
        assert_eq!(body, "body");
    }

    #[test]
    fn rejects_broken_blocks() {
        assert!(matches!(
            extract_frontmatter("---
redirect: /new
# never closed"),
            Err(FrontmatterError::Unclosed)
        ));
        assert!(matches!(
            extract_frontmatter("---
data: {unbalanced
---
"),
            Err(FrontmatterError::InvalidYaml(_))
        ));
        assert!(matches!(
            extract_frontmatter("---
layout: sometimes
---
"),
            Err(FrontmatterError::InvalidField(_))
        ));
    }

    #[test]
    fn errors_on_scalar_frontmatter() {
        let result = extract_frontmatter("---\njust a string\n---\n");

        assert!(matches!(result, Err(FrontmatterError::NotAMapping)));
    }
}
