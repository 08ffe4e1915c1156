//! Page content produced by loaders.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content and data for one page or layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Rendered HTML body
    #[serde(default)]
    pub html: String,

    /// Frontmatter as parsed from the source file
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub frontmatter: Map<String, Value>,

    /// Loader data. Always a JSON object once normalized.
    #[serde(default)]
    pub data: Value,
}

impl Page {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Data as an object. Empty for pages that were never normalized.
    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_object()
    }

    /// Whether there is any data worth shipping to the client.
    pub fn has_data(&self) -> bool {
        self.data.as_object().is_some_and(|m| !m.is_empty())
    }
}

/// Replace non-object loader data with an empty object.
///
/// `null` means "no data" and passes silently. Anything else is a shape error
/// in the loader, which is logged but does not stop the navigation.
pub fn normalize_page_data(mut page: Page, pathname: &str) -> Page {
    match &page.data {
        Value::Object(_) => {}
        Value::Null => page.data = Value::Object(Map::new()),
        other => {
            tracing::warn!(
                route = pathname,
                kind = value_kind(other),
                "Loader returned non-object data, treating it as empty"
            );
            page.data = Value::Object(Map::new());
        }
    }
    page
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_bad_data_to_empty_object() {
        let page = normalize_page_data(Page::new("<p>hi</p>").with_data(json!([1, 2])), "/a");

        assert_eq!(page.data, json!({}));
        assert!(!page.has_data());
    }

    #[test]
    fn keeps_object_data() {
        let page = normalize_page_data(Page::default().with_data(json!({ "n": 1 })), "/a");

        assert_eq!(page.data, json!({ "n": 1 }));
        assert!(page.has_data());
    }

    #[test]
    fn null_data_becomes_empty_object() {
        let page = normalize_page_data(Page::default(), "/a");

        assert_eq!(page.data_object().map(Map::len), Some(0));
    }

    #[test]
    fn deserializes_sparse_payloads() {
        let page: Page = serde_json::from_str(r#"{"html":"<h1>x</h1>"}"#).unwrap();

        assert_eq!(page.html, "<h1>x</h1>");
        assert_eq!(page.title, None);
    }
}
