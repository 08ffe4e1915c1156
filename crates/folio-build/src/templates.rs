//! HTML document rendering for loaded routes.

use folio_router::{LoadedRoute, Page, RenderError, Renderer, SsrOutput};
use minijinja::{context, Environment};

/// Placeholder a layout marks its content position with.
pub const SLOT: &str = "<slot></slot>";

/// Server-side renderer producing complete HTML documents.
///
/// Layouts wrap the page outermost first. Each layout's [`SLOT`] is replaced
/// by everything nested inside it; a layout without a slot gets the content
/// appended.
pub struct HtmlRenderer {
    env: Environment<'static>,
    site_title: String,
    base_url: String,
}

impl HtmlRenderer {
    pub fn new(site_title: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut env = Environment::new();

        env.add_template("document.html", DOCUMENT_TEMPLATE)
            .expect("valid document template");
        env.add_template("head.html", HEAD_TEMPLATE)
            .expect("valid head template");

        Self {
            env,
            site_title: site_title.into(),
            base_url: base_url.into(),
        }
    }

    fn render(
        &self,
        template: &str,
        route: &LoadedRoute,
        ctx: minijinja::Value,
    ) -> Result<String, RenderError> {
        self.env
            .get_template(template)
            .and_then(|tmpl| tmpl.render(ctx))
            .map_err(|e| RenderError::Render {
                pathname: route.url().path().to_string(),
                message: e.to_string(),
            })
    }
}

impl Renderer for HtmlRenderer {
    fn ssr(&self, route: &LoadedRoute) -> Result<SsrOutput, RenderError> {
        let content = compose(&route.page, &route.layouts);
        let title = route.page.title.as_deref().unwrap_or_default();
        let description = route
            .page
            .frontmatter
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let head = self.render(
            "head.html",
            route,
            context! {
                title => title,
                site_title => &self.site_title,
                description => description,
            },
        )?;
        let html = self.render(
            "document.html",
            route,
            context! {
                head => &head,
                content => &content,
                site_title => &self.site_title,
                base_url => &self.base_url,
            },
        )?;

        Ok(SsrOutput { html, head })
    }
}

/// Nest the page body inside its layouts.
pub fn compose(page: &Page, layouts: &[Page]) -> String {
    layouts.iter().rev().fold(page.html.clone(), |inner, layout| {
        if layout.html.contains(SLOT) {
            layout.html.replacen(SLOT, &inner, 1)
        } else {
            format!("{}{inner}", layout.html)
        }
    })
}

const HEAD_TEMPLATE: &str = r##"{% if title %}<title>{{ title }} - {{ site_title }}</title>{% else %}<title>{{ site_title }}</title>{% endif %}
{% if description %}<meta name="description" content="{{ description }}">
{% endif %}"##;

const DOCUMENT_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  {{ head | safe }}
</head>
<body>
  <header class="site-header">
    <a href="{{ base_url | safe }}" class="site-title">{{ site_title }}</a>
  </header>
  <main class="content">
    {{ content | safe }}
  </main>
</body>
</html>"##;

#[cfg(test)]
mod tests {
    use super::*;
    use folio_router::{MatchedRoute, RouteDeclaration};
    use folio_routes::{Params, Route};
    use serde_json::{json, Map};
    use std::sync::Arc;
    use url::Url;

    fn loaded(page: Page, layouts: Vec<Page>) -> LoadedRoute {
        let route = Route::new("/guide/intro", None).unwrap();
        LoadedRoute {
            matched: MatchedRoute {
                declaration: Arc::new(RouteDeclaration::redirect(route, "/")),
                url: Url::parse("http://localhost/guide/intro").unwrap(),
                params: Params::new(),
            },
            page,
            layouts,
        }
    }

    #[test]
    fn renders_document_with_head() {
        let mut frontmatter = Map::new();
        frontmatter.insert("description".to_string(), json!("Getting started"));
        let page = Page {
            title: Some("Intro".to_string()),
            html: "<h1>Intro</h1>".to_string(),
            frontmatter,
            data: json!({}),
        };

        let output = HtmlRenderer::new("Docs", "/")
            .ssr(&loaded(page, Vec::new()))
            .unwrap();

        assert!(output.head.contains("<title>Intro - Docs</title>"));
        assert!(output.head.contains(r#"content="Getting started""#));
        assert!(output.html.contains("<h1>Intro</h1>"));
        assert!(output.html.contains(r#"<a href="/" class="site-title">Docs</a>"#));
    }

    #[test]
    fn untitled_pages_use_the_site_title() {
        let output = HtmlRenderer::new("Docs", "/")
            .ssr(&loaded(Page::new("<p>x</p>"), Vec::new()))
            .unwrap();

        assert!(output.head.contains("<title>Docs</title>"));
        assert!(!output.head.contains("description"));
    }

    #[test]
    fn nests_layouts_outermost_first() {
        let html = compose(
            &Page::new("<p>page</p>"),
            &[
                Page::new("<div class=\"root\"><slot></slot></div>"),
                Page::new("<nav>guide</nav>"),
            ],
        );

        assert_eq!(
            html,
            "<div class=\"root\"><nav>guide</nav><p>page</p></div>"
        );
    }
}
