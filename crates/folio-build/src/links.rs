//! Link extraction from rendered HTML.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#)
        .expect("valid anchor regex")
});

/// Bad link reason for hrefs that do not point at a page.
pub const MALFORMED: &str = "malformed URL pathname";

/// Bad link reason for pages no route matches.
pub const NOT_FOUND: &str = "no matching route (404)";

/// A link target found in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// A page of this site, without fragment
    Internal(Url),

    /// Another origin, or outside the base path
    External,

    /// Unparseable or not pointing at a page
    Malformed(String),
}

/// Every `<a href>` value in document order.
pub fn extract_hrefs(html: &str) -> Vec<String> {
    ANCHOR_HREF
        .captures_iter(html)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| html_escape::decode_html_entities(m.as_str()).into_owned())
        .collect()
}

/// Resolve an href found on `page` against the site at `base_url`.
pub fn classify(href: &str, page: &Url, base_url: &Url) -> Link {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return Link::External;
    }

    let mut url = match page.join(href) {
        Ok(url) => url,
        Err(_) => return Link::Malformed(href.to_string()),
    };

    if url.origin() != base_url.origin() || !url.path().starts_with(base_url.path()) {
        return Link::External;
    }

    if !looks_like_page(url.path()) {
        return Link::Malformed(href.to_string());
    }

    url.set_fragment(None);
    url.set_query(None);
    Link::Internal(url)
}

/// Pathnames without an extension, or ending in `.html`.
fn looks_like_page(pathname: &str) -> bool {
    let last = pathname.rsplit('/').next().unwrap_or("");
    match last.rsplit_once('.') {
        None => true,
        Some((_, ext)) => ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn extracts_quoted_and_bare_hrefs() {
        let html = r#"<p><a href="/a">A</a> <A class="x" HREF='b?x=1&amp;y=2'>B</A>
            <a href=/c>C</a> <link href="/style.css"><a name="top">top</a></p>"#;

        assert_eq!(extract_hrefs(html), vec!["/a", "b?x=1&y=2", "/c"]);
    }

    #[test]
    fn decodes_numeric_and_named_entities() {
        let html = r#"<a href="&#x2f;">home</a><a href="&#47;guide&#x2F;a">a</a><a href="/q?a=1&lt;2">q</a>"#;

        assert_eq!(extract_hrefs(html), vec!["/", "/guide/a", "/q?a=1<2"]);
    }

    #[test]
    fn classifies_links() {
        let base = url("http://localhost/docs/");
        let page = url("http://localhost/docs/guide/intro");

        assert_eq!(
            classify("setup#step-2", &page, &base),
            Link::Internal(url("http://localhost/docs/guide/setup"))
        );
        assert_eq!(
            classify("/docs/index.html", &page, &base),
            Link::Internal(url("http://localhost/docs/index.html"))
        );
        assert_eq!(classify("#top", &page, &base), Link::External);
        assert_eq!(classify("https://example.com/", &page, &base), Link::External);
        assert_eq!(classify("/blog/", &page, &base), Link::External);
        assert_eq!(classify("mailto:a@b.c", &page, &base), Link::External);
        assert_eq!(
            classify("/docs/logo.png", &page, &base),
            Link::Malformed("/docs/logo.png".to_string())
        );
        assert_eq!(
            classify("http://[::1", &page, &base),
            Link::Malformed("http://[::1".to_string())
        );
    }
}
