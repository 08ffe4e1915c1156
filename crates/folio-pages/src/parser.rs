//! Markdown page parser.

use std::collections::HashMap;

use pulldown_cmark::{html, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::frontmatter::{extract_frontmatter, Frontmatter, FrontmatterError};

/// A parsed page or layout file.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// Typed frontmatter (defaults when absent)
    pub frontmatter: Frontmatter,

    /// Frontmatter as written
    pub raw_frontmatter: Map<String, Value>,

    /// Rendered HTML body
    pub html: String,

    /// Table of contents entries
    pub toc: Vec<TocEntry>,

    /// First level-1 heading
    pub heading: Option<String>,
}

impl ParsedPage {
    /// Title from frontmatter, falling back to the first heading.
    pub fn title(&self) -> Option<&str> {
        self.frontmatter
            .title
            .as_deref()
            .or(self.heading.as_deref())
    }
}

/// A table of contents entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TocEntry {
    /// Heading text
    pub title: String,
    /// Anchor ID
    pub id: String,
    /// Heading level (1-6)
    pub level: u8,
}

/// Errors that can occur when parsing a page.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] FrontmatterError),
}

/// Parse a markdown page.
///
/// Extracts frontmatter, renders the body with heading anchors and builds a
/// table of contents.
pub fn parse_page(source: &str) -> Result<ParsedPage, ParseError> {
    let (frontmatter, content) = extract_frontmatter(source)?;
    let (frontmatter, raw_frontmatter) = match frontmatter {
        Some(fm) => (fm.fields, fm.raw),
        None => (Frontmatter::default(), Map::new()),
    };

    let (html, toc) = render_markdown(content);
    let heading = toc
        .iter()
        .find(|entry| entry.level == 1)
        .map(|entry| entry.title.clone());

    Ok(ParsedPage {
        frontmatter,
        raw_frontmatter,
        html,
        toc,
        heading,
    })
}

/// Render markdown to HTML, giving every heading an `id`.
pub fn render_markdown(content: &str) -> (String, Vec<TocEntry>) {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES;

    let mut events: Vec<Event<'_>> = Parser::new_ext(content, options).collect();
    let mut toc = Vec::new();
    let mut used: HashMap<String, usize> = HashMap::new();

    let mut heading: Option<(usize, String)> = None;
    for index in 0..events.len() {
        match &events[index] {
            Event::Start(Tag::Heading { .. }) => heading = Some((index, String::new())),
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, title)) = heading.as_mut() {
                    title.push_str(text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                let Some((start, title)) = heading.take() else {
                    continue;
                };
                let Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }) = &events[start]
                else {
                    continue;
                };

                let id = match id {
                    Some(explicit) => explicit.to_string(),
                    None => unique_slug(&title, &mut used),
                };
                toc.push(TocEntry {
                    title,
                    id: id.clone(),
                    level: level_number(*level),
                });

                events[start] = Event::Start(Tag::Heading {
                    level: *level,
                    id: Some(CowStr::from(id)),
                    classes: classes.clone(),
                    attrs: attrs.clone(),
                });
            }
            _ => {}
        }
    }

    let mut html_output = String::new();
    html::push_html(&mut html_output, events.into_iter());
    (html_output, toc)
}

fn level_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn unique_slug(title: &str, used: &mut HashMap<String, usize>) -> String {
    let base = slugify(title);
    let base = if base.is_empty() { "section".to_string() } else { base };

    let count = used.entry(base.clone()).or_insert(0);
    let slug = if *count == 0 {
        base
    } else {
        format!("{base}-{count}")
    };
    *count += 1;
    slug
}

/// Convert a heading to a URL-safe slug.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
