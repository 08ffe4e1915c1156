//! Markdown pages for folio sites.
//!
//! Discovers page and layout files, parses frontmatter and markdown, and
//! declares the pages as routes. Also keeps the route table in step with
//! file system changes during development.

pub mod discovery;
pub mod error;
pub mod frontmatter;
pub mod parser;
pub mod site;

pub use discovery::{discover, is_page_source, SourceFile};
pub use error::PageError;
pub use frontmatter::{Frontmatter, FrontmatterError};
pub use parser::{parse_page, ParseError, ParsedPage, TocEntry};
pub use site::{read_page, Reconciled, Site, SourceChange};
