//! Route compilation and matching for folio sites.
//!
//! Turns page file paths into scored URL patterns and keeps them in an
//! ordered table. Nothing here performs I/O.

pub mod compiler;
pub mod error;
pub mod manifest;
pub mod ordering;
pub mod pattern;
pub mod score;
pub mod table;

pub use compiler::{
    compile, file_role, layout_marker, layout_name, normalize_static, FileRole, Matcher,
    MatcherContext, Route, RouteCompiler,
};
pub use error::CompileError;
pub use manifest::{ManifestRoute, RouteManifest};
pub use ordering::{PresortedOrdering, RouteOrdering, ScoredOrdering};
pub use pattern::{CompiledPattern, Params};
pub use table::{decode_pathname, Matched, RouteTable};
