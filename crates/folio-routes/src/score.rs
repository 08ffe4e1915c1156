//! Route specificity scoring.
//!
//! Each path segment gets a weight, and segments are compared position by
//! position: the first segment dominates the second, and so on. This gives
//! `/a/b` > `/a/:id` > `/a/(.*)`, and `/docs/` > `/docs/(.*)` because the
//! trailing empty segment of an index route counts as static.

/// Maximum number of leading segments that take part in scoring.
const MAX_SEGMENTS: usize = 16;

/// One more than the highest segment weight.
const BASE: u64 = 6;

/// Specificity class of a single segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SegmentKind {
    Wildcard = 1,
    Optional = 2,
    Param = 3,
    /// A parameter constrained by a regex, or mixed with static text.
    Constrained = 4,
    Static = 5,
}

/// Score a pathname pattern. Higher scores are more specific.
pub fn score(pathname: &str) -> u64 {
    let segments = split_segments(pathname);

    (0..MAX_SEGMENTS).fold(0, |acc, i| {
        let weight = segments.get(i).map_or(0, |s| classify(s) as u64);
        acc * BASE + weight
    })
}

/// Split a pattern into segments on `/`, ignoring slashes inside groups.
fn split_segments(pathname: &str) -> Vec<&str> {
    let body = pathname.strip_prefix('/').unwrap_or(pathname);
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' | '{' => depth += 1,
            ')' | '}' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                segments.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&body[start..]);
    segments
}

/// Classify a segment by its least specific piece.
pub fn classify(segment: &str) -> SegmentKind {
    let chars: Vec<char> = segment.chars().collect();
    let mut has_literal = false;
    let mut has_param = false;
    let mut has_regex = false;
    let mut kind = SegmentKind::Static;
    let mut i = 0;

    let lower = |kind: SegmentKind, other: SegmentKind| kind.min(other);

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                has_literal = true;
                i += 2;
                continue;
            }
            ':' => {
                has_param = true;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                continue;
            }
            '(' => {
                let end = chars[i..]
                    .iter()
                    .position(|c| *c == ')')
                    .map_or(chars.len(), |p| i + p);
                let inner: String = chars[i + 1..end.min(chars.len())].iter().collect();
                if inner == ".*" {
                    kind = lower(kind, SegmentKind::Wildcard);
                } else {
                    has_regex = true;
                }
                has_param = true;
                i = end + 1;
                continue;
            }
            '*' => kind = lower(kind, SegmentKind::Wildcard),
            '?' => kind = lower(kind, SegmentKind::Optional),
            '+' => kind = lower(kind, SegmentKind::Wildcard),
            '{' | '}' => {}
            _ => has_literal = true,
        }
        i += 1;
    }

    if has_param {
        let param = if has_regex || has_literal {
            SegmentKind::Constrained
        } else {
            SegmentKind::Param
        };
        kind = lower(kind, param);
    }

    kind
}
