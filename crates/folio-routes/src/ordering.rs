//! Pluggable route ordering strategies.

use std::cmp::Ordering;
use std::fmt;

use crate::compiler::Route;
use crate::pattern::Params;

/// Strategy deciding how a [`RouteTable`](crate::RouteTable) scores, sorts and
/// matches its routes.
pub trait RouteOrdering: Send + Sync + fmt::Debug {
    /// Specificity of a route under this strategy.
    fn score(&self, route: &Route) -> u64;

    /// Compare two routes. `Equal` keeps insertion order.
    fn compare(&self, a: &Route, b: &Route) -> Ordering;

    /// Match a decoded pathname against a route.
    fn matches(&self, route: &Route, pathname: &str) -> Option<Params> {
        route.pattern.exec(pathname)
    }
}

/// Full specificity scoring: score descending, then order prefix, then
/// insertion order. Used when routes are registered programmatically.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoredOrdering;

impl RouteOrdering for ScoredOrdering {
    fn score(&self, route: &Route) -> u64 {
        crate::score::score(&route.pathname)
    }

    fn compare(&self, a: &Route, b: &Route) -> Ordering {
        self.score(b)
            .cmp(&self.score(a))
            .then_with(|| compare_order(a.order, b.order))
    }
}

/// No scoring: routes arrive already sorted by the server, so insertion
/// order is the final order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresortedOrdering;

impl RouteOrdering for PresortedOrdering {
    fn score(&self, route: &Route) -> u64 {
        route.score
    }

    fn compare(&self, _a: &Route, _b: &Route) -> Ordering {
        Ordering::Equal
    }
}

/// Routes with an order prefix sort before routes without one.
fn compare_order(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scored_ordering_prefers_specific_routes() {
        let ordering = ScoredOrdering;
        let a = Route::new("/docs/intro", None).unwrap();
        let b = Route::new("/docs/:slug", None).unwrap();

        assert_eq!(ordering.compare(&a, &b), Ordering::Less);
        assert_eq!(ordering.compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn scored_ordering_breaks_ties_by_order() {
        let ordering = ScoredOrdering;
        let a = Route::new("/a", Some(2)).unwrap();
        let b = Route::new("/b", Some(1)).unwrap();
        let c = Route::new("/c", None).unwrap();

        assert_eq!(ordering.compare(&b, &a), Ordering::Less);
        assert_eq!(ordering.compare(&a, &c), Ordering::Less);
        assert_eq!(ordering.compare(&c, &c), Ordering::Equal);
    }

    #[test]
    fn presorted_ordering_never_reorders() {
        let ordering = PresortedOrdering;
        let a = Route::new("/(.*)", None).unwrap();
        let b = Route::new("/docs", None).unwrap();

        assert_eq!(ordering.compare(&a, &b), Ordering::Equal);
        assert_eq!(ordering.score(&b), b.score);
    }
}
