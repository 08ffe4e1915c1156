//! Scroll position strategies.
//!
//! The router only talks to [`ScrollDelegate`]. [`SessionScrollDelegate`]
//! is the stock implementation: positions are saved per history index and
//! persisted through a [`ScrollStorage`] (session storage in a browser).

use std::collections::HashMap;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::history::HistoryState;

/// A scroll offset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub top: f64,
    pub left: f64,
}

impl ScrollPosition {
    pub const TOP: Self = Self { top: 0.0, left: 0.0 };
}

/// What the router asks for once a navigation is committed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScrollOptions {
    /// `false` leaves the viewport where it is
    pub enabled: bool,

    /// Fragment to scroll to, without `#`
    pub hash: Option<String>,

    /// Position to restore on back/forward
    pub restore: Option<ScrollPosition>,

    /// Keep the focused element instead of resetting focus
    pub keep_focus: bool,

    /// History index of the new entry
    pub index: u64,
}

/// Pluggable scroll behavior.
pub trait ScrollDelegate: Send + Sync {
    fn scroll<'a>(&'a self, options: &'a ScrollOptions) -> BoxFuture<'a, ()>;

    /// Remember the current position for the entry at `index`.
    fn save_position(&self, index: u64);

    fn saved_position(&self, state: &HistoryState) -> Option<ScrollPosition>;

    /// Persist saved positions.
    fn commit(&self);
}

/// The document viewport.
pub trait Viewport: Send + Sync {
    fn position(&self) -> ScrollPosition;

    fn scroll_to(&self, position: ScrollPosition);

    /// Scroll an element into view. Returns `false` if there is no such element.
    fn scroll_to_anchor(&self, id: &str) -> bool;

    /// Reset focus to the document body.
    fn reset_focus(&self) {}

    /// Resolve after the next paint.
    fn next_frame(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// String storage that survives reloads of the same tab.
pub trait ScrollStorage: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, value: String);
}

/// Storage kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    value: Mutex<Option<String>>,
}

impl ScrollStorage for MemoryStorage {
    fn load(&self) -> Option<String> {
        self.value.lock().clone()
    }

    fn store(&self, value: String) {
        *self.value.lock() = Some(value);
    }
}

/// Saves positions per history index and restores them on back/forward.
pub struct SessionScrollDelegate<V, S> {
    viewport: V,
    storage: S,
    positions: Mutex<HashMap<u64, ScrollPosition>>,
}

impl<V: Viewport, S: ScrollStorage> SessionScrollDelegate<V, S> {
    /// Create a delegate, restoring positions persisted by an earlier commit.
    pub fn new(viewport: V, storage: S) -> Self {
        let positions = storage
            .load()
            .and_then(|json| match serde_json::from_str(&json) {
                Ok(positions) => Some(positions),
                Err(e) => {
                    tracing::debug!(error = %e, "Discarding unreadable scroll positions");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            viewport,
            storage,
            positions: Mutex::new(positions),
        }
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }
}

impl<V: Viewport, S: ScrollStorage> ScrollDelegate for SessionScrollDelegate<V, S> {
    fn scroll<'a>(&'a self, options: &'a ScrollOptions) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if !options.enabled {
                return;
            }

            // Let the new page paint before measuring anchors.
            self.viewport.next_frame().await;

            if let Some(position) = options.restore {
                self.viewport.scroll_to(position);
            } else if let Some(hash) = options.hash.as_deref().filter(|h| !h.is_empty()) {
                if !self.viewport.scroll_to_anchor(hash) {
                    self.viewport.scroll_to(ScrollPosition::TOP);
                }
            } else {
                self.viewport.scroll_to(ScrollPosition::TOP);
            }

            if !options.keep_focus {
                self.viewport.reset_focus();
            }
        })
    }

    fn save_position(&self, index: u64) {
        let position = self.viewport.position();
        self.positions.lock().insert(index, position);
    }

    fn saved_position(&self, state: &HistoryState) -> Option<ScrollPosition> {
        self.positions.lock().get(&state.index).copied()
    }

    fn commit(&self) {
        let json = {
            let positions = self.positions.lock();
            serde_json::to_string(&*positions)
        };
        match json {
            Ok(json) => self.storage.store(json),
            Err(e) => tracing::warn!(error = %e, "Failed to persist scroll positions"),
        }
    }
}

/// Viewport kept in memory: records scroll calls, knows a fixed set of anchors.
#[derive(Debug, Default)]
pub struct MemoryViewport {
    position: Mutex<ScrollPosition>,
    anchors: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MemoryViewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anchor(mut self, id: impl Into<String>) -> Self {
        self.anchors.push(id.into());
        self
    }

    /// Simulate the user scrolling.
    pub fn set_position(&self, position: ScrollPosition) {
        *self.position.lock() = position;
    }

    /// Scroll operations performed, e.g. `"to 0,0"` or `"anchor intro"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl Viewport for MemoryViewport {
    fn position(&self) -> ScrollPosition {
        *self.position.lock()
    }

    fn scroll_to(&self, position: ScrollPosition) {
        *self.position.lock() = position;
        self.calls
            .lock()
            .push(format!("to {},{}", position.top, position.left));
    }

    fn scroll_to_anchor(&self, id: &str) -> bool {
        let found = self.anchors.iter().any(|a| a == id);
        if found {
            self.calls.lock().push(format!("anchor {id}"));
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delegate() -> SessionScrollDelegate<MemoryViewport, MemoryStorage> {
        SessionScrollDelegate::new(
            MemoryViewport::new().with_anchor("intro"),
            MemoryStorage::default(),
        )
    }

    #[tokio::test]
    async fn restores_saved_positions() {
        let scroll = delegate();
        scroll.viewport().set_position(ScrollPosition { top: 120.0, left: 0.0 });
        scroll.save_position(3);

        let restore = scroll.saved_position(&HistoryState::new(3));
        assert_eq!(restore, Some(ScrollPosition { top: 120.0, left: 0.0 }));

        scroll.viewport().set_position(ScrollPosition::TOP);
        scroll
            .scroll(&ScrollOptions {
                enabled: true,
                restore,
                ..Default::default()
            })
            .await;
        assert_eq!(scroll.viewport().position().top, 120.0);
    }

    #[tokio::test]
    async fn scrolls_to_anchor_or_top() {
        let scroll = delegate();
        let hash = |h: &str| ScrollOptions {
            enabled: true,
            hash: Some(h.to_string()),
            ..Default::default()
        };

        scroll.scroll(&hash("intro")).await;
        scroll.scroll(&hash("missing")).await;
        scroll
            .scroll(&ScrollOptions {
                enabled: false,
                ..Default::default()
            })
            .await;

        assert_eq!(scroll.viewport().calls(), vec!["anchor intro", "to 0,0"]);
    }

    #[test]
    fn commit_persists_across_instances() {
        let storage = MemoryStorage::default();
        let viewport = MemoryViewport::new();
        viewport.set_position(ScrollPosition { top: 50.0, left: 5.0 });

        let first = SessionScrollDelegate::new(viewport, storage);
        first.save_position(7);
        first.commit();

        let SessionScrollDelegate { storage, .. } = first;
        let second = SessionScrollDelegate::new(MemoryViewport::new(), storage);
        assert_eq!(
            second.saved_position(&HistoryState::new(7)),
            Some(ScrollPosition { top: 50.0, left: 5.0 })
        );
    }
}
