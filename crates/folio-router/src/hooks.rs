//! Navigation hooks.

use std::sync::Arc;

use folio_routes::Params;

use crate::state::{LoadedRoute, MatchedRoute};

/// Handle for removing a registered hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Outcome of the `before_navigate` hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decision {
    Proceed,
    Cancel,
    Redirect(String),
}

/// Passed to `before_navigate` hooks. Calling [`cancel`](Self::cancel) or
/// [`redirect`](Self::redirect) skips the remaining hooks.
pub struct BeforeNavigate<'a> {
    pub from: Option<&'a LoadedRoute>,
    pub to: &'a MatchedRoute,
    decision: Decision,
}

impl BeforeNavigate<'_> {
    pub fn params(&self) -> &Params {
        &self.to.params
    }

    /// Abort the navigation. The current route stays as it is.
    pub fn cancel(&mut self) {
        self.decision = Decision::Cancel;
    }

    /// Navigate somewhere else instead.
    pub fn redirect(&mut self, to: impl Into<String>) {
        self.decision = Decision::Redirect(to.into());
    }
}

/// Passed to `after_navigate` hooks.
pub struct AfterNavigate<'a> {
    pub from: &'a LoadedRoute,
    pub to: &'a LoadedRoute,
}

pub type BeforeHook = Arc<dyn Fn(&mut BeforeNavigate<'_>) + Send + Sync>;
pub type AfterHook = Arc<dyn Fn(&AfterNavigate<'_>) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Hooks {
    next_id: u64,
    before: Vec<(HookId, BeforeHook)>,
    after: Vec<(HookId, AfterHook)>,
}

impl Hooks {
    pub(crate) fn add_before(&mut self, hook: BeforeHook) -> HookId {
        let id = self.next();
        self.before.push((id, hook));
        id
    }

    pub(crate) fn add_after(&mut self, hook: AfterHook) -> HookId {
        let id = self.next();
        self.after.push((id, hook));
        id
    }

    pub(crate) fn remove(&mut self, id: HookId) -> bool {
        let before = self.before.len() + self.after.len();
        self.before.retain(|(h, _)| *h != id);
        self.after.retain(|(h, _)| *h != id);
        before != self.before.len() + self.after.len()
    }

    pub(crate) fn before(&self) -> Vec<BeforeHook> {
        self.before.iter().map(|(_, h)| Arc::clone(h)).collect()
    }

    pub(crate) fn after(&self) -> Vec<AfterHook> {
        self.after.iter().map(|(_, h)| Arc::clone(h)).collect()
    }

    fn next(&mut self) -> HookId {
        self.next_id += 1;
        HookId(self.next_id)
    }
}

/// Run `before_navigate` hooks in registration order.
pub(crate) fn run_before(
    hooks: &[BeforeHook],
    from: Option<&LoadedRoute>,
    to: &MatchedRoute,
) -> Decision {
    let mut event = BeforeNavigate {
        from,
        to,
        decision: Decision::Proceed,
    };

    for hook in hooks {
        hook(&mut event);
        if event.decision != Decision::Proceed {
            break;
        }
    }

    event.decision
}
