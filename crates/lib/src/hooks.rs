//! Lifecycle hooks around chunk loading and host function calls.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use crate::error::Result;

/// Points in the pipeline where hooks fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Before a chunk (file, string, template) is executed.
    BeforeLoad,
    /// After a chunk executed successfully.
    AfterLoad,
    /// Before a registered host function runs.
    BeforeExec,
    /// After a registered host function returned.
    AfterExec,
}

/// What a hook observes.
#[derive(Debug, Clone)]
pub struct HookEvent {
    pub kind: HookKind,
    /// Chunk name for load hooks, function name for exec hooks.
    pub name: String,
    /// Elapsed time, present on After* events.
    pub elapsed: Option<Duration>,
    /// Error message, present when the observed operation failed.
    pub error: Option<String>,
}

impl HookEvent {
    pub fn new(kind: HookKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            elapsed: None,
            error: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }
}

/// A hook callback. Returning an error aborts the surrounding operation.
pub type Hook = Rc<dyn Fn(&HookEvent) -> Result<()>>;

/// Hooks grouped by kind, run in registration order.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<HookKind, Vec<Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: HookKind, hook: Hook) {
        self.hooks.entry(kind).or_default().push(hook);
    }

    /// Clone the hook list for `kind`.
    ///
    /// Callers run the snapshot after releasing any borrow on the registry, so
    /// a hook may register further hooks without deadlocking a `RefCell`.
    pub fn snapshot(&self, kind: HookKind) -> Vec<Hook> {
        self.hooks.get(&kind).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(|v| v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn hooks_run_in_registration_order() {
        let mut registry = HookRegistry::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            registry.add(
                HookKind::BeforeLoad,
                Rc::new(move |_| {
                    order.borrow_mut().push(i);
                    Ok(())
                }),
            );
        }

        let event = HookEvent::new(HookKind::BeforeLoad, "config.lua");
        for hook in registry.snapshot(HookKind::BeforeLoad) {
            hook(&event).unwrap();
        }
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn snapshot_of_unknown_kind_is_empty() {
        let registry = HookRegistry::new();
        assert!(registry.snapshot(HookKind::AfterExec).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn event_builder_sets_fields() {
        let event = HookEvent::new(HookKind::AfterExec, "greet")
            .with_elapsed(Duration::from_millis(3))
            .with_error(Some("boom".to_string()));

        assert_eq!(event.name, "greet");
        assert_eq!(event.elapsed, Some(Duration::from_millis(3)));
        assert_eq!(event.error.as_deref(), Some("boom"));
    }
}
