use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const UNSAVED_CHANGES_MESSAGE: &str =
    "You have unsaved changes. Are you sure you want to leave this page?";

type Checker = Arc<dyn Fn() -> bool + Send + Sync>;
type NavAction = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct GuardInner {
    checkers: HashMap<String, Checker>,
    pending: Option<NavAction>,
    warning_shown: bool,
}

/// Dirty-state registry that gates navigation.
///
/// Checkers and actions are always called with the lock released, so they
/// may call back into the guard.
#[derive(Default)]
pub struct NavigationGuard {
    inner: Mutex<GuardInner>,
}

impl NavigationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the checker under `key`.
    pub fn register_unsaved_changes_checker(
        &self,
        key: impl Into<String>,
        checker: impl Fn() -> bool + Send + Sync + 'static,
    ) {
        self.inner.lock().checkers.insert(key.into(), Arc::new(checker));
    }

    pub fn unregister_unsaved_changes_checker(&self, key: &str) {
        self.inner.lock().checkers.remove(key);
    }

    /// Remove `key` only while it still maps to `checker`. A newer
    /// registration under the same key is left alone.
    fn unregister_exact(&self, key: &str, checker: &Checker) {
        let mut inner = self.inner.lock();
        if inner.checkers.get(key).is_some_and(|c| Arc::ptr_eq(c, checker)) {
            inner.checkers.remove(key);
        }
    }

    pub fn has_unsaved_changes(&self) -> bool {
        let checkers: Vec<Checker> = self.inner.lock().checkers.values().cloned().collect();
        checkers.iter().any(|check| check())
    }

    /// Run `action` now if nothing is dirty and return true. Otherwise stash
    /// it, replacing any action already waiting, raise the warning and
    /// return false.
    pub fn attempt_navigation(&self, action: impl FnOnce() + Send + 'static) -> bool {
        if !self.has_unsaved_changes() {
            action();
            return true;
        }
        let mut inner = self.inner.lock();
        if inner.pending.is_some() {
            tracing::debug!("replacing pending navigation");
        }
        inner.pending = Some(Box::new(action));
        inner.warning_shown = true;
        false
    }

    /// Run the stashed action, if any, and lower the warning.
    pub fn confirm_discard(&self) {
        let action = {
            let mut inner = self.inner.lock();
            inner.warning_shown = false;
            inner.pending.take()
        };
        if let Some(action) = action {
            action();
        }
    }

    /// Drop the stashed action without running it and lower the warning.
    pub fn cancel_discard(&self) {
        let mut inner = self.inner.lock();
        inner.warning_shown = false;
        inner.pending = None;
    }

    pub fn is_warning_shown(&self) -> bool {
        self.inner.lock().warning_shown
    }

    pub fn warning_message(&self) -> Option<&'static str> {
        self.is_warning_shown().then_some(UNSAVED_CHANGES_MESSAGE)
    }
}

/// A form's dirty flag, registered with the guard for as long as the draft
/// lives.
pub struct FormDraft {
    guard: Arc<NavigationGuard>,
    key: String,
    dirty: Arc<AtomicBool>,
    checker: Checker,
}

impl FormDraft {
    pub fn new(guard: Arc<NavigationGuard>, key: impl Into<String>) -> Self {
        let key = key.into();
        let dirty = Arc::new(AtomicBool::new(false));
        let flag = dirty.clone();
        let checker: Checker = Arc::new(move || flag.load(Ordering::SeqCst));
        guard.inner.lock().checkers.insert(key.clone(), checker.clone());
        Self { guard, key, dirty, checker }
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }
}

impl Drop for FormDraft {
    fn drop(&mut self) {
        self.guard.unregister_exact(&self.key, &self.checker);
    }
}
