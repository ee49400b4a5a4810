//! UI-toolkit-agnostic shell state.
//!
//! The host (browser, desktop webview, TUI) forwards key events, asks for
//! the current page and panel as `Element` descriptors, and renders them.
//! Everything is wired once in `Shell::new` from an explicit registry.

mod client;
mod item;
mod keyboard;
mod nav_guard;
mod panel;
mod registry;

pub use client::{ApiClient, ShellError};
pub use item::{Channel, Contact, FeatureItem, FeatureKind, Note, Task};
pub use keyboard::{
    EventTarget, FocusHost, Key, KeyAction, KeyEvent, KeyOutcome, KeyboardHandler, PanelBinding,
    LIST_ITEM_ATTR, PLUGIN_NAME_ATTR,
};
pub use nav_guard::{FormDraft, NavigationGuard, UNSAVED_CHANGES_MESSAGE};
pub use panel::{FeatureContext, PanelController, PanelMode, PanelState};
pub use registry::{
    render_current_page, render_panel_content, Components, Element, PanelProps, RegistryEntry,
    ShellRegistry,
};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::ShellPrefs;

/// Action ids the host wires to the panel's save and cancel buttons.
pub const SAVE_ACTION: &str = "panel.save";
pub const CANCEL_ACTION: &str = "panel.cancel";

pub struct Shell {
    registry: ShellRegistry,
    contexts: BTreeMap<&'static str, Arc<FeatureContext>>,
    keyboard: KeyboardHandler,
    guard: Arc<NavigationGuard>,
    current_page: Arc<Mutex<Option<String>>>,
    keyboard_enabled: bool,
}

impl Shell {
    /// Build a context for every registry entry and bind them to the
    /// keyboard handler.
    pub fn new(registry: ShellRegistry, client: Option<ApiClient>, prefs: &ShellPrefs) -> Self {
        let mut contexts = BTreeMap::new();
        let mut bindings = Vec::new();
        for entry in registry.entries() {
            let context = contexts
                .entry(entry.name)
                .or_insert_with(|| Arc::new(FeatureContext::new(entry.kind, client.clone())))
                .clone();
            let controller: Arc<dyn PanelController> = context;
            bindings.push(PanelBinding::new(entry, Some(controller)));
        }

        let current = prefs
            .last_page
            .clone()
            .filter(|page| registry.find(page).is_some());
        Self {
            keyboard: KeyboardHandler::new(bindings),
            registry,
            contexts,
            guard: Arc::new(NavigationGuard::new()),
            current_page: Arc::new(Mutex::new(current)),
            keyboard_enabled: prefs.keyboard_navigation,
        }
    }

    pub fn registry(&self) -> &ShellRegistry {
        &self.registry
    }

    pub fn guard(&self) -> &Arc<NavigationGuard> {
        &self.guard
    }

    pub fn context(&self, name: &str) -> Option<&Arc<FeatureContext>> {
        self.contexts.get(name)
    }

    pub fn current_page(&self) -> Option<String> {
        self.current_page.lock().clone()
    }

    /// Start a form draft registered with this shell's navigation guard.
    pub fn form_draft(&self, key: impl Into<String>) -> FormDraft {
        FormDraft::new(self.guard.clone(), key)
    }

    /// Switch to `page`, closing open panels. Goes through the navigation
    /// guard; returns false when the switch is waiting on `confirm_discard`.
    pub fn navigate_to(&self, page: &str) -> bool {
        let target = page.to_string();
        let current = self.current_page.clone();
        let contexts: Vec<Arc<FeatureContext>> = self.contexts.values().cloned().collect();
        self.guard.attempt_navigation(move || {
            for ctx in &contexts {
                if ctx.is_open() {
                    ctx.close();
                }
            }
            tracing::debug!(page = %target, "navigated");
            *current.lock() = Some(target);
        })
    }

    pub fn render_current_page(&self) -> Element {
        let page = self.current_page().unwrap_or_default();
        render_current_page(&page, &self.registry)
    }

    /// The panel for the current page's plugin, if one is open.
    pub fn render_panel(&self) -> Option<Element> {
        let page = self.current_page()?;
        let entry = self.registry.find(&page);
        let context = self.contexts.get(page.as_str());
        let state = context.map(|c| c.state())?;
        if !state.is_open {
            return None;
        }
        render_panel_content(
            entry,
            context.map(|c| c.as_ref()),
            state.mode,
            state.current_item.as_ref(),
            SAVE_ACTION,
            CANCEL_ACTION,
        )
    }

    pub fn handle_key<H: FocusHost>(&self, event: &KeyEvent, host: &mut H) -> KeyOutcome {
        if !self.keyboard_enabled {
            return KeyOutcome { prevent_default: false, action: KeyAction::Ignored };
        }
        self.keyboard.handle_key(event, host)
    }

    /// All context snapshots merged, plus the current page and guard state.
    pub fn snapshot(&self) -> Value {
        let mut out = Map::new();
        for (name, ctx) in &self.contexts {
            out.insert((*name).to_string(), ctx.snapshot());
        }
        out.insert("currentPage".into(), self.current_page().into());
        out.insert("navigationWarning".into(), self.guard.warning_message().into());
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::keyboard::test_host::FakeDom;
    use super::*;

    fn shell() -> Shell {
        Shell::new(ShellRegistry::builtin(), None, &ShellPrefs::default())
    }

    #[test]
    fn navigation_switches_page_and_closes_panels() {
        let shell = shell();
        assert!(shell.navigate_to("contacts"));
        shell.context("contacts").unwrap().open_new();

        assert!(shell.navigate_to("notes"));
        assert_eq!(shell.current_page().as_deref(), Some("notes"));
        assert!(!shell.context("contacts").unwrap().is_open());
        assert_eq!(shell.render_current_page().component, "NoteList");
    }

    #[test]
    fn dirty_draft_holds_navigation_until_confirmed() {
        let shell = shell();
        shell.navigate_to("contacts");
        let draft = shell.form_draft("contact-form");
        draft.set_dirty(true);

        assert!(!shell.navigate_to("tasks"));
        assert_eq!(shell.current_page().as_deref(), Some("contacts"));
        assert_eq!(shell.snapshot()["navigationWarning"], UNSAVED_CHANGES_MESSAGE);

        shell.guard().confirm_discard();
        assert_eq!(shell.current_page().as_deref(), Some("tasks"));
        drop(draft);
        assert!(!shell.guard().has_unsaved_changes());
    }

    #[test]
    fn panel_renders_for_current_page_only() {
        let shell = shell();
        shell.navigate_to("notes");
        assert!(shell.render_panel().is_none());

        shell.context("notes").unwrap().open_new();
        let el = shell.render_panel().unwrap();
        assert_eq!(el.component, "NoteForm");
        assert_eq!(el.props["onSave"], SAVE_ACTION);

        shell.navigate_to("contacts");
        assert!(shell.render_panel().is_none());
    }

    #[test]
    fn unknown_page_renders_fallback() {
        let shell = shell();
        assert_eq!(shell.render_current_page().component, "PluginNotFound");
        shell.navigate_to("estimates");
        assert_eq!(shell.render_current_page().props["page"], "estimates");
    }

    #[test]
    fn last_page_is_restored_from_prefs() {
        let prefs = ShellPrefs { last_page: Some("tasks".into()), ..ShellPrefs::default() };
        let shell = Shell::new(ShellRegistry::builtin(), None, &prefs);
        assert_eq!(shell.current_page().as_deref(), Some("tasks"));

        let prefs = ShellPrefs { last_page: Some("gone".into()), ..ShellPrefs::default() };
        assert!(Shell::new(ShellRegistry::builtin(), None, &prefs).current_page().is_none());
    }

    #[test]
    fn keyboard_opens_row_and_space_closes_it() {
        let shell = shell();
        shell.navigate_to("contacts");
        let mut dom = FakeDom::default();
        dom.focused = Some(dom.add_row("contacts", r#"{"id":7,"name":"Ada"}"#));
        let space = KeyEvent::new(Key::Space, EventTarget::Element);

        let outcome = shell.handle_key(&space, &mut dom);
        assert_eq!(outcome.action, KeyAction::OpenedForView { kind: FeatureKind::Contact, id: Some(7) });
        let panel = shell.render_panel().unwrap();
        assert_eq!(panel.component, "ContactView");
        assert_eq!(shell.snapshot()["contacts"]["isContactPanelOpen"], true);

        let outcome = shell.handle_key(&space, &mut dom);
        assert_eq!(outcome.action, KeyAction::ClosedPanel(FeatureKind::Contact));
        assert!(shell.render_panel().is_none());
    }

    #[test]
    fn disabled_keyboard_passes_everything_through() {
        let prefs = ShellPrefs { keyboard_navigation: false, ..ShellPrefs::default() };
        let shell = Shell::new(ShellRegistry::builtin(), None, &prefs);
        let mut dom = FakeDom::default();
        dom.focused = Some(dom.add_row("contacts", r#"{"id":7}"#));

        let outcome = shell.handle_key(&KeyEvent::new(Key::Space, EventTarget::Element), &mut dom);
        assert!(!outcome.prevent_default);
        assert!(!shell.context("contacts").unwrap().is_open());
    }
}
