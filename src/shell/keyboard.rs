//! Global keyboard handling for list rows and the sliding panel.
//!
//! - Space closes the open panel, or opens the focused row for viewing.
//! - ArrowUp / ArrowDown move focus between rows, wrapping at both ends.
//!
//! Typing in text inputs, text areas and content-editable elements is never
//! intercepted.

use std::sync::Arc;

use super::item::{FeatureItem, FeatureKind};
use super::panel::PanelController;
use super::registry::RegistryEntry;

/// Row attribute holding the item as JSON.
pub const LIST_ITEM_ATTR: &str = "data-list-item";
/// Row attribute naming the plugin the row belongs to.
pub const PLUGIN_NAME_ATTR: &str = "data-plugin-name";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Space,
    ArrowUp,
    ArrowDown,
    Other(String),
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` value.
    pub fn from_dom(key: &str) -> Self {
        match key {
            " " | "Spacebar" => Key::Space,
            "ArrowUp" => Key::ArrowUp,
            "ArrowDown" => Key::ArrowDown,
            other => Key::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    Element,
    TextInput,
    TextArea,
    ContentEditable,
}

impl EventTarget {
    fn is_editable(self) -> bool {
        !matches!(self, EventTarget::Element)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub target: EventTarget,
}

impl KeyEvent {
    pub fn new(key: Key, target: EventTarget) -> Self {
        Self { key, target }
    }
}

/// The document as the keyboard handler sees it.
pub trait FocusHost {
    type Node: Clone + PartialEq;

    fn focused(&self) -> Option<Self::Node>;
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    /// Every node carrying `attribute`, in document order.
    fn query_all(&self, attribute: &str) -> Vec<Self::Node>;
    fn focus(&mut self, node: &Self::Node);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Not a key we handle, or typed into an editable element.
    Ignored,
    ClosedPanel(FeatureKind),
    OpenedForView { kind: FeatureKind, id: Option<i64> },
    MovedFocus { from: usize, to: usize },
    /// Recognised but nothing to do (bad payload, unknown plugin, ...).
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOutcome {
    pub prevent_default: bool,
    pub action: KeyAction,
}

impl KeyOutcome {
    fn handled(action: KeyAction) -> Self {
        Self { prevent_default: true, action }
    }

    fn passed(action: KeyAction) -> Self {
        Self { prevent_default: false, action }
    }
}

/// A registry entry paired with its context, when it has one.
#[derive(Clone)]
pub struct PanelBinding {
    pub name: &'static str,
    pub kind: FeatureKind,
    pub controller: Option<Arc<dyn PanelController>>,
}

impl PanelBinding {
    pub fn new(entry: &RegistryEntry, controller: Option<Arc<dyn PanelController>>) -> Self {
        Self {
            name: entry.name,
            kind: entry.kind,
            controller,
        }
    }
}

pub struct KeyboardHandler {
    bindings: Vec<PanelBinding>,
}

impl KeyboardHandler {
    pub fn new(bindings: Vec<PanelBinding>) -> Self {
        Self { bindings }
    }

    pub fn handle_key<H: FocusHost>(&self, event: &KeyEvent, host: &mut H) -> KeyOutcome {
        if event.target.is_editable() {
            return KeyOutcome::passed(KeyAction::Ignored);
        }
        match event.key {
            Key::Space => self.on_space(host),
            Key::ArrowUp => move_focus(host, false),
            Key::ArrowDown => move_focus(host, true),
            Key::Other(_) => KeyOutcome::passed(KeyAction::Ignored),
        }
    }

    fn on_space<H: FocusHost>(&self, host: &H) -> KeyOutcome {
        let open = self
            .bindings
            .iter()
            .filter_map(|b| b.controller.as_ref())
            .find(|c| c.is_open());
        if let Some(controller) = open {
            controller.close();
            return KeyOutcome::handled(KeyAction::ClosedPanel(controller.kind()));
        }

        let Some(node) = host.focused() else {
            return KeyOutcome::passed(KeyAction::Ignored);
        };
        let Some(payload) = host.attribute(&node, LIST_ITEM_ATTR) else {
            return KeyOutcome::passed(KeyAction::Ignored);
        };
        let plugin = host.attribute(&node, PLUGIN_NAME_ATTR).unwrap_or_default();

        let Some(binding) = self.bindings.iter().find(|b| b.name == plugin) else {
            tracing::warn!(plugin = %plugin, "focused row names an unknown plugin");
            return KeyOutcome::passed(KeyAction::NoOp);
        };
        let Some(controller) = binding.controller.as_ref() else {
            tracing::warn!(plugin = %plugin, "plugin has no panel context");
            return KeyOutcome::passed(KeyAction::NoOp);
        };
        let item = match FeatureItem::parse(binding.kind, &payload) {
            Ok(item) => item,
            Err(e) => {
                tracing::error!(plugin = %plugin, "malformed {LIST_ITEM_ATTR} payload: {e}");
                return KeyOutcome::passed(KeyAction::NoOp);
            }
        };

        let id = item.id();
        controller.open_for_view(item);
        KeyOutcome::handled(KeyAction::OpenedForView { kind: binding.kind, id })
    }
}

fn move_focus<H: FocusHost>(host: &mut H, forward: bool) -> KeyOutcome {
    let Some(current) = host.focused() else {
        return KeyOutcome::passed(KeyAction::Ignored);
    };
    if host.attribute(&current, LIST_ITEM_ATTR).is_none() {
        return KeyOutcome::passed(KeyAction::Ignored);
    }

    let rows = host.query_all(LIST_ITEM_ATTR);
    let Some(from) = rows.iter().position(|n| *n == current) else {
        return KeyOutcome::handled(KeyAction::NoOp);
    };
    let len = rows.len();
    let to = if forward { (from + 1) % len } else { (from + len - 1) % len };
    host.focus(&rows[to]);
    KeyOutcome::handled(KeyAction::MovedFocus { from, to })
}


#[cfg(test)]
mod tests {
    use super::test_host::FakeDom;
    use super::*;
    use parking_lot::Mutex;

    /// Records every call so tests can assert exactly what was touched.
    struct Recorder {
        kind: FeatureKind,
        open: Mutex<bool>,
        closes: Mutex<usize>,
        opened: Mutex<Vec<FeatureItem>>,
    }

    impl Recorder {
        fn new(kind: FeatureKind, open: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                open: Mutex::new(open),
                closes: Mutex::new(0),
                opened: Mutex::new(Vec::new()),
            })
        }
    }

    impl PanelController for Recorder {
        fn kind(&self) -> FeatureKind {
            self.kind
        }
        fn is_open(&self) -> bool {
            *self.open.lock()
        }
        fn close(&self) {
            *self.closes.lock() += 1;
            *self.open.lock() = false;
        }
        fn open_for_view(&self, item: FeatureItem) {
            self.opened.lock().push(item);
            *self.open.lock() = true;
        }
    }

    fn handler(contacts: &Arc<Recorder>, notes: &Arc<Recorder>) -> KeyboardHandler {
        let contacts_ctl: Arc<dyn PanelController> = contacts.clone();
        let notes_ctl: Arc<dyn PanelController> = notes.clone();
        KeyboardHandler::new(vec![
            PanelBinding::new(&RegistryEntry::standard(FeatureKind::Contact), Some(contacts_ctl)),
            PanelBinding::new(&RegistryEntry::standard(FeatureKind::Note), Some(notes_ctl)),
        ])
    }

    fn press(key: Key) -> KeyEvent {
        KeyEvent::new(key, EventTarget::Element)
    }

    #[test]
    fn space_closes_the_open_panel_only() {
        let contacts = Recorder::new(FeatureKind::Contact, false);
        let notes = Recorder::new(FeatureKind::Note, true);
        let mut dom = FakeDom::default();

        let outcome = handler(&contacts, &notes).handle_key(&press(Key::Space), &mut dom);
        assert!(outcome.prevent_default);
        assert_eq!(outcome.action, KeyAction::ClosedPanel(FeatureKind::Note));
        assert_eq!(*notes.closes.lock(), 1);
        assert_eq!(*contacts.closes.lock(), 0);
        assert!(contacts.opened.lock().is_empty());
    }

    #[test]
    fn space_on_focused_row_opens_it_for_view() {
        let contacts = Recorder::new(FeatureKind::Contact, false);
        let notes = Recorder::new(FeatureKind::Note, false);
        let mut dom = FakeDom::default();
        let row = dom.add_row("contacts", r#"{"id":7}"#);
        dom.focused = Some(row);

        let outcome = handler(&contacts, &notes).handle_key(&press(Key::Space), &mut dom);
        assert!(outcome.prevent_default);
        assert_eq!(outcome.action, KeyAction::OpenedForView { kind: FeatureKind::Contact, id: Some(7) });
        let opened = contacts.opened.lock();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].id(), Some(7));
        assert!(notes.opened.lock().is_empty());
    }

    #[test]
    fn malformed_payload_changes_nothing() {
        let contacts = Recorder::new(FeatureKind::Contact, false);
        let notes = Recorder::new(FeatureKind::Note, false);
        let mut dom = FakeDom::default();
        dom.focused = Some(dom.add_row("contacts", "{id:"));

        let outcome = handler(&contacts, &notes).handle_key(&press(Key::Space), &mut dom);
        assert_eq!(outcome, KeyOutcome { prevent_default: false, action: KeyAction::NoOp });
        assert!(contacts.opened.lock().is_empty());
    }

    #[test]
    fn unknown_plugin_changes_nothing() {
        let contacts = Recorder::new(FeatureKind::Contact, false);
        let notes = Recorder::new(FeatureKind::Note, false);
        let mut dom = FakeDom::default();
        dom.focused = Some(dom.add_row("estimates", r#"{"id":1}"#));

        let outcome = handler(&contacts, &notes).handle_key(&press(Key::Space), &mut dom);
        assert!(!outcome.prevent_default);
        assert!(contacts.opened.lock().is_empty());
        assert!(notes.opened.lock().is_empty());
    }

    #[test]
    fn space_without_focused_row_is_not_intercepted() {
        let contacts = Recorder::new(FeatureKind::Contact, false);
        let notes = Recorder::new(FeatureKind::Note, false);
        let mut dom = FakeDom::default();
        dom.focused = Some(dom.add(&[("id", "search-button")]));

        let outcome = handler(&contacts, &notes).handle_key(&press(Key::Space), &mut dom);
        assert_eq!(outcome, KeyOutcome { prevent_default: false, action: KeyAction::Ignored });
    }

    #[test]
    fn editable_targets_are_ignored() {
        let contacts = Recorder::new(FeatureKind::Contact, true);
        let notes = Recorder::new(FeatureKind::Note, false);
        let mut dom = FakeDom::default();
        let h = handler(&contacts, &notes);

        for target in [EventTarget::TextInput, EventTarget::TextArea, EventTarget::ContentEditable] {
            let outcome = h.handle_key(&KeyEvent::new(Key::Space, target), &mut dom);
            assert_eq!(outcome.action, KeyAction::Ignored);
            assert!(!outcome.prevent_default);
        }
        assert_eq!(*contacts.closes.lock(), 0);
    }

    #[test]
    fn arrows_wrap_around() {
        let contacts = Recorder::new(FeatureKind::Contact, false);
        let notes = Recorder::new(FeatureKind::Note, false);
        let h = handler(&contacts, &notes);
        let mut dom = FakeDom::default();
        dom.add(&[("id", "header")]);
        let first = dom.add_row("contacts", r#"{"id":1}"#);
        let middle = dom.add_row("contacts", r#"{"id":2}"#);
        let last = dom.add_row("contacts", r#"{"id":3}"#);

        dom.focused = Some(last);
        let outcome = h.handle_key(&press(Key::ArrowDown), &mut dom);
        assert!(outcome.prevent_default);
        assert_eq!(outcome.action, KeyAction::MovedFocus { from: 2, to: 0 });
        assert_eq!(dom.focused, Some(first));

        let outcome = h.handle_key(&press(Key::ArrowUp), &mut dom);
        assert_eq!(outcome.action, KeyAction::MovedFocus { from: 0, to: 2 });
        assert_eq!(dom.focused, Some(last));

        h.handle_key(&press(Key::ArrowUp), &mut dom);
        assert_eq!(dom.focused, Some(middle));
    }

    #[test]
    fn arrows_off_a_row_are_not_intercepted() {
        let contacts = Recorder::new(FeatureKind::Contact, false);
        let notes = Recorder::new(FeatureKind::Note, false);
        let h = handler(&contacts, &notes);
        let mut dom = FakeDom::default();
        let button = dom.add(&[("id", "button")]);
        dom.add_row("contacts", r#"{"id":1}"#);

        dom.focused = Some(button);
        let outcome = h.handle_key(&press(Key::ArrowDown), &mut dom);
        assert!(!outcome.prevent_default);
        assert_eq!(dom.focused, Some(button));

        dom.focused = None;
        assert!(!h.handle_key(&press(Key::ArrowUp), &mut dom).prevent_default);
    }

    #[test]
    fn arrows_on_a_detached_row_are_swallowed() {
        let contacts = Recorder::new(FeatureKind::Contact, false);
        let notes = Recorder::new(FeatureKind::Note, false);
        let h = handler(&contacts, &notes);
        let mut dom = FakeDom::default();
        dom.add_row("contacts", r#"{"id":1}"#);
        let stale = dom.add_row("contacts", r#"{"id":2}"#);
        dom.detached.insert(stale);
        dom.focused = Some(stale);

        let outcome = h.handle_key(&press(Key::ArrowDown), &mut dom);
        assert!(outcome.prevent_default);
        assert_eq!(outcome.action, KeyAction::NoOp);
        assert_eq!(dom.focused, Some(stale));
    }

    #[test]
    fn dom_key_names() {
        assert_eq!(Key::from_dom(" "), Key::Space);
        assert_eq!(Key::from_dom("ArrowDown"), Key::ArrowDown);
        assert_eq!(Key::from_dom("Enter"), Key::Other("Enter".into()));
    }
}
