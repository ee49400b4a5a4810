use serde::Serialize;
use serde_json::{json, Map, Value};

use super::item::{FeatureItem, FeatureKind};
use super::panel::{FeatureContext, PanelMode};

/// A view descriptor handed to the host UI: component name plus props.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub component: String,
    pub props: Map<String, Value>,
}

impl Element {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            props: Map::new(),
        }
    }

    pub fn prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.props.insert(key.to_string(), value.into());
        self
    }
}

/// Props for the View and Form components.
pub struct PanelProps<'a> {
    pub kind: FeatureKind,
    pub item: &'a FeatureItem,
    pub on_save: &'a str,
    pub on_cancel: &'a str,
}

#[derive(Clone, Copy)]
pub struct Components {
    pub list: fn(FeatureKind) -> Element,
    pub form: fn(&PanelProps<'_>) -> Element,
    pub view: fn(&PanelProps<'_>) -> Element,
}

#[derive(Clone)]
pub struct RegistryEntry {
    pub name: &'static str,
    pub kind: FeatureKind,
    pub panel_key: &'static str,
    pub components: Components,
}

impl RegistryEntry {
    /// Entry wired to the stock components for `kind`.
    pub fn standard(kind: FeatureKind) -> Self {
        Self {
            name: kind.plugin_name(),
            kind,
            panel_key: kind.panel_key(),
            components: Components {
                list: list_component,
                form: form_component,
                view: view_component,
            },
        }
    }
}

/// Ordered, immutable list of shell plugins.
#[derive(Clone)]
pub struct ShellRegistry {
    entries: Vec<RegistryEntry>,
}

impl ShellRegistry {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }

    pub fn builtin() -> Self {
        Self::new(FeatureKind::ALL.into_iter().map(RegistryEntry::standard).collect())
    }

    /// First entry named `name`.
    pub fn find(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }
}

fn list_component(kind: FeatureKind) -> Element {
    Element::new(format!("{}List", kind.label()))
        .prop("plugin", kind.plugin_name())
        .prop("rowAttribute", super::keyboard::LIST_ITEM_ATTR)
}

fn item_props(element: Element, props: &PanelProps<'_>) -> Element {
    let item = props.item;
    let element = element
        .prop("item", item.to_value())
        .prop("title", item.title())
        .prop("onCancel", props.on_cancel);
    match item {
        FeatureItem::Contact(c) => element.prop("subtitle", c.organization.clone().unwrap_or_default()),
        FeatureItem::Note(n) => element.prop("contactId", n.contact_id),
        FeatureItem::Channel(c) => element.prop("subtitle", c.kind.clone()),
        FeatureItem::Task(t) => element
            .prop("done", t.done.unwrap_or(false))
            .prop("dueDate", t.due_date.clone()),
    }
}

fn view_component(props: &PanelProps<'_>) -> Element {
    item_props(Element::new(format!("{}View", props.kind.label())), props)
}

fn form_component(props: &PanelProps<'_>) -> Element {
    // Channels are read-only on the backend; their form only displays.
    let read_only = matches!(props.kind, FeatureKind::Channel);
    item_props(Element::new(format!("{}Form", props.kind.label())), props)
        .prop("isNew", props.item.id().is_none())
        .prop("readOnly", read_only)
        .prop("onSave", props.on_save)
}

/// Pick the View or Form component for the active panel.
///
/// Returns `None` when the plugin or its context is missing, when there is
/// nothing to show in view mode, or when `item` belongs to another feature.
/// A form with no item renders as a blank "new" form.
pub fn render_panel_content(
    plugin: Option<&RegistryEntry>,
    context: Option<&FeatureContext>,
    mode: PanelMode,
    item: Option<&FeatureItem>,
    on_save: &str,
    on_cancel: &str,
) -> Option<Element> {
    let (plugin, _context) = (plugin?, context?);

    let blank;
    let item = match (mode, item) {
        (_, Some(item)) => item,
        (PanelMode::Form, None) => {
            blank = FeatureItem::empty(plugin.kind);
            &blank
        }
        (PanelMode::View, None) => return None,
    };
    if item.kind() != plugin.kind {
        tracing::warn!(
            plugin = plugin.name,
            item_kind = item.kind().label(),
            "item does not belong to the active plugin"
        );
        return None;
    }

    let props = PanelProps {
        kind: plugin.kind,
        item,
        on_save,
        on_cancel,
    };
    Some(match mode {
        PanelMode::View => (plugin.components.view)(&props),
        PanelMode::Form => (plugin.components.form)(&props),
    })
}

/// The List component for `page`, or a not-found placeholder.
pub fn render_current_page(page: &str, registry: &ShellRegistry) -> Element {
    match registry.find(page) {
        Some(entry) => (entry.components.list)(entry.kind),
        None => Element::new("PluginNotFound").prop("page", page).prop(
            "available",
            registry.entries().iter().map(|e| json!(e.name)).collect::<Vec<_>>(),
        ),
    }
}
