use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The feature kinds the shell knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Contact,
    Note,
    Channel,
    Task,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 4] = [
        FeatureKind::Contact,
        FeatureKind::Note,
        FeatureKind::Channel,
        FeatureKind::Task,
    ];

    /// Backend plugin name, also the page name and `/api/<name>` segment.
    pub fn plugin_name(self) -> &'static str {
        match self {
            FeatureKind::Contact => "contacts",
            FeatureKind::Note => "notes",
            FeatureKind::Channel => "channels",
            FeatureKind::Task => "tasks",
        }
    }

    pub fn from_plugin_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.plugin_name() == name)
    }

    pub fn label(self) -> &'static str {
        match self {
            FeatureKind::Contact => "Contact",
            FeatureKind::Note => "Note",
            FeatureKind::Channel => "Channel",
            FeatureKind::Task => "Task",
        }
    }

    /// Name of the open flag in the context snapshot.
    pub fn panel_key(self) -> &'static str {
        match self {
            FeatureKind::Contact => "isContactPanelOpen",
            FeatureKind::Note => "isNotePanelOpen",
            FeatureKind::Channel => "isChannelPanelOpen",
            FeatureKind::Task => "isTaskPanelOpen",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub contact_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub contact_id: Option<i64>,
}

/// The item shown in a panel, tagged with its feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureItem {
    Contact(Contact),
    Note(Note),
    Channel(Channel),
    Task(Task),
}

impl FeatureItem {
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureItem::Contact(_) => FeatureKind::Contact,
            FeatureItem::Note(_) => FeatureKind::Note,
            FeatureItem::Channel(_) => FeatureKind::Channel,
            FeatureItem::Task(_) => FeatureKind::Task,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            FeatureItem::Contact(c) => c.id,
            FeatureItem::Note(n) => n.id,
            FeatureItem::Channel(c) => c.id,
            FeatureItem::Task(t) => t.id,
        }
    }

    /// Blank item for a "new" form.
    pub fn empty(kind: FeatureKind) -> Self {
        match kind {
            FeatureKind::Contact => FeatureItem::Contact(Contact::default()),
            FeatureKind::Note => FeatureItem::Note(Note::default()),
            FeatureKind::Channel => FeatureItem::Channel(Channel::default()),
            FeatureKind::Task => FeatureItem::Task(Task::default()),
        }
    }

    /// Heading shown above the item in list rows and panels.
    pub fn title(&self) -> &str {
        match self {
            FeatureItem::Contact(c) => &c.name,
            FeatureItem::Note(n) => &n.title,
            FeatureItem::Channel(c) => &c.name,
            FeatureItem::Task(t) => &t.title,
        }
    }

    pub fn from_value(kind: FeatureKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            FeatureKind::Contact => FeatureItem::Contact(serde_json::from_value(value)?),
            FeatureKind::Note => FeatureItem::Note(serde_json::from_value(value)?),
            FeatureKind::Channel => FeatureItem::Channel(serde_json::from_value(value)?),
            FeatureKind::Task => FeatureItem::Task(serde_json::from_value(value)?),
        })
    }

    /// Parse a `data-list-item` payload.
    pub fn parse(kind: FeatureKind, payload: &str) -> Result<Self, serde_json::Error> {
        Self::from_value(kind, serde_json::from_str(payload)?)
    }

    /// The record as sent to, and received from, the backend.
    pub fn to_value(&self) -> Value {
        let value = match self {
            FeatureItem::Contact(c) => serde_json::to_value(c),
            FeatureItem::Note(n) => serde_json::to_value(n),
            FeatureItem::Channel(c) => serde_json::to_value(c),
            FeatureItem::Task(t) => serde_json::to_value(t),
        };
        // Plain structs of strings and integers always serialize
        value.unwrap_or(Value::Null)
    }
}
