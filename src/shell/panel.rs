//! Per-feature panel state.
//!
//! Each feature page owns one `FeatureContext`. It tracks whether the side
//! panel is open, whether it shows the read-only View or the editable Form,
//! and which item is loaded into it. It also caches the last list fetched
//! from the backend so the page can render without another round trip.
//!
//! State transitions:
//!
//! | call             | mode | current item | open  |
//! |------------------|------|--------------|-------|
//! | `open_for_view`  | View | the item     | true  |
//! | `open_for_edit`  | Form | the item     | true  |
//! | `open_new`       | Form | blank item   | true  |
//! | `close`          | View | none         | false |
//! | `save` (ok)      | View | none         | false |
//! | `save` (err)     | unchanged                   |

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};

use super::client::{ApiClient, ShellError};
use super::item::{FeatureItem, FeatureKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelMode {
    #[default]
    View,
    Form,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelState {
    pub mode: PanelMode,
    pub current_item: Option<FeatureItem>,
    pub is_open: bool,
}

/// What the keyboard handler and the shell need from a feature context.
pub trait PanelController: Send + Sync {
    fn kind(&self) -> FeatureKind;
    fn is_open(&self) -> bool;
    /// Hide the panel and forget the current item.
    fn close(&self);
    /// Show `item` read-only. Callers pass items of `kind()` only.
    fn open_for_view(&self, item: FeatureItem);
}

/// Panel state and cached list for one feature.
pub struct FeatureContext {
    kind: FeatureKind,
    panel: Mutex<PanelState>,
    items: Mutex<Vec<FeatureItem>>,
    client: Option<ApiClient>,
}

impl FeatureContext {
    pub fn new(kind: FeatureKind, client: Option<ApiClient>) -> Self {
        Self {
            kind,
            panel: Mutex::new(PanelState::default()),
            items: Mutex::new(Vec::new()),
            client,
        }
    }

    pub fn panel_key(&self) -> &'static str {
        self.kind.panel_key()
    }

    pub fn state(&self) -> PanelState {
        self.panel.lock().clone()
    }

    pub fn items(&self) -> Vec<FeatureItem> {
        self.items.lock().clone()
    }

    fn check_kind(&self, item: &FeatureItem) -> Result<(), ShellError> {
        if item.kind() == self.kind {
            return Ok(());
        }
        Err(ShellError::KindMismatch {
            expected: self.kind.label(),
            got: item.kind().label(),
        })
    }

    fn open(&self, mode: PanelMode, item: FeatureItem) {
        if let Err(e) = self.check_kind(&item) {
            tracing::warn!(feature = self.kind.plugin_name(), "not opening panel: {e}");
            return;
        }
        let mut panel = self.panel.lock();
        panel.mode = mode;
        panel.current_item = Some(item);
        panel.is_open = true;
    }

    pub fn open_for_edit(&self, item: FeatureItem) {
        self.open(PanelMode::Form, item);
    }

    /// Open an empty form.
    pub fn open_new(&self) {
        self.open(PanelMode::Form, FeatureItem::empty(self.kind));
    }

    fn client(&self) -> Result<&ApiClient, ShellError> {
        self.client
            .as_ref()
            .ok_or(ShellError::NoClient(self.kind.plugin_name()))
    }

    /// Refresh the cached list from the backend. On failure the previous
    /// list is kept.
    pub async fn load(&self) -> Result<Vec<FeatureItem>, ShellError> {
        let fetched = match self.client()?.list(self.kind).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(feature = self.kind.plugin_name(), "load failed: {e}");
                return Err(e);
            }
        };
        *self.items.lock() = fetched.clone();
        Ok(fetched)
    }

    /// Create (no id) or update (with id) `item`. On success the cached list
    /// is updated and the panel closes; on failure the panel is left as is.
    pub async fn save(&self, item: FeatureItem) -> Result<FeatureItem, ShellError> {
        self.check_kind(&item)?;
        let client = self.client()?;
        let result = match item.id() {
            Some(id) => client.update(id, &item).await,
            None => client.create(&item).await,
        };
        let saved = match result {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!(feature = self.kind.plugin_name(), "save failed: {e}");
                return Err(e);
            }
        };

        {
            let mut items = self.items.lock();
            match items.iter_mut().find(|i| i.id().is_some() && i.id() == saved.id()) {
                Some(existing) => *existing = saved.clone(),
                None => items.push(saved.clone()),
            }
        }
        *self.panel.lock() = PanelState::default();
        tracing::info!(feature = self.kind.plugin_name(), id = ?saved.id(), "saved");
        Ok(saved)
    }

    /// State for the host UI, keyed the way the registry's `panelKey` says.
    pub fn snapshot(&self) -> Value {
        let panel = self.state();
        let items: Vec<Value> = self.items.lock().iter().map(FeatureItem::to_value).collect();
        let mut snapshot = json!({
            "mode": panel.mode,
            "currentItem": panel.current_item.as_ref().map(FeatureItem::to_value),
            "items": items,
        });
        snapshot[self.panel_key()] = Value::Bool(panel.is_open);
        snapshot
    }
}

impl PanelController for FeatureContext {
    fn kind(&self) -> FeatureKind {
        self.kind
    }

    fn is_open(&self) -> bool {
        self.panel.lock().is_open
    }

    fn close(&self) {
        *self.panel.lock() = PanelState::default();
    }

    fn open_for_view(&self, item: FeatureItem) {
        self.open(PanelMode::View, item);
    }
}
