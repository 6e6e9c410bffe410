use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

use crate::models::{MessageId, ProductRecord};
use crate::utils::error::{AppError, Result};

/// Reserved top-level key holding the ordered dashboard message ids.
pub const DASHBOARD_KEY: &str = "__dashboard_messages__";
/// Reserved top-level key mapping identity to live restock alert id.
pub const ALERTS_KEY: &str = "__alert_registry__";

/// Everything the watcher remembers between cycles and restarts.
///
/// Persisted as one JSON object: product records keyed by identity plus the
/// two reserved keys above. Entries that fail to parse are dropped on load,
/// which discards records written by older formats.
#[derive(Debug, Default)]
pub struct StockStore {
    records: HashMap<String, ProductRecord>,
    alerts: HashMap<String, MessageId>,
    dashboard: Vec<MessageId>,
    had_history: bool,
}

/// What a purge removed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Purge {
    pub removed: usize,
    /// Alert messages that lost their record and should be retracted.
    pub retracted: Vec<MessageId>,
}

impl StockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing or unreadable file yields an empty store
    /// without history.
    pub async fn load(path: &Path) -> Self {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no saved state, starting empty");
                return Self::new();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read saved state, starting empty");
                return Self::new();
            }
        };

        match serde_json::from_str::<Map<String, Value>>(&raw) {
            Ok(document) => Self::from_document(document),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "saved state is not a JSON object, starting empty");
                Self::new()
            }
        }
    }

    pub fn from_document(document: Map<String, Value>) -> Self {
        let mut store = Self::new();
        let mut dropped = 0usize;

        for (key, value) in document {
            if key == DASHBOARD_KEY {
                store.dashboard = serde_json::from_value(value).unwrap_or_default();
            } else if key == ALERTS_KEY {
                store.alerts = serde_json::from_value(value).unwrap_or_default();
            } else {
                match serde_json::from_value::<ProductRecord>(value) {
                    Ok(record) if record.identity == key => {
                        store.records.insert(key, record);
                    }
                    _ => dropped += 1,
                }
            }
        }

        if dropped > 0 {
            warn!(dropped, "discarded unreadable state entries");
        }
        store.had_history = !store.records.is_empty();
        store
    }

    pub fn to_document(&self) -> Map<String, Value> {
        let mut document = Map::new();
        for (identity, record) in &self.records {
            if let Ok(value) = serde_json::to_value(record) {
                document.insert(identity.clone(), value);
            }
        }
        document.insert(DASHBOARD_KEY.to_string(), Value::from(self.dashboard.clone()));
        let alerts = self
            .alerts
            .iter()
            .map(|(identity, id)| (identity.clone(), Value::from(*id)))
            .collect::<Map<_, _>>();
        document.insert(ALERTS_KEY.to_string(), Value::Object(alerts));
        document
    }

    /// Write `document` to `path` through a temporary file and a rename.
    pub async fn write_document(document: &Map<String, Value>, path: &Path) -> Result<()> {
        let persistence = |e: std::io::Error| {
            AppError::Persistence(format!("{}: {}", path.display(), e))
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(persistence)?;
        }

        let json = serde_json::to_string_pretty(document)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(persistence)?;
        tokio::fs::rename(&tmp, path).await.map_err(persistence)?;
        Ok(())
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        Self::write_document(&self.to_document(), path).await
    }

    /// Whether the store was loaded with at least one product record.
    pub fn had_history(&self) -> bool {
        self.had_history
    }

    pub fn get(&self, identity: &str) -> Option<&ProductRecord> {
        self.records.get(identity)
    }

    pub fn upsert(&mut self, record: ProductRecord) {
        self.records.insert(record.identity.clone(), record);
    }

    pub fn records(&self) -> impl Iterator<Item = &ProductRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn in_stock_count(&self) -> usize {
        self.records.values().filter(|r| r.is_in_stock()).count()
    }

    pub fn alert_for(&self, identity: &str) -> Option<MessageId> {
        self.alerts.get(identity).copied()
    }

    /// Returns the id this replaced, if any.
    pub fn register_alert(&mut self, identity: &str, message_id: MessageId) -> Option<MessageId> {
        self.alerts.insert(identity.to_string(), message_id)
    }

    pub fn take_alert(&mut self, identity: &str) -> Option<MessageId> {
        self.alerts.remove(identity)
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    pub fn dashboard_messages(&self) -> &[MessageId] {
        &self.dashboard
    }

    pub fn dashboard_messages_mut(&mut self) -> &mut Vec<MessageId> {
        &mut self.dashboard
    }

    /// Drop records whose URL is not in `valid_urls`, along with any alert
    /// that no longer points at an in-stock record.
    pub fn purge_missing(&mut self, valid_urls: &HashSet<String>) -> Purge {
        let before = self.records.len();
        self.records.retain(|_, record| valid_urls.contains(&record.url));
        let removed = before - self.records.len();

        let records = &self.records;
        let mut retracted = Vec::new();
        self.alerts.retain(|identity, message_id| {
            let live = records.get(identity).is_some_and(|r| r.is_in_stock());
            if !live {
                retracted.push(*message_id);
            }
            live
        });

        Purge { removed, retracted }
    }
}
