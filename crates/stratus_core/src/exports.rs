//! Persisted export table for cross-run references.
//!
//! Exports form a flat namespace of names to string values. Each record also
//! remembers the kind and attributes of the resource it came from, so a
//! consumer in a later run can be bound to a typed resource rather than a
//! bare string.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::resource::{Attributes, Resource, ResourceKind};

/// A published export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    /// Export name
    pub name: String,
    /// Published value (an id, ARN or DNS name)
    pub value: String,
    /// Kind of the exported resource; `None` for plain values
    #[serde(default)]
    pub kind: Option<ResourceKind>,
    /// Id of the exported resource
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Stack that published the export
    #[serde(default)]
    pub producing_stack: Option<String>,
    /// Full attribute snapshot of the exported resource
    #[serde(default)]
    pub attributes: Attributes,
    /// Run that last published the export
    #[serde(default)]
    pub run_id: Option<String>,
    pub exported_at: DateTime<Utc>,
}

impl ExportRecord {
    /// Build a record publishing `attribute` of `resource`.
    pub fn from_resource(name: impl Into<String>, resource: &Resource, attribute: &str) -> Option<Self> {
        let value = resource.attribute_string(attribute)?;
        Some(Self {
            name: name.into(),
            value,
            kind: Some(resource.kind()),
            resource_id: Some(resource.id().to_string()),
            producing_stack: Some(resource.producing_stack().to_string()),
            attributes: resource.attributes().clone(),
            run_id: None,
            exported_at: Utc::now(),
        })
    }

    /// A plain value export with no resource behind it.
    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: None,
            resource_id: None,
            producing_stack: None,
            attributes: Attributes::new(),
            run_id: None,
            exported_at: Utc::now(),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

/// Export table keyed by export name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportTable {
    exports: BTreeMap<String, ExportRecord>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table from disk. A missing file is an empty table.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            debug!("No export table at {:?}, starting empty", path);
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        let table: Self = serde_json::from_str(&content)?;
        debug!("Loaded {} exports from {:?}", table.len(), path);
        Ok(table)
    }

    /// Save the table to disk, creating parent directories.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        debug!("Saved export table to {:?}", path);
        Ok(())
    }

    /// Publish an export.
    ///
    /// Re-publishing from the same stack replaces the previous value. A name
    /// already owned by a different stack is an `ExportCollision`.
    pub fn publish(&mut self, record: ExportRecord) -> CoreResult<()> {
        if let Some(existing) = self.exports.get(&record.name) {
            if existing.producing_stack != record.producing_stack {
                return Err(CoreError::ExportCollision {
                    name: record.name.clone(),
                    existing: owner_label(&existing.producing_stack),
                    attempted: owner_label(&record.producing_stack),
                });
            }
        }
        info!("Publishing export {} = {}", record.name, record.value);
        self.exports.insert(record.name.clone(), record);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ExportRecord> {
        self.exports.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.exports.contains_key(name)
    }

    /// Exports in name order.
    pub fn records(&self) -> impl Iterator<Item = &ExportRecord> {
        self.exports.values()
    }

    /// Exports published by `stack`.
    pub fn published_by(&self, stack: &str) -> Vec<&ExportRecord> {
        self.exports
            .values()
            .filter(|r| r.producing_stack.as_deref() == Some(stack))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

fn owner_label(owner: &Option<String>) -> String {
    owner.clone().unwrap_or_else(|| "<external>".to_string())
}

/// Default export table location inside a state directory.
pub fn exports_path(state_dir: &Path) -> PathBuf {
    state_dir.join("exports.json")
}
