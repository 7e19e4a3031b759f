//! Resource selectors: what a stack asks for.

use serde::{Deserialize, Serialize};

use crate::resource::ResourceKind;

/// Where a selector expects its resource to come from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "name")]
pub enum SelectorSource {
    /// The single declared producer of the kind.
    Any,
    /// The kind as produced by a specific upstream stack.
    Stack(String),
    /// A named export, possibly published by an earlier, separate run.
    Export(String),
}

/// A query describing which resource a stack needs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceSelector {
    pub kind: ResourceKind,
    pub source: SelectorSource,
}

impl ResourceSelector {
    /// Any producer of `kind`; resolution fails if there is more than one.
    pub fn kind(kind: ResourceKind) -> Self {
        Self {
            kind,
            source: SelectorSource::Any,
        }
    }

    pub fn from_stack(kind: ResourceKind, stack: impl Into<String>) -> Self {
        Self {
            kind,
            source: SelectorSource::Stack(stack.into()),
        }
    }

    pub fn export(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            source: SelectorSource::Export(name.into()),
        }
    }

    pub fn export_name(&self) -> Option<&str> {
        match &self.source {
            SelectorSource::Export(name) => Some(name),
            _ => None,
        }
    }

    pub fn stack_id(&self) -> Option<&str> {
        match &self.source {
            SelectorSource::Stack(id) => Some(id),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            SelectorSource::Any => write!(f, "{}", self.kind),
            SelectorSource::Stack(stack) => write!(f, "{} from {}", self.kind, stack),
            SelectorSource::Export(name) => write!(f, "{} via export '{}'", self.kind, name),
        }
    }
}
