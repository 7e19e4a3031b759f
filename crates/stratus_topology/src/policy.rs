//! Reference policy: which mechanism each resource kind is passed by.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stratus_core::{ResourceKind, ResourceSelector, SelectorSource};

/// How a consumer reaches a producer's resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMode {
    /// Direct handoff from a stack in the same run
    Handoff,
    /// Lookup by export name, possibly across runs
    Export,
}

impl std::fmt::Display for ReferenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceMode::Handoff => write!(f, "handoff"),
            ReferenceMode::Export => write!(f, "export"),
        }
    }
}

/// One reference mode per resource kind.
///
/// ```yaml
/// reference_policy:
///   default: handoff
///   overrides:
///     parameter: export
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencePolicy {
    pub default: ReferenceMode,
    pub overrides: BTreeMap<ResourceKind, ReferenceMode>,
}

impl Default for ReferencePolicy {
    fn default() -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert(ResourceKind::Parameter, ReferenceMode::Export);
        Self {
            default: ReferenceMode::Handoff,
            overrides,
        }
    }
}

impl ReferencePolicy {
    /// Policy applying `mode` to every kind.
    pub fn uniform(mode: ReferenceMode) -> Self {
        Self {
            default: mode,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, kind: ResourceKind, mode: ReferenceMode) -> Self {
        self.overrides.insert(kind, mode);
        self
    }

    pub fn mode_for(&self, kind: ResourceKind) -> ReferenceMode {
        self.overrides.get(&kind).copied().unwrap_or(self.default)
    }

    /// Mode a selector actually uses.
    pub fn mode_of(selector: &ResourceSelector) -> ReferenceMode {
        match selector.source {
            SelectorSource::Export(_) => ReferenceMode::Export,
            SelectorSource::Any | SelectorSource::Stack(_) => ReferenceMode::Handoff,
        }
    }

    /// Check a selector against the policy, returning the violation message.
    pub fn check(&self, selector: &ResourceSelector) -> Result<(), String> {
        let expected = self.mode_for(selector.kind);
        let actual = Self::mode_of(selector);
        if expected == actual {
            Ok(())
        } else {
            Err(format!(
                "{} resources are passed by {}, but '{}' uses {}",
                selector.kind, expected, selector, actual
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ReferencePolicy::default();
        assert_eq!(policy.mode_for(ResourceKind::Parameter), ReferenceMode::Export);
        assert_eq!(policy.mode_for(ResourceKind::Network), ReferenceMode::Handoff);

        assert!(policy
            .check(&ResourceSelector::from_stack(ResourceKind::Network, "Network"))
            .is_ok());
        assert!(policy
            .check(&ResourceSelector::export(ResourceKind::Parameter, "SecretKeyParameter"))
            .is_ok());
    }

    #[test]
    fn test_mixed_use_is_rejected() {
        let policy = ReferencePolicy::default();
        let message = policy
            .check(&ResourceSelector::export(ResourceKind::Network, "SkillShiftVpcId"))
            .unwrap_err();
        assert!(message.contains("passed by handoff"));

        assert!(policy.check(&ResourceSelector::kind(ResourceKind::Parameter)).is_err());
    }

    #[test]
    fn test_policy_from_yaml() {
        let policy: ReferencePolicy = serde_yaml::from_str(
            r#"
default: export
overrides:
  role: handoff
"#,
        )
        .unwrap();

        assert_eq!(policy.mode_for(ResourceKind::Network), ReferenceMode::Export);
        assert_eq!(policy.mode_for(ResourceKind::Role), ReferenceMode::Handoff);
        assert_eq!(
            ReferencePolicy::uniform(ReferenceMode::Export).with_override(ResourceKind::Role, ReferenceMode::Handoff),
            policy
        );
    }
}
