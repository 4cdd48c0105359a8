//! Rule configuration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Effective changes of one chain application: property name to new own value
pub type Changes = BTreeMap<String, String>;

/// How a rule computes the new value when no formatting template is set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleMode {
    /// New value is the literal `value` minus inherited tokens
    #[default]
    Replace,
    /// Existing own value is edited: `remove` stripped, `value` appended
    UpdateList,
}

impl RuleMode {
    pub fn from_update(update: bool) -> Self {
        if update {
            RuleMode::UpdateList
        } else {
            RuleMode::Replace
        }
    }
}

/// Declarative rule as written in rule files
///
/// ```yaml
/// - attribute: name
///   pattern: "^core-"
///   prop: tags
///   update: true
///   value: [network, core]
///   remove: [legacy]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Entity attribute the pattern is matched against
    pub attribute: String,
    pub pattern: String,
    /// Property the rule rewrites
    pub prop: String,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub value: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_formatting: Option<String>,
}

impl RuleSpec {
    pub fn new(
        attribute: impl Into<String>,
        pattern: impl Into<String>,
        prop: impl Into<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            pattern: pattern.into(),
            prop: prop.into(),
            ..Default::default()
        }
    }

    pub fn update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    pub fn value<I, S>(mut self, value: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.value = value.into_iter().map(Into::into).collect();
        self
    }

    pub fn remove<I, S>(mut self, remove: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove = remove.into_iter().map(Into::into).collect();
        self
    }

    pub fn formatting(mut self, template: impl Into<String>) -> Self {
        self.formatting = Some(template.into());
        self
    }

    pub fn rollback_formatting(mut self, template: impl Into<String>) -> Self {
        self.rollback_formatting = Some(template.into());
        self
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_rule_spec_defaults_from_yaml() {
        let spec: RuleSpec =
            serde_yaml::from_str("attribute: name\npattern: '^a'\nprop: tags\n").unwrap();
        assert!(!spec.update);
        assert!(spec.value.is_empty());
        assert!(spec.remove.is_empty());
        assert!(spec.formatting.is_none());
    }

    #[test]
    fn test_rule_spec_rejects_unknown_keys() {
        let result: Result<RuleSpec, _> =
            serde_json::from_str(r#"{"attribute":"name","pattern":"x","prop":"tags","keep":[]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_rule_mode_from_update() {
        assert_eq!(RuleMode::from_update(true), RuleMode::UpdateList);
        assert_eq!(RuleMode::from_update(false), RuleMode::Replace);
    }
}
