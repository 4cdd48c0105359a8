//! Single rule: attribute match plus one property transformation

use prtg_model::{is_inherited_prop, is_list_prop, split_tokens, Entity, FieldValue};
use regex::Regex;
use rustc_hash::FxHashMap;
use std::fmt;
use tracing::debug;

use crate::error::{Result, RuleError, TemplateError};
use crate::template::{Extraction, Placeholder, Root, Template};
use crate::types::{RuleMode, RuleSpec};

/// Parent values per property, resolved once per chain application
#[derive(Debug, Default, Clone)]
pub struct InheritedCache {
    values: FxHashMap<String, Vec<String>>,
}

impl InheritedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or compute the inherited value set of `prop`
    ///
    /// Without a parent, or for a property that does not inherit, the empty
    /// set is cached so later lookups still find an entry.
    pub fn resolve(&mut self, parent: Option<&Entity>, prop: &str) -> Vec<String> {
        match parent {
            Some(parent) if is_inherited_prop(prop) => self
                .values
                .entry(prop.to_string())
                .or_insert_with(|| {
                    let mut values: Vec<String> = Vec::new();
                    let tokens = parent.get(prop).map(FieldValue::tokens).unwrap_or_default();
                    for token in tokens {
                        if !values.contains(&token) {
                            values.push(token);
                        }
                    }
                    values
                })
                .clone(),
            _ => {
                self.values.insert(prop.to_string(), Vec::new());
                Vec::new()
            },
        }
    }

    pub fn get(&self, prop: &str) -> Option<&[String]> {
        self.values.get(prop).map(Vec::as_slice)
    }
}

/// Tokens of `value` for comparison purposes
///
/// List-valued properties split on whitespace; scalars are a singleton, and
/// the empty scalar is the empty set.
pub(crate) fn value_set(prop: &str, value: &str) -> Vec<String> {
    if is_list_prop(prop) {
        split_tokens(value)
    } else if value.is_empty() {
        Vec::new()
    } else {
        vec![value.to_string()]
    }
}

/// Entity's own value of `prop`: stored value minus the inherited tokens
pub(crate) fn own_value(entity: &Entity, prop: &str, inherited: &[String]) -> Vec<String> {
    let stored = match entity.get(prop) {
        None => Vec::new(),
        Some(FieldValue::List(items)) => items.clone(),
        Some(FieldValue::Text(text)) => value_set(prop, text),
    };
    stored
        .into_iter()
        .filter(|token| !inherited.contains(token))
        .collect()
}

/// Anchored "starts-with" match of a regex against one entity attribute
#[derive(Debug, Clone)]
pub struct NameMatch {
    attribute: String,
    pattern: String,
    regex: Regex,
}

impl NameMatch {
    pub fn new(attribute: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
            RuleError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            attribute: attribute.into(),
            pattern,
            regex,
        })
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Test the stringified attribute (lists joined with single spaces)
    pub fn matches(&self, entity: &Entity) -> Result<bool> {
        let value = entity
            .get(&self.attribute)
            .ok_or_else(|| RuleError::MissingAttribute {
                attribute: self.attribute.clone(),
                entity: entity.to_string(),
            })?;
        Ok(self.regex.is_match(&value.to_string()))
    }
}

/// Validated rule
#[derive(Debug, Clone)]
pub struct Rule {
    matcher: NameMatch,
    prop: String,
    mode: RuleMode,
    value: Vec<String>,
    remove: Vec<String>,
    formatting: Option<Template>,
    rollback_formatting: Option<Template>,
}

impl Rule {
    pub fn from_spec(spec: RuleSpec) -> Result<Self> {
        let mode = RuleMode::from_update(spec.update);
        let RuleSpec {
            attribute,
            pattern,
            prop,
            value,
            remove,
            formatting,
            rollback_formatting,
            ..
        } = spec;

        if prop.is_empty() {
            return Err(RuleError::InvalidRule("'prop' must not be empty".to_string()));
        }
        if formatting.is_some() && (!value.is_empty() || !remove.is_empty()) {
            return Err(RuleError::InvalidRule(
                "cannot set 'value' nor 'remove' if 'formatting' is set".to_string(),
            ));
        }
        if mode != RuleMode::UpdateList && !remove.is_empty() {
            return Err(RuleError::InvalidRule(
                "cannot set 'remove' when 'update' is false".to_string(),
            ));
        }
        if rollback_formatting.is_some() && !remove.is_empty() {
            return Err(RuleError::InvalidRule(
                "cannot set 'remove' together with 'rollback_formatting'".to_string(),
            ));
        }

        let matcher = NameMatch::new(attribute, pattern)?;
        let formatting = formatting.as_deref().map(Template::parse).transpose()?;
        let rollback_formatting = rollback_formatting
            .as_deref()
            .map(Template::parse)
            .transpose()?;

        if let Some(rollback) = &rollback_formatting {
            let target = Placeholder::entity(prop.as_str());
            if !rollback.contains(&target) {
                return Err(RuleError::InvalidRule(format!(
                    "'rollback_formatting' must contain {}",
                    target
                )));
            }
        }

        Ok(Self {
            matcher,
            prop,
            mode,
            value,
            remove,
            formatting,
            rollback_formatting,
        })
    }

    pub fn matcher(&self) -> &NameMatch {
        &self.matcher
    }

    pub fn prop(&self) -> &str {
        &self.prop
    }

    pub fn mode(&self) -> RuleMode {
        self.mode
    }

    pub fn matches(&self, entity: &Entity) -> Result<bool> {
        self.matcher.matches(entity)
    }

    /// Compute the new own value of `prop`, write it to `entity` and return it
    pub fn eval(
        &self,
        entity: &mut Entity,
        parent: Option<&Entity>,
        cache: &mut InheritedCache,
    ) -> Result<String> {
        let inherited = cache.resolve(parent, &self.prop);
        let mut rolled_back = None;

        if let Some(rollback) = &self.rollback_formatting {
            let recovered = self.roll_back(rollback, entity, parent, &inherited)?;
            entity.update_field(&self.prop, recovered.as_str(), &inherited);
            rolled_back = Some(recovered);
        }

        let tokens = if let Some(formatting) = &self.formatting {
            let formatted = self.format(formatting, entity, parent, &inherited)?;
            value_set(&self.prop, &formatted)
        } else {
            match self.mode {
                RuleMode::UpdateList => {
                    let mut current: Vec<String> = own_value(entity, &self.prop, &inherited)
                        .into_iter()
                        .filter(|token| !self.remove.contains(token))
                        .collect();
                    for token in &self.value {
                        if !current.contains(token) && !inherited.contains(token) {
                            current.push(token.clone());
                        }
                    }
                    current
                },
                // A bare rollback rule keeps the recovered value
                RuleMode::Replace if self.value.is_empty() && rolled_back.is_some() => {
                    own_value(entity, &self.prop, &inherited)
                },
                RuleMode::Replace => self
                    .value
                    .iter()
                    .filter(|token| !inherited.contains(token))
                    .cloned()
                    .collect(),
            }
        };

        let joined = tokens.join(" ");
        entity.update_field(&self.prop, joined.as_str(), &inherited);
        debug!("Rule {} set {} on {}", self, joined, entity);
        Ok(joined)
    }

    fn roll_back(
        &self,
        rollback: &Template,
        entity: &Entity,
        parent: Option<&Entity>,
        inherited: &[String],
    ) -> Result<String> {
        let current = own_value(entity, &self.prop, inherited).join(" ");
        let target = Placeholder::entity(self.prop.as_str());

        // Known values first; wildcards only when the parent has changed since
        let known = rollback.extract(&target, &current, |p| field_text(entity, parent, p))?;
        let extraction = match known {
            Extraction::NoMatch => rollback.extract(&target, &current, |_| None)?,
            other => other,
        };
        match extraction {
            Extraction::Matched(value) => Ok(value),
            Extraction::NoMatch => Err(RuleError::IrreversibleFormat {
                template: rollback.to_string(),
                value: current,
            }),
            Extraction::Inconsistent(captures) => Err(RuleError::InconsistentCapture {
                template: rollback.to_string(),
                captures,
            }),
        }
    }

    fn format(
        &self,
        formatting: &Template,
        entity: &mut Entity,
        parent: Option<&Entity>,
        inherited: &[String],
    ) -> Result<String> {
        let target = Placeholder::entity(self.prop.as_str());
        let current = own_value(entity, &self.prop, inherited).join(" ");

        if formatting.contains(&target) {
            let snapshot: &Entity = entity;
            let strict = formatting.extract(&target, &current, |p| {
                field_text(snapshot, parent, p)
            })?;
            if matches!(strict, Extraction::Matched(_)) {
                return Ok(current);
            }

            if self.mode == RuleMode::UpdateList {
                let loose = formatting.extract(&target, &current, |p| match p.root {
                    Root::Parent => None,
                    Root::Entity => field_text(snapshot, parent, p),
                })?;
                if let Extraction::Matched(value) = loose {
                    entity.update_field(&self.prop, value.as_str(), inherited);
                }
            }
        }

        let own = own_value(entity, &self.prop, inherited).join(" ");
        let snapshot: &Entity = entity;
        formatting
            .render(|p| {
                if *p == target {
                    Some(own.clone())
                } else {
                    field_text(snapshot, parent, p)
                }
            })
            .map_err(|e| match e {
                TemplateError::MissingValue(attribute) => RuleError::MissingAttribute {
                    attribute,
                    entity: snapshot.to_string(),
                },
                other => RuleError::Template(other),
            })
    }
}

/// Text of a placeholder read from the entity or its parent
fn field_text(entity: &Entity, parent: Option<&Entity>, placeholder: &Placeholder) -> Option<String> {
    let source = match placeholder.root {
        Root::Entity => Some(entity),
        Root::Parent => parent,
    };
    source
        .and_then(|e| e.get(&placeholder.field))
        .map(ToString::to_string)
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rule(attribute={}, pattern={}, prop={}",
            self.matcher.attribute, self.matcher.pattern, self.prop
        )?;
        if let Some(formatting) = &self.formatting {
            write!(f, ", formatting={}", formatting)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use prtg_model::EntityKind;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn device(name: &str, tags: &str) -> Entity {
        Entity::from_fields(
            EntityKind::Device,
            [("objid", "123"), ("name", name), ("tags", tags)],
        )
    }

    fn sorted(mut values: Vec<String>) -> Vec<String> {
        values.sort();
        values
    }

    fn eval(spec: RuleSpec, entity: &mut Entity, parent: Option<&Entity>) -> Result<String> {
        let rule = Rule::from_spec(spec)?;
        rule.eval(entity, parent, &mut InheritedCache::new())
    }

    #[test]
    fn test_update_adds_no_duplicates() {
        let parent = device("parent", "tc");
        let mut entity = device("aba", "ta tb tc");
        let spec = RuleSpec::new("name", "^a", "tags")
            .update(true)
            .value(["ta", "td"]);
        let value = eval(spec, &mut entity, Some(&parent)).unwrap();
        assert_eq!(value, "ta tb td");
        assert_eq!(entity.tags(), strings(&["ta", "tb", "td", "tc"]).as_slice());
    }

    #[test]
    fn test_update_removes_own_values_only() {
        let parent = device("parent", "ta tc");
        let mut entity = device("aba", "ta tb tc td te");
        let spec = RuleSpec::new("name", "^a", "tags")
            .update(true)
            .value(["ta", "tb", "tf", "tg"])
            .remove(["tb", "tc", "td", "tf"]);
        let value = eval(spec, &mut entity, Some(&parent)).unwrap();
        assert_eq!(
            sorted(split_tokens(&value)),
            strings(&["tb", "te", "tf", "tg"])
        );
    }

    #[test]
    fn test_replace_excludes_inherited() {
        let parent = device("parent", "ta");
        let mut entity = device("aba", "ta tb tc td");
        let spec = RuleSpec::new("name", "^a", "tags").value(["ta", "tb", "te"]);
        let value = eval(spec, &mut entity, Some(&parent)).unwrap();
        assert_eq!(value, "tb te");
        assert_eq!(entity.tags(), strings(&["tb", "te", "ta"]).as_slice());
    }

    #[test]
    fn test_inherited_cache_dedups_and_caches_empty() {
        let parent = device("parent", "a b a");
        let mut cache = InheritedCache::new();
        assert_eq!(cache.resolve(Some(&parent), "tags"), strings(&["a", "b"]));
        assert!(cache.resolve(Some(&parent), "name").is_empty());
        assert_eq!(cache.get("name"), Some(&[][..]));
        assert!(cache.resolve(None, "location").is_empty());
        assert!(cache.get("location").is_some());
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            RuleSpec::new("name", "a", "tags")
                .formatting("{entity.name}")
                .value(["x"]),
            RuleSpec::new("name", "a", "tags").remove(["x"]),
            RuleSpec::new("name", "a", "name")
                .update(true)
                .remove(["x"])
                .rollback_formatting("{entity.name}"),
            RuleSpec::new("name", "a", "name").rollback_formatting("{parent.name}"),
        ];
        for spec in cases {
            assert!(matches!(
                Rule::from_spec(spec),
                Err(RuleError::InvalidRule(_))
            ));
        }

        assert!(matches!(
            Rule::from_spec(RuleSpec::new("name", "(", "tags")),
            Err(RuleError::InvalidPattern { .. })
        ));
        assert!(matches!(
            Rule::from_spec(RuleSpec::new("name", "a", "name").formatting("{device.name}")),
            Err(RuleError::Template(TemplateError::InvalidPlaceholder(_)))
        ));
    }

    #[test]
    fn test_name_match_is_anchored_at_start() {
        let matcher = NameMatch::new("name", "a").unwrap();
        assert!(matcher.matches(&device("aba", "")).unwrap());
        assert!(!matcher.matches(&device("xaba", "")).unwrap());

        let matcher = NameMatch::new("name", "x|a").unwrap();
        assert!(!matcher.matches(&device("bax", "")).unwrap());
    }

    #[test]
    fn test_name_match_joins_lists_and_is_case_sensitive() {
        let matcher = NameMatch::new("tags", "net core").unwrap();
        assert!(matcher.matches(&device("x", "net core edge")).unwrap());
        let matcher = NameMatch::new("name", "ABA").unwrap();
        assert!(!matcher.matches(&device("aba", "")).unwrap());
    }

    #[test]
    fn test_name_match_missing_attribute() {
        let matcher = NameMatch::new("location", ".*").unwrap();
        let err = matcher.matches(&device("aba", "")).unwrap_err();
        assert!(matches!(err, RuleError::MissingAttribute { .. }));
    }

    #[test]
    fn test_formatting_renders_from_parent() {
        let parent = device("Core", "");
        let mut entity = device("switch", "");
        let spec = RuleSpec::new("name", "s", "name").formatting("{parent.name} - {entity.name}");
        let value = eval(spec, &mut entity, Some(&parent)).unwrap();
        assert_eq!(value, "Core - switch");
        assert_eq!(entity.name(), Some("Core - switch"));
    }

    #[test]
    fn test_formatting_keeps_value_with_desired_shape() {
        let parent = device("Core", "");
        let mut entity = device("Core - switch", "");
        let spec = RuleSpec::new("name", "C", "name").formatting("{parent.name} - {entity.name}");
        let value = eval(spec, &mut entity, Some(&parent)).unwrap();
        assert_eq!(value, "Core - switch");
    }

    #[test]
    fn test_formatting_update_replaces_stale_parent() {
        // Parent was renamed: the old prefix is stripped before formatting
        let parent = device("Edge", "");
        let mut entity = device("Core - switch", "");
        let spec = RuleSpec::new("name", "C", "name")
            .update(true)
            .formatting("{parent.name} - {entity.name}");
        let value = eval(spec, &mut entity, Some(&parent)).unwrap();
        assert_eq!(value, "Edge - switch");

        // Without update the stale prefix is kept
        let mut entity = device("Core - switch", "");
        let spec = RuleSpec::new("name", "C", "name").formatting("{parent.name} - {entity.name}");
        let value = eval(spec, &mut entity, Some(&parent)).unwrap();
        assert_eq!(value, "Edge - Core - switch");
    }

    #[test]
    fn test_formatting_missing_parent_field() {
        let parent = device("Core", "");
        let mut entity = device("switch", "");
        let spec = RuleSpec::new("name", "s", "name").formatting("{parent.location}/{entity.name}");
        let err = eval(spec, &mut entity, Some(&parent)).unwrap_err();
        assert!(matches!(err, RuleError::MissingAttribute { .. }));
    }

    #[test]
    fn test_rollback_recovers_value() {
        let mut entity = device("Core - switch", "");
        let spec = RuleSpec::new("name", "C", "name")
            .rollback_formatting("{parent.name} - {entity.name}");
        let value = eval(spec, &mut entity, None).unwrap();
        assert_eq!(value, "switch");
        assert_eq!(entity.name(), Some("switch"));
    }

    #[test]
    fn test_rollback_failures() {
        let mut entity = device("switch", "");
        let spec = RuleSpec::new("name", "s", "name")
            .rollback_formatting("{parent.name} - {entity.name}");
        let err = eval(spec, &mut entity, None).unwrap_err();
        assert!(matches!(err, RuleError::IrreversibleFormat { .. }));

        let mut entity = device("a:b", "");
        let spec = RuleSpec::new("name", "a", "name")
            .rollback_formatting("{entity.name}:{entity.name}");
        let err = eval(spec, &mut entity, None).unwrap_err();
        assert!(matches!(err, RuleError::InconsistentCapture { .. }));
    }

    #[test]
    fn test_rule_display() {
        let rule = Rule::from_spec(RuleSpec::new("name", "^a", "tags")).unwrap();
        assert_eq!(rule.to_string(), "Rule(attribute=name, pattern=^a, prop=tags)");
    }
}
