//! Ordered rule sequence applied to one entity at a time

use prtg_model::Entity;
use std::collections::BTreeSet;
use tracing::{debug, error};

use crate::error::Result;
use crate::rule::{own_value, value_set, InheritedCache, Rule};
use crate::types::{Changes, RuleSpec};

#[derive(Debug, Clone, Default)]
pub struct RuleChain {
    rules: Vec<Rule>,
}

impl RuleChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate every spec; the first invalid one fails the whole chain
    pub fn from_specs<I>(specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = RuleSpec>,
    {
        let mut chain = Self::new();
        chain.append_all(specs)?;
        Ok(chain)
    }

    /// Parse a YAML sequence of rule dictionaries
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let specs: Vec<RuleSpec> = serde_yaml::from_str(source)?;
        Self::from_specs(specs)
    }

    /// Parse a JSON array of rule dictionaries
    pub fn from_json_str(source: &str) -> Result<Self> {
        let specs: Vec<RuleSpec> = serde_json::from_str(source)?;
        Self::from_specs(specs)
    }

    pub fn append_all<I>(&mut self, specs: I) -> Result<()>
    where
        I: IntoIterator<Item = RuleSpec>,
    {
        let rules = specs
            .into_iter()
            .map(Rule::from_spec)
            .collect::<Result<Vec<_>>>()?;
        self.rules.extend(rules);
        Ok(())
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every matching rule to `entity` and return the effective changes
    ///
    /// On failure the entity is restored to its state before the call.
    pub fn apply(&self, entity: &mut Entity, parent: Option<&Entity>) -> Result<Changes> {
        let snapshot = entity.clone();
        let mut cache = InheritedCache::new();
        let mut changes = Changes::new();

        for rule in &self.rules {
            let outcome = rule
                .matches(entity)
                .and_then(|matched| {
                    if matched {
                        rule.eval(entity, parent, &mut cache).map(Some)
                    } else {
                        Ok(None)
                    }
                });
            match outcome {
                Ok(Some(value)) => {
                    changes.insert(rule.prop().to_string(), value);
                },
                Ok(None) => {},
                Err(e) => {
                    error!("Unable to apply {} to {}: {}", rule, snapshot, e);
                    *entity = snapshot;
                    return Err(e);
                },
            }
        }

        let effective = effective_changes(&snapshot, &cache, changes);
        debug!("{} effective change(s) for {}", effective.len(), entity);
        Ok(effective)
    }
}

/// Drop changes whose token set equals the original own value
fn effective_changes(original: &Entity, cache: &InheritedCache, changes: Changes) -> Changes {
    changes
        .into_iter()
        .filter(|(prop, value)| {
            let inherited = cache.get(prop).unwrap_or_default();
            let before: BTreeSet<String> = own_value(original, prop, inherited).into_iter().collect();
            let after: BTreeSet<String> = value_set(prop, value).into_iter().collect();
            before != after
        })
        .collect()
}
