//! Integration tests for rule chains over device tags and names
//!
//! Devices carry their parent's tags as stored values; the chain must only
//! ever compute the device's own tags.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use prtg_model::{Entity, EntityKind};
use prtg_rules::{RuleChain, RuleError, RuleSpec};
use std::collections::BTreeSet;

fn device(name: &str, tags: &[&str]) -> Entity {
    Entity::from_fields(
        EntityKind::Device,
        [
            ("objid", "123".to_string()),
            ("name", name.to_string()),
            ("tags", tags.join(" ")),
        ],
    )
}

fn group(name: &str, tags: &[&str]) -> Entity {
    Entity::from_fields(
        EntityKind::Group,
        [
            ("objid", "10".to_string()),
            ("name", name.to_string()),
            ("tags", tags.join(" ")),
        ],
    )
}

fn tags_rule(update: bool, value: &[&str], remove: &[&str]) -> RuleSpec {
    RuleSpec::new("name", "^a", "tags")
        .update(update)
        .value(value.iter().copied())
        .remove(remove.iter().copied())
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Stored tags are own ∪ parent; `changes` holds the own tags only when changed
fn assert_tags_and_changes(
    expected_own: &[&str],
    changed: bool,
    device: &Entity,
    parent: &Entity,
    changes: &prtg_rules::Changes,
) {
    let mut expected = set(expected_own);
    expected.extend(parent.tags().iter().cloned());
    let stored: BTreeSet<String> = device.tags().iter().cloned().collect();
    assert_eq!(stored, expected);

    if changed {
        assert_eq!(changes.keys().collect::<Vec<_>>(), vec!["tags"]);
        let own: BTreeSet<String> = changes["tags"].split(' ').map(str::to_string).collect();
        assert_eq!(own, set(expected_own));
    } else {
        assert!(changes.is_empty(), "unexpected changes: {:?}", changes);
    }
}

#[test]
fn test_tags_chain() {
    let mut device = device("aba", &["ta", "tb", "tc", "td"]);
    let parent = group("parent", &["ta", "tb"]);
    let chain = RuleChain::from_specs([
        tags_rule(true, &["ta", "te"], &["ta", "tc"]),
        tags_rule(true, &["tf"], &["td", "tg"]),
        tags_rule(true, &["th"], &[]),
        tags_rule(true, &[], &["tf"]),
    ])
    .unwrap();

    let changes = chain.apply(&mut device, Some(&parent)).unwrap();
    assert_tags_and_changes(&["te", "th"], true, &device, &parent, &changes);
}

#[test]
fn test_no_match() {
    let mut device = device("some other device", &["ta", "tb", "tc", "td"]);
    let parent = group("parent", &["ta", "tb"]);
    let chain = RuleChain::from_specs([tags_rule(true, &["ta", "te"], &["ta", "tc"])]).unwrap();

    let changes = chain.apply(&mut device, Some(&parent)).unwrap();
    assert_tags_and_changes(&["tc", "td"], false, &device, &parent, &changes);
}

#[test]
fn test_no_changes() {
    let mut device = device("aba", &["ta", "tb", "tc"]);
    let parent = group("parent", &["ta"]);
    let chain = RuleChain::from_specs([
        tags_rule(true, &["ta", "tb"], &["ta", "tc"]),
        tags_rule(true, &["tc"], &["td"]),
    ])
    .unwrap();

    let changes = chain.apply(&mut device, Some(&parent)).unwrap();
    assert_tags_and_changes(&["tb", "tc"], false, &device, &parent, &changes);
}

#[test]
fn test_no_changes_when_cleaning_all() {
    let mut device = device("aba", &["ta"]);
    let parent = group("parent", &["ta"]);
    let chain = RuleChain::from_specs([tags_rule(false, &[], &[])]).unwrap();

    let changes = chain.apply(&mut device, Some(&parent)).unwrap();
    assert_tags_and_changes(&[], false, &device, &parent, &changes);
}

#[test]
fn test_tags_chain_no_update_in_the_middle() {
    let mut device = device("aba", &["ta", "tb", "tc"]);
    let parent = group("parent", &["ta"]);
    let chain = RuleChain::from_specs([
        tags_rule(true, &["ta", "td"], &["ta", "tc"]),
        tags_rule(false, &["te", "tf"], &[]),
        tags_rule(true, &["tg"], &["tf"]),
    ])
    .unwrap();

    let changes = chain.apply(&mut device, Some(&parent)).unwrap();
    assert_tags_and_changes(&["te", "tg"], true, &device, &parent, &changes);
}

#[test]
fn test_update_is_idempotent() {
    let mut device = device("aba", &["tb"]);
    let parent = group("parent", &["ta"]);
    let chain = RuleChain::from_specs([tags_rule(true, &["tc", "tc", "ta"], &["tb"])]).unwrap();

    let first = chain.apply(&mut device, Some(&parent)).unwrap();
    assert_eq!(first["tags"], "tc");

    let second = chain.apply(&mut device, Some(&parent)).unwrap();
    assert!(second.is_empty());
    assert_tags_and_changes(&["tc"], false, &device, &parent, &second);
}

#[test]
fn test_removed_value_is_reapplied() {
    let mut device = device("aba", &["tb", "tx"]);
    let parent = group("parent", &[]);
    let chain = RuleChain::from_specs([tags_rule(true, &["tb"], &["tb", "tx"])]).unwrap();

    let changes = chain.apply(&mut device, Some(&parent)).unwrap();
    assert_tags_and_changes(&["tb"], true, &device, &parent, &changes);
}

#[test]
fn test_match_is_anchored_at_start() {
    let parent = group("parent", &[]);
    let chain = RuleChain::from_specs([RuleSpec::new("name", "a", "tags").value(["new"])]).unwrap();

    let mut matching = device("aba", &["old"]);
    let changes = chain.apply(&mut matching, Some(&parent)).unwrap();
    assert_eq!(changes["tags"], "new");

    let mut other = device("xaba", &["old"]);
    let changes = chain.apply(&mut other, Some(&parent)).unwrap();
    assert!(changes.is_empty());
    assert_eq!(other.tags(), ["old".to_string()].as_slice());
}

#[test]
fn test_format_then_rollback_round_trip() {
    let parent = group("Core", &[]);
    let mut device = device("switch-01", &[]);

    let format = RuleChain::from_specs([
        RuleSpec::new("name", ".*", "name").formatting("{parent.name} - {entity.name}")
    ])
    .unwrap();
    let changes = format.apply(&mut device, Some(&parent)).unwrap();
    assert_eq!(changes["name"], "Core - switch-01");

    // Applying again finds the desired shape and reports nothing
    let changes = format.apply(&mut device, Some(&parent)).unwrap();
    assert!(changes.is_empty());

    let rollback = RuleChain::from_specs([RuleSpec::new("name", ".*", "name")
        .rollback_formatting("{parent.name} - {entity.name}")])
    .unwrap();
    let changes = rollback.apply(&mut device, Some(&parent)).unwrap();
    assert_eq!(changes["name"], "switch-01");
    assert_eq!(device.name(), Some("switch-01"));
}

#[test]
fn test_rollback_then_reformat_under_new_parent() {
    let old_parent = group("Core", &[]);
    let new_parent = group("Edge", &[]);
    let mut device = device("x", &[]);

    let format = RuleChain::from_specs([
        RuleSpec::new("name", ".*", "name").formatting("{parent.name}/{entity.name}")
    ])
    .unwrap();
    format.apply(&mut device, Some(&old_parent)).unwrap();
    assert_eq!(device.name(), Some("Core/x"));

    let move_chain = RuleChain::from_specs([RuleSpec::new("name", ".*", "name")
        .rollback_formatting("{parent.name}/{entity.name}")
        .formatting("{parent.name}/{entity.name}")])
    .unwrap();
    let changes = move_chain.apply(&mut device, Some(&new_parent)).unwrap();
    assert_eq!(changes["name"], "Edge/x");
}

#[test]
fn test_failure_is_all_or_nothing() {
    let parent = group("parent", &["ta"]);
    let mut device = device("aba", &["tb"]);
    let original = device.clone();

    let chain = RuleChain::from_specs([
        tags_rule(true, &["tc"], &[]),
        RuleSpec::new("name", "a", "name").rollback_formatting("[{entity.name}]"),
    ])
    .unwrap();

    let err = chain.apply(&mut device, Some(&parent)).unwrap_err();
    assert!(matches!(err, RuleError::IrreversibleFormat { .. }));
    assert_eq!(device, original);
}

#[test]
fn test_chain_from_rule_file() {
    let yaml = r#"
- attribute: name
  pattern: "^a"
  prop: tags
  update: true
  value: [managed]
  remove: [legacy]
- attribute: tags
  pattern: ".*managed"
  prop: name
  formatting: "{parent.name}-{entity.name}"
"#;
    let chain = RuleChain::from_yaml_str(yaml).unwrap();
    let parent = group("site", &[]);
    let mut device = device("aba", &["legacy", "x"]);

    let changes = chain.apply(&mut device, Some(&parent)).unwrap();
    assert_eq!(changes["tags"], "x managed");
    assert_eq!(changes["name"], "site-aba");
}

#[test]
fn test_rollback_with_separator_in_parent_name() {
    let parent = group("Europe - West", &[]);
    let mut device = device("sw01", &[]);
    let template = "{parent.name} - {entity.name}";

    let format =
        RuleChain::from_specs([RuleSpec::new("name", ".*", "name").formatting(template)]).unwrap();
    format.apply(&mut device, Some(&parent)).unwrap();
    assert_eq!(device.name(), Some("Europe - West - sw01"));

    let rollback =
        RuleChain::from_specs([RuleSpec::new("name", ".*", "name").rollback_formatting(template)])
            .unwrap();
    let changes = rollback.apply(&mut device, Some(&parent)).unwrap();
    assert_eq!(changes["name"], "sw01");
    assert_eq!(device.name(), Some("sw01"));
}

#[test]
fn test_reformat_after_parent_rename_drops_old_parent_name() {
    let old_parent = group("Europe - West", &[]);
    let new_parent = group("Asia", &[]);
    let mut device = device("sw01", &[]);

    let format = RuleChain::from_specs([RuleSpec::new("name", ".*", "name")
        .update(true)
        .formatting("{parent.name} - {entity.name}")])
    .unwrap();
    format.apply(&mut device, Some(&old_parent)).unwrap();
    assert_eq!(device.name(), Some("Europe - West - sw01"));

    let changes = format.apply(&mut device, Some(&new_parent)).unwrap();
    assert_eq!(changes["name"], "Asia - sw01");
    assert_eq!(device.name(), Some("Asia - sw01"));
}
