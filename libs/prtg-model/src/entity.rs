//! Entity record and field values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::schema::{is_list_prop, EntityKind};

const ID_FIELD: &str = "objid";
const PARENT_ID_FIELD: &str = "parentid";
const TAGS_FIELD: &str = "tags";
const TYPE_FIELD: &str = "type";
const NAME_FIELD: &str = "name";

/// Value stored in an entity field slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Scalar value, kept verbatim (ids are never coerced to numbers)
    Text(String),
    /// Token sequence for list-valued properties
    List(Vec<String>),
}

impl FieldValue {
    /// Tokens of the value: the list itself, or the scalar as a singleton
    pub fn tokens(&self) -> Vec<String> {
        match self {
            FieldValue::Text(text) => vec![text.clone()],
            FieldValue::List(items) => items.clone(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::Text(_) => None,
            FieldValue::List(items) => Some(items),
        }
    }
}

impl fmt::Display for FieldValue {
    /// Lists render space-joined, the same shape the server uses for tags
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::List(items) => f.write_str(&items.join(" ")),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

/// Split a delimited list value into tokens (empty string yields no tokens)
pub fn split_tokens(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// One PRTG object: a kind discriminator plus its field table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    kind: EntityKind,
    /// Set once the entity was written back to the cache after a local mutation
    #[serde(default)]
    changed: bool,
    fields: BTreeMap<String, FieldValue>,
}

impl Entity {
    /// Empty entity of `kind`; only `type` and `tags` are populated
    pub fn new(kind: EntityKind) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            TYPE_FIELD.to_string(),
            FieldValue::Text(kind.display_name().to_string()),
        );
        fields.insert(TAGS_FIELD.to_string(), FieldValue::List(Vec::new()));
        Self {
            kind,
            changed: false,
            fields,
        }
    }

    /// Build an entity from decoded attributes, keeping only schema fields
    pub fn from_fields<I, K, V>(kind: EntityKind, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::from_fields_inheriting(kind, attributes, &[])
    }

    /// Like [`Entity::from_fields`], appending `inherited` to list-valued fields
    pub fn from_fields_inheriting<I, K, V>(
        kind: EntityKind,
        attributes: I,
        inherited: &[String],
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut entity = Self::new(kind);
        for (key, value) in attributes {
            let key = key.as_ref();
            if kind.recognizes(key) {
                entity.update_field(key, FieldValue::Text(value.into()), inherited);
            }
        }
        entity
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Content-type tag of the entity kind
    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }

    pub fn id(&self) -> Option<&str> {
        self.text(ID_FIELD)
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.text(PARENT_ID_FIELD)
    }

    pub fn name(&self) -> Option<&str> {
        self.text(NAME_FIELD)
    }

    /// Stored tags (own and inherited)
    pub fn tags(&self) -> &[String] {
        self.fields
            .get(TAGS_FIELD)
            .and_then(FieldValue::as_list)
            .unwrap_or(&[])
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn set_changed(&mut self, changed: bool) {
        self.changed = changed;
    }

    /// Field slot by name, `None` when the field was never set
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Scalar field by name
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::as_text)
    }

    /// Iterate over all populated fields, ordered by name
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set a field, splitting list-valued text and appending `inherited` to it
    ///
    /// Text for a list-valued property is split into tokens and `inherited`
    /// is appended (own values first, no deduplication). A value given as a
    /// token list is stored verbatim. Names outside the schema are accepted.
    pub fn update_field(&mut self, name: &str, value: impl Into<FieldValue>, inherited: &[String]) {
        let value = match value.into() {
            FieldValue::Text(text) if is_list_prop(name) => {
                let mut tokens = split_tokens(&text);
                tokens.extend(inherited.iter().cloned());
                FieldValue::List(tokens)
            },
            other => other,
        };
        self.fields.insert(name.to_string(), value);
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(objid={}, name={})",
            self.kind.display_name(),
            self.id().unwrap_or("-"),
            self.name().unwrap_or("-")
        )
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_new_entity_defaults() {
        let device = Entity::new(EntityKind::Device);
        assert_eq!(device.kind(), EntityKind::Device);
        assert_eq!(device.text("type"), Some("Device"));
        assert!(device.tags().is_empty());
        assert_eq!(device.id(), None);
        assert!(!device.is_changed());
    }

    #[test]
    fn test_from_fields_drops_unknown_and_splits_tags() {
        let device = Entity::from_fields(
            EntityKind::Device,
            [
                ("objid", "2001"),
                ("name", "core-switch"),
                ("tags", "net core"),
                ("host", "10.0.0.1"),
                ("bogus", "dropped"),
            ],
        );
        assert_eq!(device.id(), Some("2001"));
        assert_eq!(device.tags(), strings(&["net", "core"]).as_slice());
        assert_eq!(device.text("host"), Some("10.0.0.1"));
        assert!(device.get("bogus").is_none());
    }

    #[test]
    fn test_ids_are_not_coerced() {
        let sensor = Entity::from_fields(EntityKind::Sensor, [("objid", "A-17"), ("parentid", "0042")]);
        assert_eq!(sensor.id(), Some("A-17"));
        assert_eq!(sensor.parent_id(), Some("0042"));
    }

    #[test]
    fn test_kind_columns_are_scoped() {
        let group = Entity::from_fields(EntityKind::Group, [("host", "x"), ("group", "Root")]);
        assert!(group.get("host").is_none());
        assert_eq!(group.text("group"), Some("Root"));
    }

    #[test]
    fn test_from_fields_inheriting_appends() {
        let device = Entity::from_fields_inheriting(
            EntityKind::Device,
            [("tags", "own")],
            &strings(&["parent", "own"]),
        );
        // No deduplication at this layer
        assert_eq!(device.tags(), strings(&["own", "parent", "own"]).as_slice());
    }

    #[test]
    fn test_update_field_list_semantics() {
        let mut device = Entity::new(EntityKind::Device);
        device.update_field("tags", "a b", &strings(&["p"]));
        assert_eq!(device.tags(), strings(&["a", "b", "p"]).as_slice());

        device.update_field("tags", "", &[]);
        assert!(device.tags().is_empty());

        device.update_field("tags", "", &strings(&["p"]));
        assert_eq!(device.tags(), strings(&["p"]).as_slice());

        device.update_field("tags", strings(&["x"]), &strings(&["ignored"]));
        assert_eq!(device.tags(), strings(&["x"]).as_slice());
    }

    #[test]
    fn test_update_field_scalar_and_dynamic() {
        let mut device = Entity::new(EntityKind::Device);
        device.update_field("name", "a b", &strings(&["p"]));
        assert_eq!(device.name(), Some("a b"));

        device.update_field("customfield", "value", &[]);
        assert_eq!(device.text("customfield"), Some("value"));
    }

    #[test]
    fn test_field_value_tokens_and_display() {
        assert_eq!(FieldValue::from("abc").tokens(), strings(&["abc"]));
        let list = FieldValue::from(strings(&["a", "b"]));
        assert_eq!(list.tokens(), strings(&["a", "b"]));
        assert_eq!(list.to_string(), "a b");
    }

    #[test]
    fn test_serde_round_trip_keeps_kind_and_changed() {
        let mut device = Entity::from_fields(EntityKind::Device, [("objid", "1"), ("tags", "a")]);
        device.set_changed(true);
        let json = serde_json::to_string(&device).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, device);
        assert!(back.is_changed());
    }
}
