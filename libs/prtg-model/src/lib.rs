//! PRTG Model - Entity Layer
//!
//! Typed records for the objects a PRTG server reports:
//! - `EntityKind`: closed set of kinds (generic, group, device, sensor, status)
//! - `Entity`: one record with a kind discriminator and a field table
//! - Column schema per kind, plus the list-valued / inheritable property sets
//!
//! Kind-specific behaviour (schema, content-type tag) is plain data in
//! [`schema`], so there is a single entity representation for every kind.

mod entity;
mod error;
pub mod schema;

pub use entity::{split_tokens, Entity, FieldValue};
pub use error::{ModelError, Result};
pub use schema::{
    is_inherited_prop, is_list_prop, EntityKind, CONTENT_TYPE_ALL, INHERITED_PROPS,
    LIST_TYPE_PROPS,
};
