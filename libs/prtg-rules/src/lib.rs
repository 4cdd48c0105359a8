//! PRTG Rules - Rule Engine Library
//!
//! Declarative rules that compute property changes (tags, names) an operator
//! wants propagated down the group → device → sensor hierarchy:
//! - `NameMatch`: anchored regex test against one entity attribute
//! - `Rule`: replace / update-list / format strategies with inherited-value
//!   exclusion and optional rollback of a previous formatting
//! - `RuleChain`: ordered rules applied to one entity, reduced to the net
//!   effective changes, all-or-nothing on failure
//!
//! # Example
//!
//! ```
//! use prtg_model::{Entity, EntityKind};
//! use prtg_rules::{RuleChain, RuleSpec};
//!
//! let chain = RuleChain::from_specs([RuleSpec::new("name", "^core", "tags")
//!     .update(true)
//!     .value(["network"])])
//! .unwrap();
//! let parent = Entity::from_fields(EntityKind::Group, [("objid", "1"), ("tags", "site")]);
//! let mut device = Entity::from_fields(
//!     EntityKind::Device,
//!     [("objid", "2"), ("name", "core-01"), ("tags", "site")],
//! );
//! let changes = chain.apply(&mut device, Some(&parent)).unwrap();
//! assert_eq!(changes["tags"], "network");
//! ```

mod chain;
mod error;
mod rule;
pub mod template;
pub mod types;

pub use chain::RuleChain;
pub use error::{Result, RuleError, TemplateError};
pub use rule::{InheritedCache, NameMatch, Rule};
pub use template::{Extraction, Placeholder, Root, Template};
pub use types::{Changes, RuleMode, RuleSpec};
