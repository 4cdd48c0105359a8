//! Trait definitions for the entity cache

use prtg_model::{Entity, EntityKind, CONTENT_TYPE_ALL};
use std::fmt;
use std::str::FromStr;

use crate::error::{CacheError, Result};

/// Content selection for cache reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentFilter {
    #[default]
    All,
    Kind(EntityKind),
}

impl ContentFilter {
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            ContentFilter::All => true,
            ContentFilter::Kind(kind) => entity.kind() == *kind,
        }
    }
}

impl From<EntityKind> for ContentFilter {
    fn from(kind: EntityKind) -> Self {
        ContentFilter::Kind(kind)
    }
}

impl FromStr for ContentFilter {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case(CONTENT_TYPE_ALL) {
            return Ok(ContentFilter::All);
        }
        s.parse::<EntityKind>()
            .map(ContentFilter::Kind)
            .map_err(|_| CacheError::UnknownFilter(s.to_string()))
    }
}

impl fmt::Display for ContentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentFilter::All => f.write_str(CONTENT_TYPE_ALL),
            ContentFilter::Kind(kind) => write!(f, "{}", kind),
        }
    }
}

/// Entity store keyed by object id
///
/// Implementations:
/// - `MemoryCache`: in-process map, lost on drop
/// - `FileCache`: JSON file, a removed-on-drop temp file by default
///
/// Reads return entities ordered by id so callers see a stable order.
pub trait EntityCache: Send + Sync {
    /// Store entities by id
    ///
    /// New ids are always inserted. An id already cached is replaced only when
    /// `force` is set. Entities without an id are skipped.
    fn write(&self, entities: &[Entity], force: bool) -> Result<()>;

    /// Entity by id, `None` on a miss
    fn get(&self, id: &str) -> Result<Option<Entity>>;

    /// Entities selected by `filter`
    fn get_by_kind(&self, filter: ContentFilter) -> Result<Vec<Entity>>;

    /// Entities selected by `filter` that were marked changed
    fn get_changed(&self, filter: ContentFilter) -> Result<Vec<Entity>> {
        Ok(self
            .get_by_kind(filter)?
            .into_iter()
            .filter(Entity::is_changed)
            .collect())
    }

    /// Number of cached entities
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: EntityCache + ?Sized> EntityCache for Box<C> {
    fn write(&self, entities: &[Entity], force: bool) -> Result<()> {
        (**self).write(entities, force)
    }

    fn get(&self, id: &str) -> Result<Option<Entity>> {
        (**self).get(id)
    }

    fn get_by_kind(&self, filter: ContentFilter) -> Result<Vec<Entity>> {
        (**self).get_by_kind(filter)
    }

    fn get_changed(&self, filter: ContentFilter) -> Result<Vec<Entity>> {
        (**self).get_changed(filter)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// Order entities by numeric id when both parse, lexically otherwise
pub(crate) fn sort_by_id(entities: &mut [Entity]) {
    entities.sort_by(|a, b| {
        let (a, b) = (a.id().unwrap_or_default(), b.id().unwrap_or_default());
        match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.cmp(b),
        }
    });
}
