//! PRTG client: query orchestration over transport, connection and cache

use prtg_cache::{ContentFilter, EntityCache};
use prtg_model::{Entity, EntityKind};
use prtg_rules::{Changes, InheritedCache, RuleChain, RuleError};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::{Connection, RetryPolicy, Session, PASSHASH_FIELD};
use crate::error::{ClientError, Result};
use crate::query::{Query, Target, DEFAULT_MAXIMUM};
use crate::transport::{HttpTransport, Transport};

/// Field of a getobjectproperty response holding the value
const RESULT_FIELD: &str = "result";

/// Result of applying a rule chain to one cached entity
#[derive(Debug)]
pub enum RuleOutcome {
    /// Effective changes, committed when requested
    Changed(Changes),
    Unchanged,
    /// The chain failed; the entity was left as it was
    Failed(RuleError),
}

#[derive(Debug)]
pub struct RuleReport {
    pub id: String,
    /// Display form of the entity, e.g. `Device(objid=2001, name=core)`
    pub entity: String,
    pub outcome: RuleOutcome,
}

/// Client bound to one server
///
/// Every `query` drains all pages before returning. Table results are
/// mirrored into the cache; property writes are mirrored onto the cached
/// entity when it is present.
pub struct Client<T: Transport, C: EntityCache> {
    transport: T,
    cache: C,
    session: Session,
    policy: RetryPolicy,
    page_size: usize,
}

impl Client<HttpTransport, Box<dyn EntityCache>> {
    /// HTTP client with the configured cache backend
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config.timeout(), config.accept_invalid_certs)?;
        let cache = config.cache.build()?;
        Ok(Client::new(transport, cache, config.session()?)
            .with_retry_policy(config.retry_policy())
            .with_page_size(config.page_size))
    }
}

impl<T: Transport, C: EntityCache> Client<T, C> {
    pub fn new(transport: T, cache: C, session: Session) -> Self {
        Self {
            transport,
            cache,
            session,
            policy: RetryPolicy::default(),
            page_size: DEFAULT_MAXIMUM,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run `query` to completion and return every decoded entity
    pub fn query(&self, mut query: Query) -> Result<Vec<Entity>> {
        let response =
            Connection::new(&self.transport, &self.session, &self.policy).get_request(&mut query)?;

        match query.target() {
            Target::Table => self.cache.write(&response, true)?,
            Target::SetObjectProperty => self.mirror_property(&query)?,
            _ => {},
        }
        Ok(response)
    }

    fn mirror_property(&self, query: &Query) -> Result<()> {
        let (Some(id), Some(name)) = (query.extra("id"), query.extra("name")) else {
            return Ok(());
        };
        let value = query.extra("value").unwrap_or_default();

        match self.cache.get(id)? {
            Some(mut entity) => {
                entity.update_field(name, value, query.inherited());
                entity.set_changed(true);
                debug!("Updating object {} in cache: {}={}", id, name, value);
                self.cache.write(&[entity], true)?;
            },
            None => debug!("Object {} not cached, skipping cache update", id),
        }
        Ok(())
    }

    /// Server status record
    pub fn status(&self) -> Result<Entity> {
        self.query(Query::status())?
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::UnknownResponse("empty status response".to_string()))
    }

    /// All entities of one table kind (also refreshes the cache)
    pub fn table(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        self.query(Query::table(kind)?.with_maximum(self.page_size))
    }

    /// Value of one object property, `None` when the server has no result
    pub fn get_object_property(&self, id: &str, name: &str) -> Result<Option<String>> {
        let response = self.query(Query::get_object_property(id, name)?)?;
        Ok(response
            .first()
            .and_then(|entity| entity.text(RESULT_FIELD))
            .map(str::to_string))
    }

    /// Write one object property; `inherited` is appended in the cached copy
    pub fn set_object_property(
        &self,
        id: &str,
        name: &str,
        value: &str,
        inherited: Vec<String>,
    ) -> Result<()> {
        let query = Query::set_object_property(id, name, value)?.with_inherited(inherited);
        self.query(query).map(|_| ())
    }

    /// Password hash of the session user
    pub fn password_hash(&self) -> Result<String> {
        self.query(Query::password_hash())?
            .first()
            .and_then(|entity| entity.text(PASSHASH_FIELD))
            .filter(|hash| !hash.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ClientError::UnknownResponse("empty password hash".to_string()))
    }

    /// Apply `chain` to the cached entities selected by `filter`
    ///
    /// Groups go first, then devices, then sensors; within a kind a parent is
    /// processed before its children. Each entity's parent is resolved through
    /// the cache by `parentid`. With
    /// `commit`, every effective change is written to the server with the
    /// parent's inherited values attached.
    pub fn apply_rules(
        &self,
        chain: &RuleChain,
        filter: ContentFilter,
        commit: bool,
    ) -> Result<Vec<RuleReport>> {
        let entities = parents_first(self.cache.get_by_kind(filter)?);
        info!(
            "Applying {} rule(s) to {} {} entities",
            chain.len(),
            entities.len(),
            filter
        );

        let mut reports = Vec::with_capacity(entities.len());
        for mut entity in entities {
            let parent = match entity.parent_id() {
                Some(parent_id) => self.cache.get(parent_id)?,
                None => None,
            };
            let id = entity.id().unwrap_or_default().to_string();

            let outcome = match chain.apply(&mut entity, parent.as_ref()) {
                Ok(changes) if changes.is_empty() => RuleOutcome::Unchanged,
                Ok(changes) => {
                    if commit {
                        self.commit_changes(&id, &changes, parent.as_ref())?;
                    }
                    RuleOutcome::Changed(changes)
                },
                Err(e) => {
                    warn!("Rules not applied to {}: {}", entity, e);
                    RuleOutcome::Failed(e)
                },
            };

            reports.push(RuleReport {
                id,
                entity: entity.to_string(),
                outcome,
            });
        }
        Ok(reports)
    }

    fn commit_changes(&self, id: &str, changes: &Changes, parent: Option<&Entity>) -> Result<()> {
        let mut inherited = InheritedCache::new();
        for (prop, value) in changes {
            info!("Committing {}={} on object {}", prop, value, id);
            self.set_object_property(id, prop, value, inherited.resolve(parent, prop))?;
        }
        Ok(())
    }
}

/// Position of a kind in the object tree, top first
fn tree_rank(kind: EntityKind) -> u8 {
    match kind {
        EntityKind::Group => 0,
        EntityKind::Device => 1,
        EntityKind::Sensor => 2,
        EntityKind::Status | EntityKind::Generic => 3,
    }
}

/// Order entities so every parent precedes its children
///
/// Sorting is stable: kind rank, then the number of ancestors present in
/// `entities`, then the incoming (id) order.
fn parents_first(entities: Vec<Entity>) -> Vec<Entity> {
    let parents: HashMap<&str, Option<&str>> = entities
        .iter()
        .filter_map(|e| e.id().map(|id| (id, e.parent_id())))
        .collect();

    let depth = |entity: &Entity| -> usize {
        let mut depth = 0;
        let mut next = entity.parent_id();
        while let Some(id) = next {
            // Bounded by the set size so a parentid cycle cannot loop forever
            if depth >= parents.len() {
                break;
            }
            match parents.get(id) {
                Some(parent) => {
                    depth += 1;
                    next = *parent;
                },
                None => break,
            }
        }
        depth
    };

    let mut keyed: Vec<((u8, usize), usize)> = entities
        .iter()
        .enumerate()
        .map(|(index, e)| ((tree_rank(e.kind()), depth(e)), index))
        .collect();
    keyed.sort_by_key(|(key, _)| *key);

    let mut slots: Vec<Option<Entity>> = entities.into_iter().map(Some).collect();
    keyed
        .into_iter()
        .filter_map(|(_, index)| slots[index].take())
        .collect()
}
