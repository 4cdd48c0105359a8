//! Paginated fetch with retry
//!
//! A [`Connection`] drives one query to completion: it requests page after
//! page until the server signals the end of the list, retrying transient
//! transport failures with exponential backoff.

use bytes::Bytes;
use prtg_model::{Entity, EntityKind};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::query::{Credentials, Query, Target};
use crate::transport::{ApiRequest, Transport};
use crate::xml::Envelope;

/// Field holding the hash returned by the getpasshash target
pub const PASSHASH_FIELD: &str = "passhash";

/// What to do once every retry of a page failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnExhausted {
    /// Propagate the transport error
    #[default]
    Abort,
    /// Stop paginating and keep what was collected so far
    TreatAsEnded,
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Backoff multiplier for exponential delay
    pub multiplier: u32,
    pub on_exhausted: OnExhausted,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_backoff: Duration::from_secs(2),
            multiplier: 2,
            on_exhausted: OnExhausted::Abort,
        }
    }
}

impl RetryPolicy {
    /// Create from configuration values
    pub fn from_config(
        retries: u32,
        initial_backoff_ms: u64,
        multiplier: u32,
        on_exhausted: OnExhausted,
    ) -> Self {
        Self {
            retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            multiplier,
            on_exhausted,
        }
    }

    /// Same retry count, no waiting between attempts
    pub fn immediate(retries: u32) -> Self {
        Self {
            retries,
            initial_backoff: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_on_exhausted(mut self, on_exhausted: OnExhausted) -> Self {
        self.on_exhausted = on_exhausted;
        self
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

/// Server address and login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Root URL of the server, e.g. `https://prtg.example.com`
    pub endpoint: String,
    pub username: String,
    pub credentials: Credentials,
}

impl Session {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            credentials,
        }
    }
}

/// One decoded page
#[derive(Debug, Default)]
struct Page {
    entities: Vec<Entity>,
    ended: bool,
}

impl Page {
    fn ended() -> Self {
        Self {
            entities: Vec::new(),
            ended: true,
        }
    }
}

/// Short-lived driver of one query
pub struct Connection<'a, T: Transport + ?Sized> {
    transport: &'a T,
    session: &'a Session,
    policy: &'a RetryPolicy,
}

impl<'a, T: Transport + ?Sized> Connection<'a, T> {
    pub fn new(transport: &'a T, session: &'a Session, policy: &'a RetryPolicy) -> Self {
        Self {
            transport,
            session,
            policy,
        }
    }

    /// Fetch every page of `query`, advancing its counter as pages arrive
    pub fn get_request(&self, query: &mut Query) -> Result<Vec<Entity>> {
        let mut response = Vec::new();
        loop {
            let url = query.url(
                &self.session.endpoint,
                &self.session.username,
                &self.session.credentials,
            )?;
            let request = ApiRequest::get(url);
            info!("Making request: {}", query);

            let page = match self.deliver(&request, query)? {
                Some(payload) => self.decode(query, &payload)?,
                None => Page::ended(),
            };
            let received = page.entities.len();
            response.extend(page.entities);

            if page.ended {
                break;
            }
            if received == 0 {
                warn!("Empty page without list end, stopping: {}", query);
                break;
            }
            query.increment();
        }
        debug!("Query {} returned {} item(s)", query, response.len());
        Ok(response)
    }

    /// Send with retries; `None` when the page is forcibly treated as ended
    fn deliver(&self, request: &ApiRequest, query: &Query) -> Result<Option<Bytes>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.transport.send(request) {
                Ok(payload) => return Ok(Some(payload)),
                Err(e) if e.is_transient() && attempt <= self.policy.retries => {
                    let backoff = self.policy.backoff(attempt);
                    warn!(
                        "Query failed (attempt #{}, will retry): {}: {}",
                        attempt, query, e
                    );
                    warn!("Backing off {:?}", backoff);
                    thread::sleep(backoff);
                },
                Err(e) if e.is_transient() => {
                    error!("Query failed {} times: {}: {}", attempt, query, e);
                    match self.policy.on_exhausted {
                        OnExhausted::Abort => {
                            error!("Aborting query");
                            return Err(e.into());
                        },
                        OnExhausted::TreatAsEnded => {
                            error!("Query ended forcibly");
                            return Ok(None);
                        },
                    }
                },
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn decode(&self, query: &Query, payload: &[u8]) -> Result<Page> {
        if !query.expect_response() {
            return Ok(Page::ended());
        }

        if query.target() == Target::GetPassHash {
            let hash = String::from_utf8_lossy(payload).trim().to_string();
            let mut entity = Entity::new(EntityKind::Generic);
            entity.update_field(PASSHASH_FIELD, hash, &[]);
            return Ok(Page {
                entities: vec![entity],
                ended: true,
            });
        }

        let envelope = Envelope::parse(payload)?;
        let page = Page {
            ended: envelope.ended()?,
            entities: envelope.entities(),
        };
        debug!(
            "Page of '{}' with {} item(s), ended={}",
            envelope.tag,
            page.entities.len(),
            page.ended
        );
        Ok(page)
    }
}
