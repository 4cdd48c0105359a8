//! PRTG Client
//!
//! Blocking client for the PRTG HTTP/XML management API.
//!
//! # Architecture
//!
//! ```text
//! Client ──► Connection ──► Transport (HttpTransport | MockTransport)
//!   │            │
//!   │            └── pages through `start`/`count`, retries transient
//!   │                failures, decodes each page from XML
//!   └── EntityCache: table results stored, property writes mirrored
//! ```
//!
//! Rule chains from `prtg-rules` run over cached entities through
//! [`Client::apply_rules`]; committed changes go back to the server one
//! `setobjectproperty` call per property.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod query;
pub mod transport;
pub mod xml;

pub use client::{Client, RuleOutcome, RuleReport};
pub use config::{CacheBackend, CacheConfig, ClientConfig, RetryConfig, ENV_PREFIX};
pub use connection::{Connection, OnExhausted, RetryPolicy, Session, PASSHASH_FIELD};
pub use error::{ClientError, Result, TransportError};
pub use query::{Credentials, Query, QueryParams, Target, DEFAULT_COLUMNS, DEFAULT_MAXIMUM};
pub use transport::{ApiRequest, HttpTransport, MockTransport, Transport};
pub use xml::Envelope;
