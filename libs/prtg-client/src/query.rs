//! API targets and paginated queries

use prtg_model::EntityKind;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{ClientError, Result};

/// Items requested per page unless a query says otherwise
pub const DEFAULT_MAXIMUM: usize = 500;

/// Columns requested by every table query
pub const DEFAULT_COLUMNS: &[&str] = &["objid", "parentid", "name", "tags", "active", "status"];

/// API endpoint of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Table,
    GetStatus,
    GetPassHash,
    SetObjectProperty,
    GetObjectProperty,
}

impl Target {
    pub const ALL: [Target; 5] = [
        Target::Table,
        Target::GetStatus,
        Target::GetPassHash,
        Target::SetObjectProperty,
        Target::GetObjectProperty,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Target::Table => "table",
            Target::GetStatus => "getstatus",
            Target::GetPassHash => "getpasshash",
            Target::SetObjectProperty => "setobjectproperty",
            Target::GetObjectProperty => "getobjectproperty",
        }
    }

    /// Path below `/api/`, with the extension the server expects
    pub const fn path(self) -> &'static str {
        match self {
            Target::Table => "table.xml",
            Target::GetStatus => "getstatus.xml",
            Target::GetPassHash => "getpasshash.htm",
            Target::SetObjectProperty => "setobjectproperty.htm",
            Target::GetObjectProperty => "getobjectproperty.htm",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = ClientError;

    /// Accepts the bare name (`table`) or the path (`table.xml`)
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|target| target.name() == s || target.path() == s)
            .ok_or_else(|| ClientError::BadTarget(format!("Invalid API target: {}", s)))
    }
}

/// Secret sent with every request
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Password(String),
    PassHash(String),
}

impl Credentials {
    fn query_pair(&self) -> (&'static str, &str) {
        match self {
            Credentials::Password(secret) => ("password", secret),
            Credentials::PassHash(secret) => ("passhash", secret),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password(_) => f.write_str("Password(***)"),
            Credentials::PassHash(_) => f.write_str("PassHash(***)"),
        }
    }
}

/// Optional arguments of [`Query::new`]
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    /// Table content (`groups`, `devices`, `sensors`)
    pub content: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    /// Page size, [`DEFAULT_MAXIMUM`] when unset
    pub maximum: Option<usize>,
    /// Parent values mirrored into the cache on setobjectproperty, never sent
    pub inherited: Vec<String>,
}

/// One API request description plus its pagination state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    target: Target,
    counter: usize,
    maximum: usize,
    extras: Vec<(&'static str, String)>,
    expect_response: bool,
    inherited: Vec<String>,
}

impl Query {
    /// Build a query for the target named `target`
    pub fn new(target: &str, params: QueryParams) -> Result<Self> {
        Self::for_target(target.parse()?, params)
    }

    pub fn for_target(target: Target, params: QueryParams) -> Result<Self> {
        let QueryParams {
            content,
            id,
            name,
            value,
            maximum,
            inherited,
        } = params;

        let maximum = maximum.unwrap_or(DEFAULT_MAXIMUM);
        if maximum == 0 {
            return Err(ClientError::BadTarget(format!(
                "{}: page size must be positive",
                target
            )));
        }

        let mut query = Self {
            target,
            counter: 0,
            maximum,
            extras: Vec::new(),
            expect_response: true,
            inherited,
        };

        if target == Target::Table {
            query.extras.push(("columns", DEFAULT_COLUMNS.join(",")));
        }
        if let Some(content) = content {
            query.extras.push(("content", content));
        }

        let id = id.filter(|id| !id.is_empty());
        let name = name.filter(|name| !name.is_empty());
        match target {
            Target::SetObjectProperty => {
                let (Some(id), Some(name), Some(value)) = (id, name, value) else {
                    return Err(ClientError::BadTarget(
                        "setobjectproperty requires id, name and value".to_string(),
                    ));
                };
                query.extras.push(("id", id));
                query.extras.push(("name", name));
                query.extras.push(("value", value));
                // The server answers with an empty page; a 200 is the confirmation
                query.expect_response = false;
            },
            Target::GetObjectProperty => {
                let (Some(id), Some(name)) = (id, name) else {
                    return Err(ClientError::BadTarget(
                        "getobjectproperty requires id and name".to_string(),
                    ));
                };
                query.extras.push(("id", id));
                query.extras.push(("name", name));
            },
            _ => {},
        }

        Ok(query)
    }

    /// Table listing of one entity kind
    pub fn table(kind: EntityKind) -> Result<Self> {
        if !kind.is_table_content() {
            return Err(ClientError::BadTarget(format!(
                "{} cannot be listed through the table target",
                kind
            )));
        }
        Self::for_target(
            Target::Table,
            QueryParams {
                content: Some(kind.content_type().to_string()),
                ..Default::default()
            },
        )
    }

    pub fn status() -> Self {
        Self::bare(Target::GetStatus)
    }

    pub fn password_hash() -> Self {
        Self::bare(Target::GetPassHash)
    }

    pub fn get_object_property(id: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        Self::for_target(
            Target::GetObjectProperty,
            QueryParams {
                id: Some(id.into()),
                name: Some(name.into()),
                ..Default::default()
            },
        )
    }

    pub fn set_object_property(
        id: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self> {
        Self::for_target(
            Target::SetObjectProperty,
            QueryParams {
                id: Some(id.into()),
                name: Some(name.into()),
                value: Some(value.into()),
                ..Default::default()
            },
        )
    }

    fn bare(target: Target) -> Self {
        Self {
            target,
            counter: 0,
            maximum: DEFAULT_MAXIMUM,
            extras: Vec::new(),
            expect_response: true,
            inherited: Vec::new(),
        }
    }

    /// Attach the parent values to append when the change is mirrored locally
    pub fn with_inherited(mut self, inherited: Vec<String>) -> Self {
        self.inherited = inherited;
        self
    }

    pub fn with_maximum(mut self, maximum: usize) -> Self {
        self.maximum = maximum.max(1);
        self
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn maximum(&self) -> usize {
        self.maximum
    }

    pub fn expect_response(&self) -> bool {
        self.expect_response
    }

    pub fn inherited(&self) -> &[String] {
        &self.inherited
    }

    /// Target-specific argument by key
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Advance to the next page
    pub fn increment(&mut self) {
        self.counter += self.maximum;
    }

    /// Full request URL for the current page
    ///
    /// Credentials come first, then `start`/`count`, then the extras with
    /// empty values left out. Everything is percent-encoded.
    pub fn url(&self, endpoint: &str, username: &str, credentials: &Credentials) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/api/{}",
            endpoint.trim_end_matches('/'),
            self.target.path()
        ))?;
        {
            let (secret_key, secret) = credentials.query_pair();
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("username", username)
                .append_pair(secret_key, secret)
                .append_pair("start", &self.counter.to_string())
                .append_pair("count", &self.maximum.to_string());
            for (key, value) in self.extras.iter().filter(|(_, v)| !v.is_empty()) {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

impl fmt::Display for Query {
    /// Request path and arguments without credentials
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "api/{}?start={}&count={}",
            self.target.path(),
            self.counter,
            self.maximum
        )?;
        for (key, value) in self.extras.iter().filter(|(_, v)| !v.is_empty()) {
            write!(f, "&{}={}", key, value)?;
        }
        Ok(())
    }
}
