use serde_json::{Map, Value, json};
use std::fmt;

use crate::config::ConnectionOptions;
use crate::domain::{Domain, domain_to_value, normalize_domain};
use crate::errors::{OdooError, OdooResult};
use crate::external_id::ExternalId;
use crate::gateway::{Endpoint, HttpGateway, RpcGateway};
use crate::relation::Fields;

/// One row as returned by `read`/`search_read`.
pub type Record = Map<String, Value>;

/// Authenticated identity reused by every call of a client.
///
/// Produced once by [`OdooClient::connect`] and never modified afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    database: String,
    uid: i64,
    password: String,
}

impl Session {
    pub fn new(database: impl Into<String>, uid: i64, password: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            uid,
            password: password.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    fn credentials(&self) -> [Value; 3] {
        [
            json!(self.database),
            json!(self.uid),
            json!(self.password),
        ]
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("database", &self.database)
            .field("uid", &self.uid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A single record id or an ordered batch of ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordIds {
    One(i64),
    Many(Vec<i64>),
}

impl RecordIds {
    /// Sent as given: a bare integer or a list.
    pub fn to_value(&self) -> Value {
        match self {
            Self::One(id) => json!(id),
            Self::Many(ids) => json!(ids),
        }
    }

    pub fn to_list(&self) -> Vec<i64> {
        match self {
            Self::One(id) => vec![*id],
            Self::Many(ids) => ids.clone(),
        }
    }
}

impl From<i64> for RecordIds {
    fn from(id: i64) -> Self {
        Self::One(id)
    }
}

impl From<Vec<i64>> for RecordIds {
    fn from(ids: Vec<i64>) -> Self {
        Self::Many(ids)
    }
}

impl From<&[i64]> for RecordIds {
    fn from(ids: &[i64]) -> Self {
        Self::Many(ids.to_vec())
    }
}

impl<const N: usize> From<[i64; N]> for RecordIds {
    fn from(ids: [i64; N]) -> Self {
        Self::Many(ids.to_vec())
    }
}

/// Paging and sorting for `search_read`, forwarded verbatim when set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchReadOptions {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    /// Sort specification, e.g. `"name asc, id desc"`.
    pub order: Option<String>,
}

impl SearchReadOptions {
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

/// Record operations against one database, translated to `execute_kw` calls.
#[derive(Clone, Debug)]
pub struct OdooClient<G> {
    gateway: G,
    session: Session,
}

impl OdooClient<HttpGateway> {
    pub async fn connect_http(options: &ConnectionOptions) -> OdooResult<Self> {
        Self::connect(options.gateway(), options).await
    }

    pub async fn connect_from_env() -> OdooResult<Self> {
        Self::connect_http(&ConnectionOptions::from_env()?).await
    }
}

impl<G> OdooClient<G>
where
    G: RpcGateway,
{
    /// Authenticate and bind the resulting session to `gateway`.
    pub async fn connect(gateway: G, options: &ConnectionOptions) -> OdooResult<Self> {
        let uid = gateway
            .call(
                Endpoint::Common,
                "authenticate",
                vec![
                    json!(options.database),
                    json!(options.username),
                    json!(options.password),
                    json!({}),
                ],
            )
            .await?;

        match uid.as_i64() {
            Some(uid) if uid > 0 => {
                tracing::info!(database = %options.database, uid, "authenticated");
                Ok(Self::with_session(
                    gateway,
                    Session::new(options.database.clone(), uid, options.password.clone()),
                ))
            }
            _ => Err(OdooError::ConnectionFailed {
                database: options.database.clone(),
                username: options.username.clone(),
            }),
        }
    }

    pub fn with_session(gateway: G, session: Session) -> Self {
        Self { gateway, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Server version information from the common endpoint.
    pub async fn server_version(&self) -> OdooResult<Map<String, Value>> {
        let version = self
            .gateway
            .call(Endpoint::Common, "version", Vec::new())
            .await?;
        into_object("version", version)
    }

    /// Generic model method dispatch; every other operation goes through here.
    ///
    /// `kwargs` is omitted from the wire when empty.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> OdooResult<Value> {
        tracing::debug!(model, method, "execute_kw");
        let mut params = Vec::with_capacity(7);
        params.extend(self.session.credentials());
        params.push(json!(model));
        params.push(json!(method));
        params.push(Value::Array(args));
        if !kwargs.is_empty() {
            params.push(Value::Object(kwargs));
        }

        Ok(self.gateway.call(Endpoint::Object, "execute_kw", params).await?)
    }

    /// Create one record and return its id.
    ///
    /// With `external_id`, the new record is also bound to that key. If the
    /// binding fails the record stays created and the error is
    /// [`OdooError::ExternalIdBindFailed`], which carries the record id.
    pub async fn create(
        &self,
        model: &str,
        fields: &Fields,
        external_id: Option<&ExternalId>,
    ) -> OdooResult<i64> {
        let created = self
            .execute_kw(model, "create", vec![Value::Object(fields.encode())], Map::new())
            .await?;
        let record_id = into_id("create", created)?;

        if let Some(external_id) = external_id {
            if let Err(source) = self.create_external_id(model, record_id, external_id).await {
                tracing::warn!(
                    model,
                    record_id,
                    %external_id,
                    error = %source,
                    "record created but external id binding failed"
                );
                return Err(OdooError::ExternalIdBindFailed {
                    model: model.to_string(),
                    record_id,
                    external_id: external_id.clone(),
                    source: Box::new(source),
                });
            }
        }

        Ok(record_id)
    }

    /// Batch read; rows come back in server order, match them on `id`.
    ///
    /// An empty `fields` slice reads every field.
    pub async fn read(
        &self,
        model: &str,
        ids: impl Into<RecordIds>,
        fields: &[&str],
    ) -> OdooResult<Vec<Record>> {
        let ids = ids.into();
        let mut kwargs = Map::new();
        if !fields.is_empty() {
            kwargs.insert("fields".to_string(), json!(fields));
        }
        let rows = self
            .execute_kw(model, "read", vec![json!(ids.to_list())], kwargs)
            .await?;
        into_records("read", rows)
    }

    /// First row of a single-record read.
    pub async fn read_one(
        &self,
        model: &str,
        id: i64,
        fields: &[&str],
    ) -> OdooResult<Option<Record>> {
        Ok(self.read(model, id, fields).await?.into_iter().next())
    }

    pub async fn update(
        &self,
        model: &str,
        ids: impl Into<RecordIds>,
        fields: &Fields,
    ) -> OdooResult<bool> {
        let ids = ids.into();
        let written = self
            .execute_kw(
                model,
                "write",
                vec![ids.to_value(), Value::Object(fields.encode())],
                Map::new(),
            )
            .await?;
        into_bool("write", written)
    }

    pub async fn delete(&self, model: &str, ids: impl Into<RecordIds>) -> OdooResult<bool> {
        let ids = ids.into();
        let deleted = self
            .execute_kw(model, "unlink", vec![ids.to_value()], Map::new())
            .await?;
        into_bool("unlink", deleted)
    }

    pub async fn search(&self, model: &str, domain: Option<&Domain>) -> OdooResult<Vec<i64>> {
        let filters = normalize_domain(domain)?;
        let ids = self
            .execute_kw(model, "search", vec![domain_to_value(&filters)], Map::new())
            .await?;
        into_ids("search", ids)
    }

    pub async fn search_count(&self, model: &str, domain: Option<&Domain>) -> OdooResult<i64> {
        let filters = normalize_domain(domain)?;
        let count = self
            .execute_kw(
                model,
                "search_count",
                vec![domain_to_value(&filters)],
                Map::new(),
            )
            .await?;
        count
            .as_i64()
            .ok_or_else(|| OdooError::unexpected("search_count", format!("expected integer, got {count}")))
    }

    pub async fn search_read(
        &self,
        model: &str,
        domain: Option<&Domain>,
        fields: &[&str],
        options: &SearchReadOptions,
    ) -> OdooResult<Vec<Record>> {
        let filters = normalize_domain(domain)?;
        let mut kwargs = Map::new();
        if !fields.is_empty() {
            kwargs.insert("fields".to_string(), json!(fields));
        }
        if let Some(offset) = options.offset {
            kwargs.insert("offset".to_string(), json!(offset));
        }
        if let Some(limit) = options.limit {
            kwargs.insert("limit".to_string(), json!(limit));
        }
        if let Some(order) = &options.order {
            kwargs.insert("order".to_string(), json!(order));
        }

        let rows = self
            .execute_kw(model, "search_read", vec![domain_to_value(&filters)], kwargs)
            .await?;
        into_records("search_read", rows)
    }

    /// Field definitions keyed by field name, optionally restricted to
    /// `attributes` (e.g. `["string", "type"]`).
    pub async fn get_fields(
        &self,
        model: &str,
        attributes: &[&str],
    ) -> OdooResult<Map<String, Value>> {
        let mut kwargs = Map::new();
        if !attributes.is_empty() {
            kwargs.insert("attributes".to_string(), json!(attributes));
        }
        let described = self
            .execute_kw(model, "fields_get", Vec::new(), kwargs)
            .await?;
        into_object("fields_get", described)
    }

    /// Run a model method (typically a button action) on `ids`.
    pub async fn call_method(
        &self,
        model: &str,
        method: &str,
        ids: impl Into<RecordIds>,
        kwargs: Map<String, Value>,
    ) -> OdooResult<Value> {
        let ids = ids.into();
        self.execute_kw(model, method, vec![ids.to_value()], kwargs)
            .await
    }
}

pub(crate) fn into_id(operation: &'static str, value: Value) -> OdooResult<i64> {
    let id = match &value {
        Value::Number(number) => number.as_i64(),
        // Batch-capable servers answer a single create with a one-element list.
        Value::Array(items) if items.len() == 1 => items[0].as_i64(),
        _ => None,
    };
    id.ok_or_else(|| OdooError::unexpected(operation, format!("expected record id, got {value}")))
}

fn into_ids(operation: &'static str, value: Value) -> OdooResult<Vec<i64>> {
    let Value::Array(items) = value else {
        return Err(OdooError::unexpected(
            operation,
            format!("expected list of ids, got {value}"),
        ));
    };
    items
        .into_iter()
        .map(|item| {
            item.as_i64().ok_or_else(|| {
                OdooError::unexpected(operation, format!("expected integer id, got {item}"))
            })
        })
        .collect()
}

fn into_bool(operation: &'static str, value: Value) -> OdooResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| OdooError::unexpected(operation, format!("expected boolean, got {value}")))
}

fn into_object(operation: &'static str, value: Value) -> OdooResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(OdooError::unexpected(
            operation,
            format!("expected struct, got {other}"),
        )),
    }
}

fn into_records(operation: &'static str, value: Value) -> OdooResult<Vec<Record>> {
    let Value::Array(rows) = value else {
        return Err(OdooError::unexpected(
            operation,
            format!("expected list of records, got {value}"),
        ));
    };
    rows.into_iter()
        .map(|row| into_object(operation, row))
        .collect()
}
