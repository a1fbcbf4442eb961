//! Module-namespaced external identifiers (`ir.model.data` entries).
//!
//! An entry binds `<module>.<name>` to a `(model, res_id)` pair. The lookup
//! operations resolve that pair first and then run the plain record operation
//! against it, so each costs two sequential calls.

use serde_json::{Map, Value, json};
use std::fmt;

use crate::client::{OdooClient, Record, SearchReadOptions, into_id};
use crate::domain::{Domain, Filter};
use crate::errors::{OdooError, OdooResult};
use crate::gateway::RpcGateway;
use crate::relation::Fields;

pub const IR_MODEL_DATA: &str = "ir.model.data";
pub const DEFAULT_MODULE: &str = "__api__";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExternalId {
    module: String,
    name: String,
}

impl ExternalId {
    /// Key in the default `__api__` module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            module: DEFAULT_MODULE.to_string(),
            name: name.into(),
        }
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Split `module.name` on its first dot.
    pub fn parse_qualified(qualified: &str) -> Option<Self> {
        let (module, name) = qualified.split_once('.')?;
        if module.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(name).in_module(module))
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lookup_domain(&self) -> Domain {
        Domain::FilterList(vec![
            Filter::eq("module", self.module.as_str()),
            Filter::eq("name", self.name.as_str()),
        ])
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

impl From<&str> for ExternalId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ExternalId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Target of an external identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalTarget {
    pub model: String,
    pub res_id: i64,
}

impl<G> OdooClient<G>
where
    G: RpcGateway,
{
    /// Bind `record_id` of `model` to `external_id`; returns the entry id.
    pub async fn create_external_id(
        &self,
        model: &str,
        record_id: i64,
        external_id: &ExternalId,
    ) -> OdooResult<i64> {
        let mut entry = Map::new();
        entry.insert("model".to_string(), json!(model));
        entry.insert("name".to_string(), json!(external_id.name()));
        entry.insert("res_id".to_string(), json!(record_id));
        entry.insert("module".to_string(), json!(external_id.module()));

        let created = self
            .execute_kw(IR_MODEL_DATA, "create", vec![Value::Object(entry)], Map::new())
            .await?;
        into_id("create", created)
    }

    /// Resolve `external_id` to its model and record id.
    pub async fn resolve_external_id(&self, external_id: &ExternalId) -> OdooResult<ExternalTarget> {
        let rows = self
            .search_read(
                IR_MODEL_DATA,
                Some(&external_id.lookup_domain()),
                &["res_id", "model"],
                &SearchReadOptions::limit(1),
            )
            .await?;
        let Some(row) = rows.into_iter().next() else {
            return Err(OdooError::ExternalIdNotFound(external_id.clone()));
        };

        let res_id = row.get("res_id").and_then(Value::as_i64).ok_or_else(|| {
            OdooError::unexpected("search_read", format!("{IR_MODEL_DATA} row without res_id"))
        })?;
        let model = row
            .get("model")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                OdooError::unexpected("search_read", format!("{IR_MODEL_DATA} row without model"))
            })?
            .to_string();
        tracing::debug!(%external_id, model = %model, res_id, "resolved external id");
        Ok(ExternalTarget { model, res_id })
    }

    pub async fn search_by_external_id(&self, external_id: &ExternalId) -> OdooResult<i64> {
        Ok(self.resolve_external_id(external_id).await?.res_id)
    }

    /// Read the bound record; a dangling binding counts as not found.
    pub async fn read_by_external_id(
        &self,
        external_id: &ExternalId,
        fields: &[&str],
    ) -> OdooResult<Record> {
        let target = self.resolve_external_id(external_id).await?;
        let rows = self.read(&target.model, target.res_id, fields).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| OdooError::ExternalIdNotFound(external_id.clone()))
    }

    pub async fn update_by_external_id(
        &self,
        external_id: &ExternalId,
        fields: &Fields,
    ) -> OdooResult<bool> {
        let target = self.resolve_external_id(external_id).await?;
        self.update(&target.model, target.res_id, fields).await
    }

    pub async fn delete_by_external_id(&self, external_id: &ExternalId) -> OdooResult<bool> {
        let target = self.resolve_external_id(external_id).await?;
        self.delete(&target.model, target.res_id).await
    }
}
