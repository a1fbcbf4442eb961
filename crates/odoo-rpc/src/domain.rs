//! Search domains.
//!
//! Callers describe a filter with one of three [`Domain`] shapes; every shape
//! normalizes to the canonical list of `(field, operator, value)` triples that
//! `search`, `search_count` and `search_read` send to the server. Triples in a
//! list are implicitly ANDed.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::errors::{OdooError, OdooResult};

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, "=", value)
    }

    /// Wire form: `[field, operator, value]`.
    pub fn to_value(&self) -> Value {
        json!([self.field, self.operator, self.value])
    }

    fn validate(&self) -> OdooResult<()> {
        if self.field.trim().is_empty() {
            return Err(OdooError::InvalidDomain(
                "filter field name must not be empty".to_string(),
            ));
        }
        if self.operator.trim().is_empty() {
            return Err(OdooError::InvalidDomain(format!(
                "filter on '{}' has an empty operator",
                self.field
            )));
        }
        Ok(())
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.field, &self.operator, &self.value).serialize(serializer)
    }
}

impl TryFrom<&Value> for Filter {
    type Error = OdooError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value.as_array().map(Vec::as_slice) {
            Some([Value::String(field), Value::String(operator), operand]) => {
                let filter = Filter::new(field.clone(), operator.clone(), operand.clone());
                filter.validate()?;
                Ok(filter)
            }
            _ => Err(OdooError::InvalidDomain(format!(
                "expected [field, operator, value], found {value}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Domain {
    /// `{field: value, ..}`, each entry an equality filter.
    EqualityMap(Map<String, Value>),
    SingleFilter(Filter),
    FilterList(Vec<Filter>),
}

impl Domain {
    /// Matches every record.
    pub fn all() -> Self {
        Self::FilterList(Vec::new())
    }

    pub fn normalize(&self) -> OdooResult<Vec<Filter>> {
        let filters = match self {
            Self::EqualityMap(entries) => entries
                .iter()
                .map(|(field, value)| Filter::eq(field.clone(), value.clone()))
                .collect(),
            Self::SingleFilter(filter) => vec![filter.clone()],
            Self::FilterList(filters) => filters.clone(),
        };
        for filter in &filters {
            filter.validate()?;
        }
        Ok(filters)
    }
}

impl From<Filter> for Domain {
    fn from(filter: Filter) -> Self {
        Self::SingleFilter(filter)
    }
}

impl From<Vec<Filter>> for Domain {
    fn from(filters: Vec<Filter>) -> Self {
        Self::FilterList(filters)
    }
}

impl From<Map<String, Value>> for Domain {
    fn from(entries: Map<String, Value>) -> Self {
        Self::EqualityMap(entries)
    }
}

/// Classify loosely shaped JSON input (command lines, config files).
impl TryFrom<Value> for Domain {
    type Error = OdooError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::all()),
            Value::Object(entries) => Ok(Self::EqualityMap(entries)),
            Value::Array(items) if items.is_empty() => Ok(Self::all()),
            Value::Array(items) if items.first().is_some_and(Value::is_string) => {
                Filter::try_from(&Value::Array(items)).map(Self::SingleFilter)
            }
            Value::Array(items) => items
                .iter()
                .map(Filter::try_from)
                .collect::<OdooResult<Vec<_>>>()
                .map(Self::FilterList),
            other => Err(OdooError::InvalidDomain(format!(
                "expected an object, a filter, or a list of filters, found {other}"
            ))),
        }
    }
}

/// Canonical triple list for `domain`; `None` matches everything.
pub fn normalize_domain(domain: Option<&Domain>) -> OdooResult<Vec<Filter>> {
    match domain {
        Some(domain) => domain.normalize(),
        None => Ok(Vec::new()),
    }
}

pub(crate) fn domain_to_value(filters: &[Filter]) -> Value {
    Value::Array(filters.iter().map(Filter::to_value).collect())
}
