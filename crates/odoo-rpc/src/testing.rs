//! In-memory stand-in for an Odoo server.
//!
//! `MockOdoo` answers `authenticate`, `version`, and the `execute_kw` methods
//! used by [`OdooClient`](crate::OdooClient): records live per model, relation
//! command tuples are applied to x2many fields, and domains are evaluated for
//! the common comparison operators. Every call is recorded, and faults or
//! canned responses can be queued per `(model, method)`.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::client::{Record, Session};
use crate::errors::RpcError;
use crate::gateway::{Endpoint, RpcGateway};
use crate::relation;

pub const MOCK_DATABASE: &str = "test";
pub const MOCK_LOGIN: &str = "admin";
pub const MOCK_PASSWORD: &str = "admin";
pub const MOCK_UID: i64 = 2;

/// One gateway invocation as seen by the mock.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    pub method: String,
    pub params: Vec<Value>,
}

impl RecordedCall {
    fn execute_kw_param(&self, index: usize) -> Option<&Value> {
        if self.method != "execute_kw" {
            return None;
        }
        self.params.get(index)
    }

    pub fn model(&self) -> Option<&str> {
        self.execute_kw_param(3).and_then(Value::as_str)
    }

    pub fn operation(&self) -> Option<&str> {
        self.execute_kw_param(4).and_then(Value::as_str)
    }

    pub fn args(&self) -> Option<&Value> {
        self.execute_kw_param(5)
    }

    pub fn kwargs(&self) -> Option<&Value> {
        self.execute_kw_param(6)
    }
}

#[derive(Clone, Debug)]
pub struct MockOdoo {
    inner: Arc<Mutex<MockOdooState>>,
}

#[derive(Clone, Debug)]
struct MockUser {
    database: String,
    login: String,
    password: String,
    uid: i64,
}

#[derive(Debug, Default)]
struct MockOdooState {
    users: Vec<MockUser>,
    models: BTreeMap<String, BTreeMap<i64, Record>>,
    next_ids: BTreeMap<String, i64>,
    relations: BTreeMap<(String, String), String>,
    responses: BTreeMap<(String, String), Value>,
    failures: BTreeMap<(String, String), VecDeque<RpcError>>,
    calls: Vec<RecordedCall>,
}

impl Default for MockOdoo {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOdoo {
    /// Backend with the `admin`/`admin` user on database `test`.
    pub fn new() -> Self {
        let mock = Self {
            inner: Arc::new(Mutex::new(MockOdooState::default())),
        };
        mock.add_user(MOCK_DATABASE, MOCK_LOGIN, MOCK_PASSWORD, MOCK_UID);
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockOdooState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_user(&self, database: &str, login: &str, password: &str, uid: i64) {
        self.state().users.push(MockUser {
            database: database.to_string(),
            login: login.to_string(),
            password: password.to_string(),
            uid,
        });
    }

    /// Session of the default user, usable without an `authenticate` call.
    pub fn session(&self) -> Session {
        Session::new(MOCK_DATABASE, MOCK_UID, MOCK_PASSWORD)
    }

    /// Records created through `field` of `model` land in `comodel`.
    ///
    /// Undeclared relations use a `<model>.<field>` comodel.
    pub fn declare_relation(&self, model: &str, field: &str, comodel: &str) {
        self.state()
            .relations
            .insert((model.to_string(), field.to_string()), comodel.to_string());
    }

    /// Id handed out by the next `create` on `model`.
    pub fn set_next_id(&self, model: &str, id: i64) {
        self.state().next_ids.insert(model.to_string(), id);
    }

    pub fn insert_record(&self, model: &str, id: i64, values: Value) {
        let mut record = values.as_object().cloned().unwrap_or_default();
        record.insert("id".to_string(), json!(id));
        let mut state = self.state();
        state
            .models
            .entry(model.to_string())
            .or_default()
            .insert(id, record);
        let next = state.next_ids.entry(model.to_string()).or_insert(1);
        *next = (*next).max(id + 1);
    }

    pub fn record(&self, model: &str, id: i64) -> Option<Record> {
        self.state()
            .models
            .get(model)
            .and_then(|records| records.get(&id))
            .cloned()
    }

    pub fn records(&self, model: &str) -> Vec<Record> {
        self.state()
            .models
            .get(model)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Answer every `method` call on `model` with `response`.
    pub fn respond_with(&self, model: &str, method: &str, response: Value) {
        self.state()
            .responses
            .insert((model.to_string(), method.to_string()), response);
    }

    /// Fail the next `method` call on `model` with `error`.
    pub fn fail_next(&self, model: &str, method: &str, error: RpcError) {
        self.state()
            .failures
            .entry((model.to_string(), method.to_string()))
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn execute_kw_calls(&self) -> Vec<RecordedCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.method == "execute_kw")
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

#[async_trait]
impl RpcGateway for MockOdoo {
    async fn call(
        &self,
        endpoint: Endpoint,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let mut state = self.state();
        state.calls.push(RecordedCall {
            endpoint,
            method: method.to_string(),
            params: params.clone(),
        });

        match (endpoint, method) {
            (Endpoint::Common, "authenticate") => Ok(state.authenticate(&params)),
            (Endpoint::Common, "version") => Ok(json!({
                "server_version": "17.0",
                "server_version_info": [17, 0, 0, "final", 0, ""],
                "server_serie": "17.0",
                "protocol_version": 1
            })),
            (Endpoint::Object, "execute_kw") => state.execute_kw(&params),
            _ => Err(fault(1, format!("method '{method}' is not supported"))),
        }
    }
}

fn fault(code: i64, message: impl Into<String>) -> RpcError {
    RpcError::Fault {
        code,
        message: message.into(),
    }
}

fn missing_record(model: &str, id: i64) -> RpcError {
    fault(
        2,
        format!("Record does not exist or has been deleted. (Record: {model}({id},))"),
    )
}

impl MockOdooState {
    fn authenticate(&self, params: &[Value]) -> Value {
        let [database, login, password, ..] = params else {
            return Value::Bool(false);
        };
        self.users
            .iter()
            .find(|user| {
                database.as_str() == Some(user.database.as_str())
                    && login.as_str() == Some(user.login.as_str())
                    && password.as_str() == Some(user.password.as_str())
            })
            .map(|user| json!(user.uid))
            .unwrap_or(Value::Bool(false))
    }

    fn check_access(&self, database: &Value, uid: &Value, password: &Value) -> Result<(), RpcError> {
        let allowed = self.users.iter().any(|user| {
            database.as_str() == Some(user.database.as_str())
                && uid.as_i64() == Some(user.uid)
                && password.as_str() == Some(user.password.as_str())
        });
        if allowed {
            Ok(())
        } else {
            Err(fault(3, "Access Denied"))
        }
    }

    fn execute_kw(&mut self, params: &[Value]) -> Result<Value, RpcError> {
        let [database, uid, password, model, method, rest @ ..] = params else {
            return Err(fault(1, "execute_kw expects at least 5 parameters"));
        };
        self.check_access(database, uid, password)?;
        let model = model
            .as_str()
            .ok_or_else(|| fault(1, "model name must be a string"))?
            .to_string();
        let method = method
            .as_str()
            .ok_or_else(|| fault(1, "method name must be a string"))?
            .to_string();
        let args = match rest.first() {
            Some(Value::Array(args)) => args.clone(),
            Some(other) => return Err(fault(1, format!("args must be a list, got {other}"))),
            None => Vec::new(),
        };
        let kwargs = rest
            .get(1)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let key = (model.clone(), method.clone());
        if let Some(error) = self.failures.get_mut(&key).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        if let Some(response) = self.responses.get(&key) {
            return Ok(response.clone());
        }

        match method.as_str() {
            "create" => {
                let values = object_arg(&args, 0)?;
                self.create(&model, values).map(Value::from)
            }
            "read" => {
                let ids = ids_arg(&args, 0)?;
                let fields = string_list(kwargs.get("fields"));
                Ok(Value::Array(
                    self.read(&model, &ids, &fields)
                        .into_iter()
                        .map(Value::Object)
                        .collect(),
                ))
            }
            "write" => {
                let ids = ids_arg(&args, 0)?;
                let values = object_arg(&args, 1)?;
                self.ensure_exist(&model, &ids)?;
                for id in ids {
                    self.write_values(&model, id, values)?;
                }
                Ok(Value::Bool(true))
            }
            "unlink" => {
                let ids = ids_arg(&args, 0)?;
                self.ensure_exist(&model, &ids)?;
                if let Some(records) = self.models.get_mut(&model) {
                    for id in ids {
                        records.remove(&id);
                    }
                }
                Ok(Value::Bool(true))
            }
            "search" => {
                let ids: Vec<i64> = self
                    .search(&model, args.first())?
                    .iter()
                    .map(record_id)
                    .collect();
                Ok(json!(ids))
            }
            "search_count" => Ok(json!(self.search(&model, args.first())?.len())),
            "search_read" => {
                let mut matched = self.search(&model, args.first())?;
                if let Some(order) = kwargs.get("order").and_then(Value::as_str) {
                    sort_records(&mut matched, order);
                }
                let offset = kwargs.get("offset").and_then(Value::as_u64).unwrap_or(0) as usize;
                let limit = kwargs
                    .get("limit")
                    .and_then(Value::as_u64)
                    .map(|limit| limit as usize)
                    .unwrap_or(usize::MAX);
                let fields = string_list(kwargs.get("fields"));
                Ok(Value::Array(
                    matched
                        .into_iter()
                        .skip(offset)
                        .take(limit)
                        .map(|record| Value::Object(project(&record, &fields)))
                        .collect(),
                ))
            }
            "fields_get" => {
                let attributes = string_list(kwargs.get("attributes"));
                Ok(Value::Object(self.fields_get(&model, &attributes)))
            }
            other => Err(fault(
                1,
                format!("The method '{other}' does not exist on the model '{model}'"),
            )),
        }
    }

    fn allocate_id(&mut self, model: &str) -> i64 {
        let next = self.next_ids.entry(model.to_string()).or_insert(1);
        let id = *next;
        *next += 1;
        id
    }

    fn create(&mut self, model: &str, values: &Map<String, Value>) -> Result<i64, RpcError> {
        let id = self.allocate_id(model);
        let mut record = Record::new();
        record.insert("id".to_string(), json!(id));
        self.models
            .entry(model.to_string())
            .or_default()
            .insert(id, record);
        self.write_values(model, id, values)?;
        Ok(id)
    }

    fn ensure_exist(&self, model: &str, ids: &[i64]) -> Result<(), RpcError> {
        let records = self.models.get(model);
        for id in ids {
            if !records.is_some_and(|records| records.contains_key(id)) {
                return Err(missing_record(model, *id));
            }
        }
        Ok(())
    }

    fn write_values(
        &mut self,
        model: &str,
        id: i64,
        values: &Map<String, Value>,
    ) -> Result<(), RpcError> {
        for (field, value) in values {
            if field == "id" {
                continue;
            }
            let stored = if is_command_list(value) {
                self.apply_commands(model, id, field, value)?
            } else {
                value.clone()
            };
            let record = self
                .models
                .get_mut(model)
                .and_then(|records| records.get_mut(&id))
                .ok_or_else(|| missing_record(model, id))?;
            record.insert(field.clone(), stored);
        }
        Ok(())
    }

    fn comodel(&self, model: &str, field: &str) -> String {
        self.relations
            .get(&(model.to_string(), field.to_string()))
            .cloned()
            .unwrap_or_else(|| format!("{model}.{field}"))
    }

    fn apply_commands(
        &mut self,
        model: &str,
        id: i64,
        field: &str,
        commands: &Value,
    ) -> Result<Value, RpcError> {
        let comodel = self.comodel(model, field);
        let mut linked: Vec<i64> = self
            .models
            .get(model)
            .and_then(|records| records.get(&id))
            .and_then(|record| record.get(field))
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();

        for command in commands.as_array().into_iter().flatten() {
            let Some([tag, target, payload]) = command.as_array().map(Vec::as_slice) else {
                return Err(fault(1, format!("malformed command {command} on {field}")));
            };
            let tag = tag.as_i64().unwrap_or(-1);
            let target = target.as_i64().unwrap_or_default();
            match tag {
                relation::CREATE => {
                    let values = payload.as_object().cloned().unwrap_or_default();
                    linked.push(self.create(&comodel, &values)?);
                }
                relation::UPDATE => {
                    let values = payload.as_object().cloned().unwrap_or_default();
                    self.ensure_exist(&comodel, &[target])?;
                    self.write_values(&comodel, target, &values)?;
                }
                relation::DELETE => {
                    linked.retain(|linked_id| *linked_id != target);
                    if let Some(records) = self.models.get_mut(&comodel) {
                        records.remove(&target);
                    }
                }
                relation::REMOVE => linked.retain(|linked_id| *linked_id != target),
                relation::ADD => {
                    if !linked.contains(&target) {
                        linked.push(target);
                    }
                }
                relation::CLEAR => linked.clear(),
                relation::REPLACE => {
                    linked = payload
                        .as_array()
                        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                        .unwrap_or_default();
                }
                other => {
                    return Err(fault(1, format!("unknown command tag {other} on {field}")));
                }
            }
        }

        Ok(json!(linked))
    }

    fn read(&self, model: &str, ids: &[i64], fields: &[String]) -> Vec<Record> {
        let Some(records) = self.models.get(model) else {
            return Vec::new();
        };
        records
            .iter()
            .filter(|(id, _)| ids.contains(*id))
            .map(|(_, record)| project(record, fields))
            .collect()
    }

    fn search(&self, model: &str, domain: Option<&Value>) -> Result<Vec<Record>, RpcError> {
        let terms = match domain {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(terms)) => terms.clone(),
            Some(other) => return Err(fault(1, format!("invalid domain {other}"))),
        };
        let Some(records) = self.models.get(model) else {
            return Ok(Vec::new());
        };

        let mut matched = Vec::new();
        for record in records.values() {
            let mut keep = true;
            for term in &terms {
                if !matches_term(record, term)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                matched.push(record.clone());
            }
        }
        Ok(matched)
    }

    fn fields_get(&self, model: &str, attributes: &[String]) -> Map<String, Value> {
        let mut described = Map::new();
        for record in self.models.get(model).into_iter().flat_map(BTreeMap::values) {
            for (field, value) in record {
                if described.contains_key(field) {
                    continue;
                }
                let mut info = Map::new();
                info.insert("string".to_string(), json!(field));
                info.insert("type".to_string(), json!(field_type(field, value)));
                if !attributes.is_empty() {
                    info.retain(|attribute, _| attributes.contains(attribute));
                }
                described.insert(field.clone(), Value::Object(info));
            }
        }
        described
    }
}

fn object_arg<'a>(args: &'a [Value], index: usize) -> Result<&'a Map<String, Value>, RpcError> {
    args.get(index)
        .and_then(Value::as_object)
        .ok_or_else(|| fault(1, format!("argument {index} must be a struct")))
}

fn ids_arg(args: &[Value], index: usize) -> Result<Vec<i64>, RpcError> {
    match args.get(index) {
        Some(Value::Array(ids)) => ids
            .iter()
            .map(|id| id.as_i64().ok_or_else(|| fault(1, format!("invalid id {id}"))))
            .collect(),
        Some(id) => id
            .as_i64()
            .map(|id| vec![id])
            .ok_or_else(|| fault(1, format!("invalid id {id}"))),
        None => Err(fault(1, format!("argument {index} must be record ids"))),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn record_id(record: &Record) -> i64 {
    record.get("id").and_then(Value::as_i64).unwrap_or_default()
}

fn project(record: &Record, fields: &[String]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }
    let mut projected = Record::new();
    projected.insert("id".to_string(), json!(record_id(record)));
    for field in fields {
        let value = record.get(field).cloned().unwrap_or(Value::Bool(false));
        projected.insert(field.clone(), value);
    }
    projected
}

fn is_command_list(value: &Value) -> bool {
    let Some(items) = value.as_array() else {
        return false;
    };
    !items.is_empty()
        && items.iter().all(|item| {
            matches!(
                item.as_array().map(Vec::as_slice),
                Some([tag, _, _]) if tag.as_i64().is_some_and(|tag| (0..=6).contains(&tag))
            )
        })
}

fn field_type(field: &str, value: &Value) -> &'static str {
    match value {
        _ if field == "id" => "integer",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::Array(_) => "many2many",
        Value::Object(_) => "json",
        Value::String(_) | Value::Null => "char",
    }
}

fn matches_term(record: &Record, term: &Value) -> Result<bool, RpcError> {
    let Some([Value::String(field), Value::String(operator), operand]) =
        term.as_array().map(Vec::as_slice)
    else {
        return Err(fault(1, format!("invalid domain term {term}")));
    };
    let value = record.get(field).unwrap_or(&Value::Bool(false));

    let matched = match operator.as_str() {
        "=" => loose_eq(value, operand),
        "!=" => !loose_eq(value, operand),
        "in" => operand
            .as_array()
            .is_some_and(|items| items.iter().any(|item| loose_eq(value, item))),
        "not in" => !operand
            .as_array()
            .is_some_and(|items| items.iter().any(|item| loose_eq(value, item))),
        "<" => compare(value, operand) == Some(Ordering::Less),
        "<=" => matches!(compare(value, operand), Some(Ordering::Less | Ordering::Equal)),
        ">" => compare(value, operand) == Some(Ordering::Greater),
        ">=" => matches!(
            compare(value, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "like" | "ilike" | "=like" | "=ilike" => {
            let (Some(text), Some(pattern)) = (value.as_str(), operand.as_str()) else {
                return Ok(false);
            };
            let pattern = if operator.starts_with('=') {
                pattern.to_string()
            } else {
                format!("%{pattern}%")
            };
            if operator.ends_with("ilike") {
                sql_like(&pattern.to_lowercase(), &text.to_lowercase())
            } else {
                sql_like(&pattern, text)
            }
        }
        other => return Err(fault(1, format!("unsupported operator '{other}'"))),
    };
    Ok(matched)
}

/// Scalar equality; against an x2many id list, membership.
fn loose_eq(value: &Value, operand: &Value) -> bool {
    match value {
        Value::Array(items) if !operand.is_array() => items.iter().any(|item| loose_eq(item, operand)),
        _ => match (value.as_f64(), operand.as_f64()) {
            (Some(left), Some(right)) => left == right,
            _ => value == operand,
        },
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

fn sql_like(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    // matched[j]: pattern prefix processed so far matches text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for symbol in pattern {
        let mut next = vec![false; text.len() + 1];
        match symbol {
            '%' => {
                let mut reachable = false;
                for j in 0..=text.len() {
                    reachable |= matched[j];
                    next[j] = reachable;
                }
            }
            _ => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && (symbol == '_' || text[j - 1] == symbol);
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}

fn sort_records(records: &mut [Record], order: &str) {
    let mut clause = order.split(',').next().unwrap_or_default().split_whitespace();
    let Some(field) = clause.next() else {
        return;
    };
    let descending = clause
        .next()
        .is_some_and(|direction| direction.eq_ignore_ascii_case("desc"));
    records.sort_by(|left, right| {
        let ordering = match (left.get(field), right.get(field)) {
            (Some(left), Some(right)) => compare(left, right).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        };
        if descending { ordering.reverse() } else { ordering }
    });
}
