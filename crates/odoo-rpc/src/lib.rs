#![doc = r#"
Odoo XML-RPC record client.

Operation mapping:

| Client method | RPC | Wire arguments |
| --- | --- | --- |
| `OdooClient::connect` | `common.authenticate` | `db, login, password, {}` |
| `OdooClient::server_version` | `common.version` | none |
| `OdooClient::create` | `execute_kw(create)` | `[encoded fields]` |
| `OdooClient::read` | `execute_kw(read)` | `[[ids]]`, `{fields}` |
| `OdooClient::update` | `execute_kw(write)` | `[ids, encoded fields]` |
| `OdooClient::delete` | `execute_kw(unlink)` | `[ids]` |
| `OdooClient::search` | `execute_kw(search)` | `[domain]` |
| `OdooClient::search_count` | `execute_kw(search_count)` | `[domain]` |
| `OdooClient::search_read` | `execute_kw(search_read)` | `[domain]`, `{fields, offset, limit, order}` |
| `OdooClient::get_fields` | `execute_kw(fields_get)` | `[]`, `{attributes}` |
| `OdooClient::call_method` | `execute_kw(<method>)` | `[ids]`, `{kwargs}` |
| `OdooClient::create_external_id` | `execute_kw(create)` on `ir.model.data` | `[{model, name, res_id, module}]` |
| `OdooClient::*_by_external_id` | `search_read` on `ir.model.data`, then the plain operation | |

Implementation notes:
- Every `execute_kw` call starts with `db, uid, password, model, method`; the
  session holding those values is fixed at connect time.
- Relational field values are rewritten into command tuples before dispatch;
  malformed relation commands and domains fail before any call is made.
- Two-step operations run strictly in sequence and stop at the first failure.
"#]

pub mod client;
pub mod config;
pub mod domain;
pub mod errors;
pub mod external_id;
pub mod gateway;
pub mod relation;
pub mod testing;
pub mod xmlrpc;

pub use client::{OdooClient, Record, RecordIds, SearchReadOptions, Session};
pub use config::ConnectionOptions;
pub use domain::{Domain, Filter, normalize_domain};
pub use errors::{OdooError, OdooResult, RpcError};
pub use external_id::{DEFAULT_MODULE, ExternalId, ExternalTarget, IR_MODEL_DATA};
pub use gateway::{DEFAULT_ODOO_URL, Endpoint, HttpGateway, RpcGateway};
pub use relation::{FieldValue, Fields, RelationCommand, encode_fields};
pub use testing::MockOdoo;
