//! Error taxonomy shared by the codec, gateway, and record operations.

use crate::external_id::ExternalId;

/// Failure reported by an [`RpcGateway`](crate::gateway::RpcGateway).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RpcError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed xml-rpc payload: {0}")]
    Protocol(String),
    #[error("remote fault {code}: {message}")]
    Fault { code: i64, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum OdooError {
    #[error("invalid relation command for field '{field}': {reason}")]
    InvalidRelationCommand { field: String, reason: String },
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
    #[error("no record found for external id '{0}'")]
    ExternalIdNotFound(ExternalId),
    #[error("connection failed, check credentials for user '{username}' on database '{database}'")]
    ConnectionFailed { database: String, username: String },
    #[error("unexpected response to {operation}: {detail}")]
    UnexpectedResponse {
        operation: &'static str,
        detail: String,
    },
    #[error(
        "{model} record {record_id} was created but external id '{external_id}' could not be bound: {source}"
    )]
    ExternalIdBindFailed {
        model: String,
        record_id: i64,
        external_id: ExternalId,
        #[source]
        source: Box<OdooError>,
    },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Remote(#[from] RpcError),
}

impl OdooError {
    pub(crate) fn invalid_relation(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRelationCommand {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unexpected(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            operation,
            detail: detail.into(),
        }
    }

    /// True for errors raised locally before any RPC call was issued.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidRelationCommand { .. } | Self::InvalidDomain(_)
        )
    }

    /// Id of a record that exists remotely even though the operation failed.
    pub fn orphaned_record_id(&self) -> Option<i64> {
        match self {
            Self::ExternalIdBindFailed { record_id, .. } => Some(*record_id),
            _ => None,
        }
    }
}

pub type OdooResult<T> = Result<T, OdooError>;
