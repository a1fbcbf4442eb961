use serde::Deserialize;
use std::fmt;

use crate::errors::{OdooError, OdooResult};
use crate::gateway::{DEFAULT_ODOO_URL, HttpGateway};

pub const ENV_URL: &str = "ODOO_URL";
pub const ENV_DATABASE: &str = "ODOO_DB";
pub const ENV_USERNAME: &str = "ODOO_USERNAME";
pub const ENV_PASSWORD: &str = "ODOO_PASSWORD";

/// Server location and credentials used to open a session.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionOptions {
    #[serde(default = "default_url")]
    pub url: String,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_url() -> String {
    DEFAULT_ODOO_URL.to_string()
}

impl ConnectionOptions {
    pub fn new(
        url: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_env() -> OdooResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OdooResult<Self> {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            read(key).ok_or_else(|| OdooError::Configuration(format!("{key} is not set")))
        };

        Ok(Self {
            url: read(ENV_URL).unwrap_or_else(default_url),
            database: required(ENV_DATABASE)?,
            username: required(ENV_USERNAME)?,
            password: read(ENV_PASSWORD).unwrap_or_default(),
        })
    }

    pub fn gateway(&self) -> HttpGateway {
        HttpGateway::new(self.url.clone())
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
