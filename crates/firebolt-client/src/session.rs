//! Session parameter state and server-driven updates.
//!
//! Every response may carry headers that mutate connection state: endpoint
//! replacement, parameter merges, parameter removal, or a full session reset.
//! The connection applies them atomically under its session lock before the
//! cursor exposes the response.

use std::collections::HashMap;

use firebolt_sql::SetParameter;
use reqwest::header::HeaderMap;
use url::Url;

use crate::error::{Error, Result};
use crate::util::fix_url_schema;

/// Header replacing the engine endpoint (may carry query parameters).
pub const UPDATE_ENDPOINT_HEADER: &str = "Firebolt-Update-Endpoint";
/// Header merging `k1=v1,k2=v2` pairs into the session parameters.
pub const UPDATE_PARAMETERS_HEADER: &str = "Firebolt-Update-Parameters";
/// Header clearing all user parameters and transaction state.
pub const RESET_SESSION_HEADER: &str = "Firebolt-Reset-Session";
/// Header removing the listed parameter keys.
pub const REMOVE_PARAMETERS_HEADER: &str = "Firebolt-Remove-Parameters";

/// Parameters that must be changed with `USE`, not `SET`.
pub const USE_PARAMETERS: [&str; 2] = ["database", "engine"];
/// Parameters only the backend may set.
pub const DISALLOWED_PARAMETERS: [&str; 1] = ["output_format"];
/// Server-managed transaction parameters.
pub const TRANSACTION_PARAMETERS: [&str; 2] = ["transaction_id", "transaction_sequence_id"];

/// Whether a parameter belongs to the server-managed (immutable) set.
#[must_use]
pub fn is_immutable_parameter(name: &str) -> bool {
    USE_PARAMETERS.contains(&name) || DISALLOWED_PARAMETERS.contains(&name)
}

/// Reject `SET` of server-managed parameters with actionable guidance.
pub fn validate_set_parameter(parameter: &SetParameter) -> Result<()> {
    let name = parameter.name.as_str();
    if USE_PARAMETERS.contains(&name) {
        return Err(Error::Configuration(format!(
            "Could not set parameter. Set parameter '{name}' is not allowed. \
             Try again with 'USE {}' instead of SET",
            name.to_uppercase()
        )));
    }
    if DISALLOWED_PARAMETERS.contains(&name) || TRANSACTION_PARAMETERS.contains(&name) {
        return Err(Error::Configuration(format!(
            "Could not set parameter. Set parameter '{name}' is not allowed. \
             Try again with a different parameter name"
        )));
    }
    Ok(())
}

/// Per-connection session state: the engine endpoint plus the partitioned
/// parameter map.
#[derive(Debug, Clone)]
pub struct SessionState {
    engine_url: Url,
    /// Server-managed parameters (immutable + transaction).
    server_params: HashMap<String, String>,
    /// Parameters staged via `SET`.
    user_params: HashMap<String, String>,
}

impl SessionState {
    /// Create session state for an engine endpoint and optional database.
    #[must_use]
    pub fn new(engine_url: Url, database: Option<&str>) -> Self {
        let mut server_params = HashMap::new();
        if let Some(database) = database {
            server_params.insert("database".to_owned(), database.to_owned());
        }
        Self {
            engine_url,
            server_params,
            user_params: HashMap::new(),
        }
    }

    /// Current engine endpoint.
    #[must_use]
    pub fn engine_url(&self) -> &Url {
        &self.engine_url
    }

    /// Current database, if pinned.
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.server_params.get("database").map(String::as_str)
    }

    /// Pin the database parameter.
    pub fn set_database(&mut self, database: &str) {
        self.server_params
            .insert("database".to_owned(), database.to_owned());
    }

    /// Active transaction id, if the server opened one.
    #[must_use]
    pub fn transaction_id(&self) -> Option<&str> {
        self.server_params.get("transaction_id").map(String::as_str)
    }

    /// Parameters to attach to the next request, server set first so user
    /// parameters can never shadow it.
    #[must_use]
    pub fn request_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .server_params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        params.sort();
        let mut user: Vec<(String, String)> = self
            .user_params
            .iter()
            .filter(|(k, _)| !self.server_params.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        user.sort();
        params.extend(user);
        params
    }

    /// Stage a validated `SET` parameter.
    pub fn stage_set(&mut self, parameter: SetParameter) {
        self.user_params.insert(parameter.name, parameter.value);
    }

    /// Look up a staged user parameter.
    #[must_use]
    pub fn user_param(&self, name: &str) -> Option<&str> {
        self.user_params.get(name).map(String::as_str)
    }

    /// Apply every dynamic header carried by a response.
    pub fn apply_response_headers(&mut self, headers: &HeaderMap) -> Result<()> {
        if let Some(value) = header_str(headers, RESET_SESSION_HEADER) {
            if !value.eq_ignore_ascii_case("false") {
                self.reset_session();
            }
        }
        if let Some(value) = header_str(headers, UPDATE_ENDPOINT_HEADER) {
            self.update_endpoint(value)?;
        }
        if let Some(value) = header_str(headers, UPDATE_PARAMETERS_HEADER) {
            self.update_parameters(value)?;
        }
        if let Some(value) = header_str(headers, REMOVE_PARAMETERS_HEADER) {
            self.remove_parameters(value);
        }
        Ok(())
    }

    /// Clear user parameters and transaction state.
    pub fn reset_session(&mut self) {
        tracing::debug!("resetting session parameters");
        self.user_params.clear();
        for key in TRANSACTION_PARAMETERS {
            self.server_params.remove(key);
        }
    }

    fn update_endpoint(&mut self, raw: &str) -> Result<()> {
        let url = Url::parse(&fix_url_schema(raw))
            .map_err(|e| Error::Operational(format!("invalid endpoint header {raw}: {e}")))?;
        for (key, value) in url.query_pairs() {
            self.server_params.insert(key.into_owned(), value.into_owned());
        }
        let mut endpoint = url;
        endpoint.set_query(None);
        tracing::debug!(endpoint = %endpoint, "engine endpoint updated by server");
        self.engine_url = endpoint;
        Ok(())
    }

    fn update_parameters(&mut self, raw: &str) -> Result<()> {
        for item in raw.split(',') {
            let (key, value) = item.split_once('=').ok_or_else(|| {
                Error::Operational(format!("malformed parameters header: {raw}"))
            })?;
            let (key, value) = (key.trim().to_owned(), value.trim().to_owned());
            if is_immutable_parameter(&key) || TRANSACTION_PARAMETERS.contains(&key.as_str()) {
                self.server_params.insert(key, value);
            } else {
                self.user_params.insert(key, value);
            }
        }
        Ok(())
    }

    fn remove_parameters(&mut self, raw: &str) {
        for key in raw.split(',').map(str::trim) {
            if is_immutable_parameter(key) {
                // The server set these; refusing is the safe reading.
                tracing::warn!(key, "refusing to remove immutable session parameter");
                continue;
            }
            self.user_params.remove(key);
            self.server_params.remove(key);
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
