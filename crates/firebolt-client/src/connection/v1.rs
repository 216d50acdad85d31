//! Legacy (V1) connection bootstrap.
//!
//! V1 deployments resolve engines through the account REST endpoints instead
//! of the system engine: engine name → engine id → engine endpoint, or the
//! database's default engine when no engine is named.

use reqwest::StatusCode;
use url::Url;

use crate::config::ConnectParams;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestSpec, check_response};
use crate::util::parse_url;

const ACCOUNT_BY_NAME_URL: &str = "/iam/v2/accounts:getIdByName";
const ACCOUNT_URL: &str = "/iam/v2/account";
const ENGINE_BY_NAME_URL: &str = "/core/v1/accounts/{account_id}/engines:getIdByName";
const ENGINE_URL: &str = "/core/v1/accounts/{account_id}/engines/{engine_id}";
const ENGINE_BY_DATABASE_URL: &str =
    "/core/v1/accounts/{account_id}/engines:getURLByDatabaseName";

pub(crate) async fn connect_v1(params: ConnectParams) -> Result<Connection> {
    let database = params
        .database
        .clone()
        .ok_or_else(|| Error::Configuration("database name is required to connect".to_owned()))?;
    if params.engine_name.is_some() && params.engine_url.is_some() {
        return Err(Error::Configuration(
            "Both engine_name and engine_url are provided. Provide only one to connect".to_owned(),
        ));
    }

    let api_endpoint = parse_url(&params.api_endpoint)?;
    let http = HttpClient::new(
        params.auth.clone(),
        api_endpoint,
        params.user_agent.user_agent(),
    )?;

    let engine_url = match (&params.engine_name, &params.engine_url) {
        (_, Some(engine_url)) => parse_url(engine_url)?,
        (Some(engine_name), None) => {
            let account_id = account_id(&http, params.account_name.as_deref()).await?;
            engine_url_by_name(&http, &account_id, engine_name).await?
        }
        (None, None) => {
            let account_id = account_id(&http, params.account_name.as_deref()).await?;
            default_engine_url(&http, &account_id, &database).await?
        }
    };

    Ok(Connection::new_v1(http, engine_url, &database, &params))
}

async fn account_id(http: &HttpClient, account_name: Option<&str>) -> Result<String> {
    let (path, field) = match account_name {
        Some(_) => (ACCOUNT_BY_NAME_URL, "account_id"),
        None => (ACCOUNT_URL, "account"),
    };
    let mut url = join(http, path)?;
    if let Some(name) = account_name {
        url.query_pairs_mut().append_pair("account_name", name);
    }
    let response = http.send(&RequestSpec::get(url)).await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Err(Error::AccountNotFound(
            account_name.unwrap_or("<default>").to_owned(),
        ));
    }
    let body = check_response(response).await?.bytes().await?;
    let parsed: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| Error::Interface(format!("invalid account response: {e}")))?;
    let id = match account_name {
        Some(_) => parsed.get(field).and_then(|v| v.as_str()).map(str::to_owned),
        None => parsed
            .pointer("/account/id")
            .and_then(|v| v.as_str())
            .map(str::to_owned),
    };
    id.ok_or_else(|| Error::Interface("account response missing id".to_owned()))
}

async fn engine_url_by_name(
    http: &HttpClient,
    account_id: &str,
    engine_name: &str,
) -> Result<Url> {
    let mut url = join(http, &ENGINE_BY_NAME_URL.replace("{account_id}", account_id))?;
    url.query_pairs_mut().append_pair("engine_name", engine_name);
    let response = http.send(&RequestSpec::get(url)).await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Err(Error::EngineNotFound(engine_name.to_owned()));
    }
    let body = check_response(response).await?.bytes().await?;
    let parsed: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| Error::Interface(format!("invalid engine response: {e}")))?;
    let engine_id = parsed
        .pointer("/engine_id/engine_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::EngineNotFound(engine_name.to_owned()))?;

    let url = join(
        http,
        &ENGINE_URL
            .replace("{account_id}", account_id)
            .replace("{engine_id}", engine_id),
    )?;
    let body = check_response(http.send(&RequestSpec::get(url)).await?)
        .await?
        .bytes()
        .await?;
    let parsed: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| Error::Interface(format!("invalid engine response: {e}")))?;
    let endpoint = parsed
        .pointer("/engine/endpoint")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::EngineNotFound(engine_name.to_owned()))?;
    parse_url(endpoint)
}

async fn default_engine_url(http: &HttpClient, account_id: &str, database: &str) -> Result<Url> {
    let mut url = join(http, &ENGINE_BY_DATABASE_URL.replace("{account_id}", account_id))?;
    url.query_pairs_mut().append_pair("database_name", database);
    let response = http.send(&RequestSpec::get(url)).await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Err(Error::Interface(format!(
            "Database {database} has no default engine"
        )));
    }
    let body = check_response(response).await?.bytes().await?;
    let parsed: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| Error::Interface(format!("invalid engine response: {e}")))?;
    let endpoint = parsed
        .get("engine_url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Interface("engine response missing engine_url".to_owned()))?;
    parse_url(endpoint)
}

fn join(http: &HttpClient, path: &str) -> Result<Url> {
    http.api_endpoint()
        .join(path)
        .map_err(|e| Error::Configuration(format!("invalid V1 endpoint path: {e}")))
}
