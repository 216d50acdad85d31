//! HTTP client wrapper.
//!
//! Sits between the cursor and reqwest: drives the authentication flow for
//! every request, logs requests and responses, elevates error statuses, and
//! keeps idle connections alive (network load balancers drop idle TCP flows,
//! so sockets run with a 60 s keepalive).

use std::time::Duration;

use bytes::Bytes;
use firebolt_auth::{Auth, AuthFlow, FlowResponse, Step, TokenRequestBody};
use reqwest::header::{AUTHORIZATION, HeaderMap, USER_AGENT};
use reqwest::{Method, StatusCode};
use url::Url;

use crate::error::{Error, Result, ServerError, StructuredError};
use crate::urls::{ACCOUNT_ID_BY_NAME, format_account_url};
use crate::util::{Timer, auth_endpoint};

const KEEPALIVE: Duration = Duration::from_secs(60);
// Bounds connection establishment only; reading a streamed result body may
// legitimately take longer than any fixed total timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// A request to be sent through the auth-aware pipeline.
#[derive(Debug, Clone)]
pub(crate) struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub query: Vec<(String, String)>,
    /// SQL text or other raw body.
    pub body: Option<String>,
    /// Per-request timeout override (from the timeout controller).
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    pub(crate) fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub(crate) fn post(url: Url, query: Vec<(String, String)>, body: String) -> Self {
        Self {
            method: Method::POST,
            url,
            query,
            body: Some(body),
            timeout: None,
        }
    }
}

/// A response from the pipeline.
///
/// Responses that had to be buffered for auth decisions (401/500) or error
/// elevation keep their bytes; successful responses stay live so large
/// result bodies can stream.
pub(crate) enum HttpResponse {
    Live(reqwest::Response),
    Buffered {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
}

impl HttpResponse {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::Live(r) => r.status(),
            Self::Buffered { status, .. } => *status,
        }
    }

    pub(crate) fn headers(&self) -> &HeaderMap {
        match self {
            Self::Live(r) => r.headers(),
            Self::Buffered { headers, .. } => headers,
        }
    }

    /// Read the whole body. Transport failures here happen mid-stream.
    pub(crate) async fn bytes(self) -> Result<Bytes> {
        match self {
            Self::Live(r) => r.bytes().await.map_err(Error::stream_transport),
            Self::Buffered { body, .. } => Ok(body),
        }
    }

    /// The live response, for streaming consumption.
    pub(crate) fn into_live(self) -> Result<reqwest::Response> {
        match self {
            Self::Live(r) => Ok(r),
            Self::Buffered { .. } => Err(Error::Internal(
                "buffered response cannot be streamed".to_owned(),
            )),
        }
    }
}

/// Auth-aware HTTP client bound to one connection.
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: reqwest::Client,
    auth: Auth,
    api_endpoint: Url,
    user_agent: String,
}

impl HttpClient {
    pub(crate) fn new(auth: Auth, api_endpoint: Url, user_agent: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .tcp_keepalive(KEEPALIVE)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(Error::bootstrap_transport)?;
        Ok(Self {
            client,
            auth,
            api_endpoint,
            user_agent,
        })
    }

    pub(crate) fn auth(&self) -> &Auth {
        &self.auth
    }

    pub(crate) fn api_endpoint(&self) -> &Url {
        &self.api_endpoint
    }

    /// Send a request through the auth flow.
    ///
    /// At most one token refresh is performed on 401 (or embedded 401); the
    /// flow itself surfaces `AuthorizationError` on a second rejection.
    pub(crate) async fn send(&self, spec: &RequestSpec) -> Result<HttpResponse> {
        let _timer = Timer::new("[PERFORMANCE] Request ");
        let mut flow = AuthFlow::new(&self.auth);
        let mut step = flow.step(None).map_err(Error::from)?;
        let mut response: Option<HttpResponse> = None;

        loop {
            match step {
                Step::AcquireToken(request) => {
                    // Hold the refresh lock across the exchange so concurrent
                    // requests trigger at most one acquisition.
                    let _guard = self.auth.refresh_guard().await;
                    if self.auth.has_fresh_token() {
                        step = flow.skip_acquire().map_err(Error::from)?;
                        continue;
                    }
                    tracing::debug!(path = request.path, "acquiring token");
                    let (status, body) = self.send_token_request(&request).await?;
                    step = flow
                        .step(Some(&FlowResponse::new(status, body)))
                        .map_err(Error::from)?;
                }
                Step::SendRequest { bearer } => {
                    let sent = self.execute(spec, bearer.as_deref()).await?;
                    let status = sent.status();
                    tracing::debug!(status = %status, url = %spec.url, "response received");
                    if status == StatusCode::UNAUTHORIZED
                        || status == StatusCode::INTERNAL_SERVER_ERROR
                    {
                        // The flow needs the body to detect embedded 401s.
                        let headers = sent.headers().clone();
                        let body = sent.bytes().await.map_err(Error::stream_transport)?;
                        step = flow
                            .step(Some(&FlowResponse::new(status.as_u16(), body.clone())))
                            .map_err(Error::from)?;
                        response = Some(HttpResponse::Buffered {
                            status,
                            headers,
                            body,
                        });
                    } else {
                        step = flow
                            .step(Some(&FlowResponse::new(status.as_u16(), Bytes::new())))
                            .map_err(Error::from)?;
                        response = Some(HttpResponse::Live(sent));
                    }
                }
                Step::Done => break,
            }
        }

        response.ok_or_else(|| Error::Internal("auth flow produced no response".to_owned()))
    }

    async fn execute(
        &self,
        spec: &RequestSpec,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response> {
        tracing::debug!(method = %spec.method, url = %spec.url, "sending request");
        let mut builder = self
            .client
            .request(spec.method.clone(), spec.url.clone())
            .header(USER_AGENT, &self.user_agent);
        if !spec.query.is_empty() {
            builder = builder.query(&spec.query);
        }
        if let Some(bearer) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {bearer}"));
        }
        if let Some(body) = &spec.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = spec.timeout {
            builder = builder.timeout(timeout);
        }
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::QueryTimeout
            } else {
                Error::bootstrap_transport(e)
            }
        })
    }

    async fn send_token_request(
        &self,
        request: &firebolt_auth::TokenRequest,
    ) -> Result<(u16, Bytes)> {
        let url = auth_endpoint(&self.api_endpoint)?
            .join(request.path)
            .map_err(|e| Error::Configuration(format!("invalid auth path: {e}")))?;
        let builder = self
            .client
            .post(url)
            .header(USER_AGENT, &self.user_agent);
        let builder = match &request.body {
            TokenRequestBody::Form(fields) => builder.form(fields),
            TokenRequestBody::Json(body) => builder.json(body),
        };
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Authentication(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Authentication(e.to_string()))?;
        Ok((status, body))
    }

    /// Resolve and cache the account id for an account name.
    pub(crate) async fn account_id(&self, account_name: &str) -> Result<String> {
        let cache = firebolt_auth::connection_cache();
        let key = firebolt_auth::CacheKey::new(
            self.auth.principal(),
            self.auth.secret(),
            Some(account_name),
        );
        if let Some(info) = cache.get(&key) {
            if let Some(id) = &info.account_id {
                return Ok(id.clone());
            }
        }

        let url = self
            .api_endpoint
            .join(&format_account_url(ACCOUNT_ID_BY_NAME, account_name))
            .map_err(|e| Error::Configuration(format!("invalid account URL: {e}")))?;
        let response = self.send(&RequestSpec::get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::AccountNotFoundOrNoAccess(account_name.to_owned()));
        }
        let response = check_response(response).await?;
        let body = response.bytes().await?;
        let parsed: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| Error::Interface(format!("invalid account response: {e}")))?;
        let id = parsed
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Interface("account response missing id".to_owned()))?
            .to_owned();

        cache.update(&key, |info| info.account_id = Some(id.clone()));
        Ok(id)
    }
}

/// Elevate error statuses into typed errors.
///
/// 400 bodies carrying a JSON `message` become [`Error::BadRequest`]; bodies
/// carrying a structured `errors` array become [`Error::Structured`]; other
/// 4xx/5xx statuses surface as operational errors with a body snippet.
pub(crate) async fn check_response(response: HttpResponse) -> Result<HttpResponse> {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return Ok(response);
    }
    let headers = response.headers().clone();
    let body = response.bytes().await?;
    Err(error_from_status(status, &headers, &body))
}

pub(crate) fn error_from_status(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Error {
    let _ = headers;
    if let Ok(parsed) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(errors) = parsed.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                let errors: Vec<ServerError> = errors
                    .iter()
                    .filter_map(|e| serde_json::from_value(e.clone()).ok())
                    .collect();
                return Error::Structured(StructuredError::new(errors));
            }
        }
        if status == StatusCode::BAD_REQUEST {
            if let Some(message) = parsed.get("message").and_then(|m| m.as_str()) {
                return Error::BadRequest(message.to_owned());
            }
        }
    }
    let snippet = String::from_utf8_lossy(&body[..body.len().min(512)]).into_owned();
    if status == StatusCode::BAD_REQUEST {
        return Error::BadRequest(snippet);
    }
    Error::Operational(format!("server returned HTTP {status}: {snippet}"))
}
