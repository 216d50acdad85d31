//! Authentication methods and shared token state.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use serde_json::json;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{AuthError, Result};
use crate::storage::TokenVault;
use crate::token::{LOGIN_URL, TOKEN_URL, TokenRequest, TokenRequestBody};

/// Firebolt deployment generation, derived from the authentication method.
///
/// The connection bootstrap is gated entirely on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireboltVersion {
    /// Legacy deployments (username/password auth).
    V1,
    /// Current cloud deployments (client credentials or a static token).
    V2,
    /// Local/containerized deployments without authentication.
    Core,
}

#[derive(Clone)]
enum Method {
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
    UsernamePassword {
        username: String,
        password: String,
    },
    StaticToken,
    Core {
        url: String,
    },
}

#[derive(Debug, Default)]
struct TokenState {
    token: Option<String>,
    expires_at: Option<SystemTime>,
}

#[derive(Debug)]
struct Shared {
    state: RwLock<TokenState>,
    // Serializes refresh across concurrent requests: N in-flight 401s must
    // trigger at most one acquisition.
    refresh_lock: Mutex<()>,
}

/// Authentication value for a Firebolt connection.
///
/// Clones share token state, so a connection and its system-engine
/// sub-connection refresh a single token between them.
#[derive(Clone)]
pub struct Auth {
    method: Method,
    use_token_cache: bool,
    shared: Arc<Shared>,
}

// Secrets must never reach logs; render only the method and principal.
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let method = match self.method {
            Method::ClientCredentials { .. } => "ClientCredentials",
            Method::UsernamePassword { .. } => "UsernamePassword",
            Method::StaticToken => "StaticToken",
            Method::Core { .. } => "Core",
        };
        f.debug_struct("Auth")
            .field("method", &method)
            .field("principal", &self.principal())
            .field("use_token_cache", &self.use_token_cache)
            .finish_non_exhaustive()
    }
}

impl Auth {
    fn new(method: Method, initial_token: Option<String>) -> Self {
        Self {
            method,
            use_token_cache: true,
            shared: Arc::new(Shared {
                state: RwLock::new(TokenState {
                    token: initial_token,
                    expires_at: None,
                }),
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    /// OAuth2 client-credentials authentication (service accounts).
    #[must_use]
    pub fn client_credentials(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::new(
            Method::ClientCredentials {
                client_id: client_id.into(),
                client_secret: client_secret.into(),
            },
            None,
        )
    }

    /// Legacy username/password authentication.
    #[must_use]
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(
            Method::UsernamePassword {
                username: username.into(),
                password: password.into(),
            },
            None,
        )
    }

    /// Authentication with an externally acquired token.
    ///
    /// The token is never cached and never refreshed; once the server rejects
    /// it the connection fails with an authorization error.
    #[must_use]
    pub fn static_token(token: impl Into<String>) -> Self {
        let token = token.into();
        let mut auth = Self::new(Method::StaticToken, Some(token));
        auth.use_token_cache = false;
        auth
    }

    /// No-auth access to a Firebolt Core deployment at `url`.
    #[must_use]
    pub fn core(url: impl Into<String>) -> Self {
        let mut auth = Self::new(Method::Core { url: url.into() }, None);
        auth.use_token_cache = false;
        auth
    }

    /// Disable or enable the token caches for this auth value.
    #[must_use]
    pub fn with_token_cache(mut self, use_token_cache: bool) -> Self {
        self.use_token_cache = use_token_cache;
        self
    }

    /// Which deployment generation this auth value addresses.
    #[must_use]
    pub fn version(&self) -> FireboltVersion {
        match self.method {
            Method::ClientCredentials { .. } | Method::StaticToken => FireboltVersion::V2,
            Method::UsernamePassword { .. } => FireboltVersion::V1,
            Method::Core { .. } => FireboltVersion::Core,
        }
    }

    /// The engine URL of a Core deployment, if this is Core auth.
    #[must_use]
    pub fn core_url(&self) -> Option<&str> {
        match &self.method {
            Method::Core { url } => Some(url),
            _ => None,
        }
    }

    /// Whether requests should carry an `Authorization` header at all.
    #[must_use]
    pub fn requires_token(&self) -> bool {
        !matches!(self.method, Method::Core { .. })
    }

    /// The principal (client id or username) identifying these credentials.
    #[must_use]
    pub fn principal(&self) -> &str {
        match &self.method {
            Method::ClientCredentials { client_id, .. } => client_id,
            Method::UsernamePassword { username, .. } => username,
            Method::StaticToken => "token",
            Method::Core { url } => url,
        }
    }

    /// The secret paired with the principal.
    #[must_use]
    pub fn secret(&self) -> &str {
        match &self.method {
            Method::ClientCredentials { client_secret, .. } => client_secret,
            Method::UsernamePassword { password, .. } => password,
            Method::StaticToken | Method::Core { .. } => "",
        }
    }

    /// Whether token caching is enabled for this auth value.
    #[must_use]
    pub fn caching_enabled(&self) -> bool {
        self.use_token_cache
    }

    /// Currently held bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.shared.state.read().token.clone()
    }

    /// Whether the held token has passed its expiry.
    #[must_use]
    pub fn expired(&self) -> bool {
        match self.shared.state.read().expires_at {
            Some(at) => at <= SystemTime::now(),
            None => false,
        }
    }

    /// Whether a usable token is currently held.
    #[must_use]
    pub fn has_fresh_token(&self) -> bool {
        let state = self.shared.state.read();
        let expired = state.expires_at.is_some_and(|at| at <= SystemTime::now());
        state.token.is_some() && !expired
    }

    /// Store a freshly acquired token, pushing it to the vault when caching
    /// is enabled.
    pub fn set_token(&self, token: String, expires_in: u64) {
        let expires_at = SystemTime::now() + Duration::from_secs(expires_in);
        if self.use_token_cache {
            if let Some(vault) = self.vault() {
                if let Err(error) = vault.store(&token, expires_at) {
                    tracing::debug!(%error, "failed to persist token to vault");
                }
            }
        }
        let mut state = self.shared.state.write();
        state.token = Some(token);
        state.expires_at = Some(expires_at);
    }

    /// Drop the held token so the next request re-acquires.
    pub fn invalidate(&self) {
        let mut state = self.shared.state.write();
        state.token = None;
        state.expires_at = None;
    }

    /// Load a previously vaulted token, if caching is enabled and one is
    /// still valid.
    pub fn load_cached_token(&self) {
        if !self.use_token_cache || self.has_fresh_token() {
            return;
        }
        if let Some(vault) = self.vault() {
            if let Some(token) = vault.load() {
                tracing::debug!("using vaulted token");
                self.shared.state.write().token = Some(token);
            }
        }
    }

    fn vault(&self) -> Option<TokenVault> {
        match self.method {
            Method::ClientCredentials { .. } | Method::UsernamePassword { .. } => {
                TokenVault::open(self.principal(), self.secret())
                    .map_err(|error| tracing::debug!(%error, "token vault unavailable"))
                    .ok()
            }
            _ => None,
        }
    }

    /// Serialize token refresh: hold the guard while acquiring.
    pub async fn refresh_guard(&self) -> MutexGuard<'_, ()> {
        self.shared.refresh_lock.lock().await
    }

    /// Build the token-acquisition request for this method.
    ///
    /// Static tokens cannot be re-acquired: once invalidated they fail with
    /// an authorization error. Core never asks for a token.
    pub fn token_request(&self) -> Result<TokenRequest> {
        match &self.method {
            Method::ClientCredentials {
                client_id,
                client_secret,
            } => Ok(TokenRequest {
                path: TOKEN_URL,
                body: TokenRequestBody::Form(vec![
                    ("client_id", client_id.clone()),
                    ("client_secret", client_secret.clone()),
                    ("grant_type", "client_credentials".to_owned()),
                ]),
            }),
            Method::UsernamePassword { username, password } => Ok(TokenRequest {
                path: LOGIN_URL,
                body: TokenRequestBody::Json(json!({
                    "username": username,
                    "password": password,
                })),
            }),
            Method::StaticToken => Err(AuthError::Authorization(
                "Provided token is not valid anymore".to_owned(),
            )),
            Method::Core { .. } => Err(AuthError::Authorization(
                "Core deployments do not use tokens".to_owned(),
            )),
        }
    }
}
