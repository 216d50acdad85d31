//! The authentication flow state machine.
//!
//! The original coroutine-style flow (request, response, request, ...) is
//! expressed as an explicit state machine: the driver calls [`AuthFlow::step`]
//! with the previous response (or `None` to start), performs the returned
//! [`Step`], and repeats until [`Step::Done`].

use bytes::Bytes;

use crate::auth::Auth;
use crate::error::{AuthError, Result};
use crate::token::{TokenRequest, is_unauthorized, parse_token_response};

/// What the driver must do next.
#[derive(Debug)]
pub enum Step {
    /// Send this token-acquisition request to the auth endpoint and feed the
    /// response back. Hold [`Auth::refresh_guard`] across the exchange.
    AcquireToken(TokenRequest),
    /// Send the caller's request, with `Authorization: Bearer <token>` when
    /// `bearer` is present, and feed the response back.
    SendRequest {
        /// Bearer token to attach, if any.
        bearer: Option<String>,
    },
    /// The last response fed in is the final one.
    Done,
}

/// A response observation fed back into the flow.
///
/// Only the status and (for auth decisions) the body are inspected; body
/// ownership stays with the driver.
#[derive(Debug, Clone)]
pub struct FlowResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Bytes,
}

impl FlowResponse {
    /// Create a response observation.
    #[must_use]
    pub fn new(status: u16, body: Bytes) -> Self {
        Self { status, body }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    TokenPending,
    RequestSent { retried: bool },
    RetryTokenPending,
    Finished,
}

/// Single-request authentication flow.
///
/// At most one token refresh is performed per request: a second 401 surfaces
/// as [`AuthError::Authorization`].
#[derive(Debug)]
pub struct AuthFlow<'a> {
    auth: &'a Auth,
    state: State,
}

impl<'a> AuthFlow<'a> {
    /// Start a flow for one outgoing request.
    #[must_use]
    pub fn new(auth: &'a Auth) -> Self {
        Self {
            auth,
            state: State::Start,
        }
    }

    /// Advance the state machine.
    ///
    /// `response` must be `None` on the first call and the response to the
    /// previously returned step afterwards.
    pub fn step(&mut self, response: Option<&FlowResponse>) -> Result<Step> {
        match self.state {
            State::Start => {
                if !self.auth.requires_token() {
                    // No-auth deployments send the request as-is; whatever
                    // comes back is final.
                    self.state = State::Finished;
                    return Ok(Step::SendRequest { bearer: None });
                }
                self.auth.load_cached_token();
                if self.auth.has_fresh_token() {
                    self.state = State::RequestSent { retried: false };
                    return Ok(Step::SendRequest {
                        bearer: self.auth.token(),
                    });
                }
                self.state = State::TokenPending;
                Ok(Step::AcquireToken(self.auth.token_request()?))
            }
            State::TokenPending | State::RetryTokenPending => {
                let response = response.ok_or_else(|| {
                    AuthError::InvalidTokenResponse("token response expected".to_owned())
                })?;
                let acquired = parse_token_response(response.status, &response.body)?;
                self.auth.set_token(acquired.token, acquired.expires_in);
                let retried = self.state == State::RetryTokenPending;
                self.state = State::RequestSent { retried };
                Ok(Step::SendRequest {
                    bearer: self.auth.token(),
                })
            }
            State::RequestSent { retried } => {
                let response = response.ok_or_else(|| {
                    AuthError::InvalidTokenResponse("request response expected".to_owned())
                })?;
                if !is_unauthorized(response.status, &response.body) {
                    self.state = State::Finished;
                    return Ok(Step::Done);
                }
                if retried {
                    self.state = State::Finished;
                    return Err(AuthError::authorization_default());
                }
                tracing::debug!("request unauthorized, refreshing token");
                self.auth.invalidate();
                self.state = State::RetryTokenPending;
                Ok(Step::AcquireToken(self.auth.token_request()?))
            }
            State::Finished => Ok(Step::Done),
        }
    }

    /// Skip a pending token acquisition because another task refreshed the
    /// token while this flow was waiting on the refresh lock.
    pub fn skip_acquire(&mut self) -> Result<Step> {
        debug_assert!(matches!(
            self.state,
            State::TokenPending | State::RetryTokenPending
        ));
        let retried = self.state == State::RetryTokenPending;
        self.state = State::RequestSent { retried };
        Ok(Step::SendRequest {
            bearer: self.auth.token(),
        })
    }
}
