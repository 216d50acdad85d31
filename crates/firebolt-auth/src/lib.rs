//! # firebolt-auth
//!
//! Authentication for Firebolt connections: bearer-token acquisition,
//! transparent refresh on 401, a process-wide connection-info cache, and an
//! encrypted on-disk token vault.
//!
//! The HTTP flow is modelled as an explicit state machine ([`AuthFlow`])
//! rather than middleware: the driver asks the flow what to send next, sends
//! it, and feeds the response back. This keeps the crate free of any HTTP
//! engine dependency and makes the 401-retry path testable in isolation.
//!
//! ```rust
//! use firebolt_auth::{Auth, AuthFlow, Step};
//!
//! let auth = Auth::client_credentials("my-id", "my-secret").with_token_cache(false);
//! let mut flow = AuthFlow::new(&auth);
//! // First step: no token yet, so the flow asks for an acquisition request.
//! assert!(matches!(flow.step(None), Ok(Step::AcquireToken(_))));
//! ```

pub mod auth;
pub mod cache;
pub mod error;
pub mod fernet;
pub mod flow;
pub mod storage;
pub mod token;

pub use auth::{Auth, FireboltVersion};
pub use cache::{CacheKey, ConnectionCache, ConnectionInfo, DatabaseInfo, EngineInfo, connection_cache};
pub use error::AuthError;
pub use flow::{AuthFlow, FlowResponse, Step};
pub use token::{TokenRequest, TokenRequestBody, internal_error_code};
