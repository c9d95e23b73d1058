//! taskmate-client: session store, API client and the auth/task controllers

pub mod api;
pub mod auth;
pub mod collection;
pub mod error;
pub mod session;
pub mod transport;

pub use api::{ApiClient, RegisteredUser};
pub use auth::{AuthFlow, AuthState, Authenticated, LoginSuccess, RegisterOutcome};
pub use collection::{LoadOutcome, LoadTicket, TaskCollection};
pub use error::ApiError;
pub use session::{FileBackend, MemoryBackend, Profile, SessionBackend, SessionRecord, SessionStore};
pub use transport::{
    DEFAULT_BASE_URL, DEFAULT_TIMEOUT, HttpRequest, HttpResponse, HttpTransport, Method, Transport,
};
