//! Typed wrapper over the task API.
//!
//! One method per endpoint. Authorized calls read the token from the
//! Session Store and fail with `Unauthorized` before touching the network
//! when there isn't a valid one. The client never writes to the session or
//! to any task cache; that is the controllers' job.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use taskmate_core::{RegisterForm, Task, TaskDraft};

use crate::error::ApiError;
use crate::session::{Profile, SessionStore};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};

#[derive(Debug, Clone, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerMessage {
    message: Option<String>,
}

/// Whatever the server echoes back after registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegisteredUser {
    #[serde(default, rename = "_id", alias = "id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

pub struct ApiClient<T: Transport = HttpTransport> {
    transport: Arc<T>,
    session: SessionStore,
}

impl<T: Transport> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            session: self.session.clone(),
        }
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, session: SessionStore) -> Self {
        Self {
            transport: Arc::new(transport),
            session,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Requires exactly 201 Created.
    pub async fn register(&self, form: &RegisterForm) -> Result<RegisteredUser, ApiError> {
        let req = HttpRequest::new(Method::POST, "/api/users/register").json(to_json(form)?);
        let resp = self.transport.send(req).await?;
        let resp = check(resp)?;
        if resp.status != 201 {
            return Err(ApiError::Rejected {
                status: resp.status,
                message: format!("registration returned {} instead of 201", resp.status),
            });
        }
        if resp.body.trim().is_empty() {
            return Ok(RegisteredUser::default());
        }
        parse(&resp)
    }

    /// Exchanges credentials for a token. Does not persist it.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let body = to_json(&Credentials { email, password })?;
        let req = HttpRequest::new(Method::POST, "/api/users/login").json(body);
        let resp = check(self.transport.send(req).await?)?;
        let out: LoginResponse = parse(&resp)?;
        out.token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Decode("token not provided".to_string()))
    }

    pub async fn profile(&self) -> Result<Profile, ApiError> {
        let token = self.token()?;
        self.profile_with(&token).await
    }

    /// Profile for an explicit token, used right after login before the
    /// token is stored.
    pub async fn profile_with(&self, token: &str) -> Result<Profile, ApiError> {
        let req = HttpRequest::new(Method::GET, "/api/users/me").bearer(token);
        parse(&check(self.transport.send(req).await?)?)
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let resp = self.authorized(Method::GET, "/api/tasks".to_string(), None).await?;
        parse(&resp)
    }

    /// Any 2xx counts as created.
    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        let resp = self
            .authorized(Method::POST, "/api/tasks".to_string(), Some(to_json(draft)?))
            .await?;
        parse(&resp)
    }

    pub async fn update_task(&self, id: &str, task: &Task) -> Result<Task, ApiError> {
        let resp = self
            .authorized(Method::PUT, task_path(id), Some(to_json(task)?))
            .await?;
        parse(&resp)
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
        self.authorized(Method::DELETE, task_path(id), None).await?;
        Ok(())
    }

    fn token(&self) -> Result<String, ApiError> {
        self.session.current()?.ok_or(ApiError::Unauthorized)
    }

    async fn authorized(
        &self,
        method: Method,
        path: String,
        body: Option<Value>,
    ) -> Result<HttpResponse, ApiError> {
        let token = self.token()?;
        let mut req = HttpRequest::new(method, path).bearer(token);
        req.body = body;
        check(self.transport.send(req).await?)
    }
}

/// Everything but RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn task_path(id: &str) -> String {
    format!("/api/tasks/{}", utf8_percent_encode(id, PATH_SEGMENT))
}

fn to_json<S: Serialize>(value: &S) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Validation(e.to_string()))
}

fn parse<D: DeserializeOwned>(resp: &HttpResponse) -> Result<D, ApiError> {
    serde_json::from_str(&resp.body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Turns non-2xx into `Rejected`, preferring the server's `{message}`.
fn check(resp: HttpResponse) -> Result<HttpResponse, ApiError> {
    if resp.is_success() {
        return Ok(resp);
    }
    let message = server_message(&resp);
    tracing::debug!(status = resp.status, %message, "request rejected");
    Err(ApiError::Rejected {
        status: resp.status,
        message,
    })
}

fn server_message(resp: &HttpResponse) -> String {
    if let Ok(ServerMessage { message: Some(m) }) = serde_json::from_str(&resp.body) {
        if !m.trim().is_empty() {
            return m;
        }
    }
    let text = resp.body.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    reqwest::StatusCode::from_u16(resp.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("request failed with status {}", resp.status))
}
