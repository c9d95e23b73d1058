#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use taskmate_client::{
    ApiClient, ApiError, AuthFlow, HttpRequest, HttpResponse, SessionBackend, SessionRecord,
    SessionStore, TaskCollection, Transport,
};
use taskmate_core::{Task, TaskDraft};

pub const EMAIL: &str = "ann@example.com";
pub const PASSWORD: &str = "correct horse";

pub fn token_expiring_at(exp: i64, nonce: u64) -> String {
    format!(
        "{}.{}.sig{nonce}",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(format!(r#"{{"id":"u","exp":{exp}}}"#))
    )
}

pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

struct User {
    name: String,
    email: String,
    password: String,
}

#[derive(Default)]
struct ServerState {
    users: Vec<User>,
    tokens: HashMap<String, String>,
    tasks: HashMap<String, Vec<Task>>,
    next_id: u64,
    log: Vec<(String, String)>,
    failures: HashMap<(String, String), (u16, String)>,
}

/// In-process stand-in for the task API.
#[derive(Default)]
pub struct FakeServer {
    state: Mutex<ServerState>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ann with the standard password and nothing else.
    pub fn with_ann() -> Self {
        let s = Self::new();
        s.add_user("Ann", EMAIL, PASSWORD);
        s
    }

    pub fn add_user(&self, name: &str, email: &str, password: &str) {
        self.state.lock().unwrap().users.push(User {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        });
    }

    pub fn seed_task(&self, email: &str, task: Task) {
        self.state
            .lock()
            .unwrap()
            .tasks
            .entry(email.to_string())
            .or_default()
            .push(task);
    }

    pub fn tasks_of(&self, email: &str) -> Vec<Task> {
        self.state
            .lock()
            .unwrap()
            .tasks
            .get(email)
            .cloned()
            .unwrap_or_default()
    }

    /// A token the server recognises for `email`.
    pub fn issue_token(&self, email: &str, exp: i64) -> String {
        let mut st = self.state.lock().unwrap();
        st.next_id += 1;
        let token = token_expiring_at(exp, st.next_id);
        st.tokens.insert(token.clone(), email.to_string());
        token
    }

    /// Forget every issued token, as if the signing secret rotated.
    pub fn revoke_all_tokens(&self) {
        self.state.lock().unwrap().tokens.clear();
    }

    /// Make the next `method path` request fail with `status`.
    pub fn fail_once(&self, method: &str, path: &str, status: u16, message: &str) {
        self.state.lock().unwrap().failures.insert(
            (method.to_string(), path.to_string()),
            (status, message.to_string()),
        );
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().log.len()
    }

    fn handle(&self, req: HttpRequest) -> HttpResponse {
        let mut st = self.state.lock().unwrap();
        let method = req.method.as_str().to_string();
        st.log.push((method.clone(), req.path.clone()));

        if let Some((status, message)) = st.failures.remove(&(method.clone(), req.path.clone())) {
            return respond(status, json!({ "message": message }));
        }

        let body = req.body.clone().unwrap_or(Value::Null);
        match (method.as_str(), req.path.as_str()) {
            ("POST", "/api/users/register") => st.register(&body),
            ("POST", "/api/users/login") => st.login(&body),
            ("GET", "/api/users/me") => match st.caller(&req) {
                Some(email) => {
                    let user = st.users.iter().find(|u| u.email == email);
                    match user {
                        Some(u) => respond(200, json!({ "name": u.name, "email": u.email })),
                        None => not_authorized(),
                    }
                }
                None => not_authorized(),
            },
            (_, path) if path == "/api/tasks" || path.starts_with("/api/tasks/") => {
                let Some(email) = st.caller(&req) else {
                    return not_authorized();
                };
                let id = path.strip_prefix("/api/tasks/").map(str::to_string);
                st.tasks_route(&method, id, &email, &body)
            }
            _ => respond(404, json!({ "message": "Not found" })),
        }
    }
}

impl ServerState {
    fn caller(&self, req: &HttpRequest) -> Option<String> {
        let token = req.bearer.as_ref()?;
        if taskmate_core::is_expired(token) {
            return None;
        }
        self.tokens.get(token).cloned()
    }

    fn register(&mut self, body: &Value) -> HttpResponse {
        let field = |k: &str| body.get(k).and_then(Value::as_str).unwrap_or("").to_string();
        let (name, email, password) = (field("name"), field("email"), field("password"));
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return respond(400, json!({ "message": "Please fill all fields" }));
        }
        if self.users.iter().any(|u| u.email == email) {
            return respond(400, json!({ "message": "User already exists" }));
        }
        self.next_id += 1;
        let id = format!("u{}", self.next_id);
        self.users.push(User {
            name: name.clone(),
            email: email.clone(),
            password,
        });
        respond(201, json!({ "_id": id, "name": name, "email": email }))
    }

    fn login(&mut self, body: &Value) -> HttpResponse {
        let email = body.get("email").and_then(Value::as_str).unwrap_or("");
        let password = body.get("password").and_then(Value::as_str).unwrap_or("");
        let ok = self
            .users
            .iter()
            .any(|u| u.email == email && u.password == password);
        if !ok {
            return respond(400, json!({ "message": "Invalid credentials" }));
        }
        self.next_id += 1;
        let token = token_expiring_at(now_secs() + 3600, self.next_id);
        self.tokens.insert(token.clone(), email.to_string());
        respond(200, json!({ "token": token }))
    }

    fn tasks_route(
        &mut self,
        method: &str,
        id: Option<String>,
        email: &str,
        body: &Value,
    ) -> HttpResponse {
        match (method, id) {
            ("GET", None) => {
                let list = self.tasks.get(email).cloned().unwrap_or_default();
                respond(200, json!(list))
            }
            ("POST", None) => {
                let Ok(draft) = serde_json::from_value::<TaskDraft>(body.clone()) else {
                    return respond(400, json!({ "message": "Invalid task" }));
                };
                if draft.title.trim().is_empty() {
                    return respond(400, json!({ "message": "Title is required" }));
                }
                self.next_id += 1;
                let task = draft.into_task(format!("t{}", self.next_id));
                self.tasks
                    .entry(email.to_string())
                    .or_default()
                    .push(task.clone());
                respond(201, json!(task))
            }
            ("PUT", Some(id)) => {
                let Ok(mut task) = serde_json::from_value::<Task>(body.clone()) else {
                    return respond(400, json!({ "message": "Invalid task" }));
                };
                task.id = id.clone();
                let list = self.tasks.entry(email.to_string()).or_default();
                match list.iter_mut().find(|t| t.id == id) {
                    Some(slot) => {
                        *slot = task.clone();
                        respond(200, json!(task))
                    }
                    None => respond(404, json!({ "message": "Task not found" })),
                }
            }
            ("DELETE", Some(id)) => {
                let list = self.tasks.entry(email.to_string()).or_default();
                let before = list.len();
                list.retain(|t| t.id != id);
                if list.len() == before {
                    respond(404, json!({ "message": "Task not found" }))
                } else {
                    respond(200, json!({ "message": "Task removed" }))
                }
            }
            _ => respond(405, json!({ "message": "Method not allowed" })),
        }
    }
}

fn respond(status: u16, body: Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string())
}

fn not_authorized() -> HttpResponse {
    respond(401, json!({ "message": "Not authorized, token failed" }))
}

impl Transport for FakeServer {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        Ok(self.handle(request))
    }
}

/// Replays canned responses, each after its own delay.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<(Duration, HttpResponse)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, delay: Duration, status: u16, body: Value) {
        self.script
            .lock()
            .unwrap()
            .push_back((delay, respond(status, body)));
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let next = self.script.lock().unwrap().pop_front();
        let (delay, resp) = next.expect("script exhausted");
        tokio::time::sleep(delay).await;
        Ok(resp)
    }
}

/// Session storage that accepts a fixed number of writes, then reports a
/// full disk.
pub struct FillingBackend {
    record: Mutex<SessionRecord>,
    writes_left: AtomicUsize,
}

impl FillingBackend {
    pub fn new(writes: usize) -> Self {
        Self {
            record: Mutex::new(SessionRecord::default()),
            writes_left: AtomicUsize::new(writes),
        }
    }
}

impl SessionBackend for FillingBackend {
    fn load(&self) -> Result<SessionRecord, ApiError> {
        Ok(self.record.lock().unwrap().clone())
    }

    fn store(&self, record: &SessionRecord) -> Result<(), ApiError> {
        let left = self.writes_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(ApiError::Session("disk full".into()));
        }
        self.writes_left.store(left - 1, Ordering::SeqCst);
        *self.record.lock().unwrap() = record.clone();
        Ok(())
    }
}

pub fn client<T: Transport>(transport: T) -> ApiClient<T> {
    ApiClient::new(transport, SessionStore::in_memory())
}

/// Auth flow and collection sharing one API client and session.
pub fn controllers<T: Transport>(transport: T) -> (AuthFlow<T>, TaskCollection<T>) {
    let api = client(transport);
    (AuthFlow::new(api.clone()), TaskCollection::new(api))
}
