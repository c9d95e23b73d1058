//! Task Collection Controller.
//!
//! Holds the user's tasks as last confirmed by the server (`all`) together
//! with the filter, sort order and search query, and keeps the derived
//! `visible` list in step with them. Local state only changes after the
//! server has accepted a mutation.
//!
//! Loads are tagged with a generation number. A load that completes after a
//! newer one has started, or after a mutation was accepted, is dropped, so a
//! slow stale response can never overwrite a fresher list.

use std::sync::{Mutex, MutexGuard, PoisonError};

use taskmate_core::{
    SortOrder, StatusFilter, Task, TaskForm, TaskPatch, ViewQuery, derive_visible,
};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::transport::{HttpTransport, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    pub fn generation(self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The list was replaced; carries the new task count.
    Applied(usize),
    /// A newer load started meanwhile; this response was dropped.
    Superseded,
}

#[derive(Debug, Default)]
struct State {
    all: Vec<Task>,
    query: ViewQuery,
    visible: Vec<Task>,
    generation: u64,
    last_error: Option<String>,
}

impl State {
    fn recompute(&mut self) {
        self.visible = derive_visible(&self.all, &self.query);
    }

    /// After an accepted mutation. Loads already in flight read the list
    /// before the change and must not land on top of it.
    fn mutated(&mut self) {
        self.generation += 1;
        self.last_error = None;
        self.recompute();
    }
}

pub struct TaskCollection<T: Transport = HttpTransport> {
    api: ApiClient<T>,
    state: Mutex<State>,
}

impl<T: Transport> TaskCollection<T> {
    pub fn new(api: ApiClient<T>) -> Self {
        Self {
            api,
            state: Mutex::new(State::default()),
        }
    }

    pub fn api(&self) -> &ApiClient<T> {
        &self.api
    }

    // Never held across an await.
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn all(&self) -> Vec<Task> {
        self.state().all.clone()
    }

    pub fn visible(&self) -> Vec<Task> {
        self.state().visible.clone()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.state().all.iter().find(|t| t.id == id).cloned()
    }

    pub fn query(&self) -> ViewQuery {
        self.state().query.clone()
    }

    /// User-facing text of the most recent failure, cleared by the next
    /// successful operation.
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    pub fn set_status_filter(&self, status: StatusFilter) {
        let mut st = self.state();
        st.query.status = status;
        st.recompute();
    }

    pub fn set_sort_order(&self, sort: SortOrder) {
        let mut st = self.state();
        st.query.sort = sort;
        st.recompute();
    }

    pub fn toggle_sort(&self) -> SortOrder {
        let mut st = self.state();
        st.query.sort = st.query.sort.toggled();
        st.recompute();
        st.query.sort
    }

    pub fn set_search(&self, search: &str) {
        let mut st = self.state();
        st.query.search = search.to_string();
        st.recompute();
    }

    pub fn set_query(&self, query: ViewQuery) {
        let mut st = self.state();
        st.query = query;
        st.recompute();
    }

    /// Teardown on logout. Any load still in flight is invalidated too.
    pub fn clear(&self) {
        let mut st = self.state();
        st.generation += 1;
        st.all.clear();
        st.last_error = None;
        st.recompute();
    }

    /// Fetch the full list and replace `all`.
    pub async fn load(&self) -> Result<LoadOutcome, ApiError> {
        let ticket = self.begin_load();
        let result = self.api.list_tasks().await;
        self.finish_load(ticket, result)
    }

    /// Explicit reload, e.g. after a create from another view.
    pub async fn refresh(&self) -> Result<LoadOutcome, ApiError> {
        self.load().await
    }

    /// First half of `load`: claim the next generation.
    pub fn begin_load(&self) -> LoadTicket {
        let mut st = self.state();
        st.generation += 1;
        LoadTicket {
            generation: st.generation,
        }
    }

    /// Second half of `load`: apply the response unless it has been
    /// superseded. Stale failures are dropped the same way.
    pub fn finish_load(
        &self,
        ticket: LoadTicket,
        result: Result<Vec<Task>, ApiError>,
    ) -> Result<LoadOutcome, ApiError> {
        let mut st = self.state();
        if ticket.generation != st.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = st.generation,
                "discarding superseded task list"
            );
            return Ok(LoadOutcome::Superseded);
        }
        match result {
            Ok(tasks) => {
                st.all = tasks;
                st.last_error = None;
                st.recompute();
                Ok(LoadOutcome::Applied(st.all.len()))
            }
            Err(e) => {
                drop(st);
                Err(self.fail("Error fetching tasks", e))
            }
        }
    }

    /// Create from form input. On success the server's task is appended and
    /// the form reset; on failure neither changes.
    pub async fn create(&self, form: &mut TaskForm) -> Result<Task, ApiError> {
        let draft = form.to_draft()?;
        match self.api.create_task(&draft).await {
            Ok(task) => {
                {
                    let mut st = self.state();
                    st.all.push(task.clone());
                    st.mutated();
                }
                form.reset();
                tracing::debug!(id = %task.id, "task created");
                Ok(task)
            }
            Err(e) => Err(self.fail("Error creating task", e)),
        }
    }

    /// Merge `patch` onto the cached task, send it, and keep the merged
    /// version once the server accepts it.
    pub async fn update(&self, id: &str, patch: &TaskPatch) -> Result<Task, ApiError> {
        let Some(current) = self.get(id) else {
            return Err(ApiError::Validation(format!("no task with id {id}")));
        };
        let merged = current.merged(patch);
        if merged.title.trim().is_empty() {
            return Err(ApiError::Validation("title is required".to_string()));
        }

        match self.api.update_task(id, &merged).await {
            Ok(_) => {
                let mut st = self.state();
                if let Some(slot) = st.all.iter_mut().find(|t| t.id == id) {
                    *slot = merged.clone();
                }
                st.mutated();
                Ok(merged)
            }
            Err(e) => Err(self.fail("Error updating task", e)),
        }
    }

    /// The request is sent even if `id` isn't cached; a missing local entry
    /// is not an error.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        match self.api.delete_task(id).await {
            Ok(()) => {
                let mut st = self.state();
                st.all.retain(|t| t.id != id);
                st.mutated();
                Ok(())
            }
            Err(e) => Err(self.fail("Error deleting task", e)),
        }
    }

    /// An authorization failure also clears the shared Session Store; an
    /// `AuthFlow` on the same store sees it through `AuthFlow::revalidate`.
    fn fail(&self, action: &str, e: ApiError) -> ApiError {
        tracing::warn!("{action}: {e}");
        if e.is_auth_failure() {
            if let Err(clear_err) = self.api.session().clear() {
                tracing::warn!("could not clear session: {clear_err}");
            }
        }
        self.state().last_error = Some(format!("{action}: {e}"));
        e
    }
}
