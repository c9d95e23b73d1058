//! taskmate-core: task model, forms, token expiry and list derivation

pub mod form;
pub mod task;
pub mod token;
pub mod view;

pub use form::{FormError, RegisterForm, TaskForm, parse_due_date, split_labels};
pub use task::{Priority, Task, TaskDraft, TaskPatch, TaskStatus};
pub use token::{expiry_seconds, is_expired, is_expired_at};
pub use view::{SortOrder, StatusFilter, ViewQuery, derive_visible};
