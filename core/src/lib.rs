//! Domain core for the todo service.
//!
//! # Overview
//! Everything here is pure: no I/O, no clocks. Operations that depend on the
//! current time take `now` explicitly, which keeps derived fields and
//! statistics deterministic under test.
//!
//! # Design
//! - `types` holds the stored `Todo`, its derived accessors and the
//!   `TodoView` response shape.
//! - `validate` turns loose request payloads into normalised values or a
//!   list of field errors.
//! - `query` builds predicates from optional filters, orders and windows
//!   results, and folds per-owner statistics in one pass.

pub mod error;
pub mod query;
pub mod types;
pub mod validate;

pub use error::{FieldError, FieldLocation, InvalidPermission, InvalidPriority, ValidationError};
pub use query::{
    ListParams, Page, Pagination, SortOrder, TodoFilters, TodoPredicate, TodoQuery, TodoStatistics,
};
pub use types::{
    Attachment, Note, Permission, Priority, SharedUser, SharedWith, SharedWithView, Todo,
    TodoStatus, TodoView, User, UserProfile,
};
pub use validate::{
    AddNote, CreateTodo, NewTodo, NewUser, RegisterUser, ShareTodo, TodoChanges, UpdateTodo,
};
