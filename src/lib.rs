//! Terminal task manager backed by a hosted row store.
//!
//! Tasks flow through [`service::TaskService`], which scopes every call to
//! the signed-in [`session::Session`], into a [`store::TaskStore`]: either
//! the hosted [`supabase::SupabaseClient`] or the in-process
//! [`memory::MemoryBackend`]. [`view::TaskListView`] keeps the local copy
//! in step with the results.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod service;
pub mod session;
pub mod store;
pub mod supabase;
pub mod task;
pub mod ui;
pub mod view;

pub use error::{Error, Result};
