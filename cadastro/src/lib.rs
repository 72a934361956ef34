pub mod app;
pub mod auth;
pub mod client;
pub mod error;
pub mod notice;
pub mod query;
pub mod resources;
pub mod routes;
pub mod session;
pub mod storage;
pub mod views;

pub use app::{Console, Page};
pub use client::{ApiClient, ClientConfig};
pub use error::{Error, Result, GENERIC_ERROR_MESSAGE};
pub use notice::{Notice, NoticeLevel, Notifier};
pub use resources::{Contacts, Partition, RecordId, Resource, ResourceKind, Types, Users};
pub use routes::{GuardOutcome, Route};
pub use session::{AuthState, Session};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, carrying on with the inner value if a previous holder panicked.
///
/// Everything behind these locks is a plain value that is always overwritten whole, so a
/// poisoned lock never holds a half-written state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
