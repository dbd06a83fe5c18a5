//! Session credential management.
//!
//! This module holds the token material of the current authenticated session
//! and persists it so that a restart does not force a new login.
//!
//! # Architecture
//!
//! - [`Credential`]: Access token, refresh token, expiry and role names
//! - [`CredentialStorage`]: Durable backend ([`FileStorage`], [`MemoryStorage`])
//! - [`CredentialStore`]: Thread-safe front door; `clear` also redirects to login
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::{Duration, Utc};
//! use water_portal_gateway::navigation::RecordingNavigator;
//! use water_portal_gateway::session::{Credential, CredentialStore, MemoryStorage};
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = CredentialStore::open(
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(RecordingNavigator::new()),
//! )
//! .await
//! .unwrap();
//!
//! let expires = Utc::now() + Duration::hours(1);
//! store.set(Credential::new("access", "refresh", expires, ["Admin"])).await.unwrap();
//! assert!(store.get().await.unwrap().is_some());
//! # });
//! # }
//! ```

mod credential;
mod storage;
mod store;

pub use credential::{Credential, bearer_header, parse_expiration};
pub(crate) use credential::deserialize_expiration;
pub use storage::{CredentialStorage, FileStorage, MemoryStorage, StorageError};
pub use store::CredentialStore;
