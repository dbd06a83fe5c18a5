//! Single source of truth for the session's token material.

use std::sync::Arc;

use reqwest::header::HeaderValue;
use tokio::sync::{Mutex, RwLock};

use super::credential::Credential;
use super::storage::{CredentialStorage, StorageError};
use crate::navigation::{Navigator, Route};

/// Credential store.
///
/// Reads always go to the storage backend, so two stores over the same file
/// agree with each other. Alongside the persisted record the store keeps the
/// default `Authorization` header used by outgoing requests.
///
/// This is a convenience cache, not a security boundary: nothing is encrypted
/// and the backend remains the only authority on whether a token is valid.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    storage: Arc<dyn CredentialStorage>,
    navigator: Arc<dyn Navigator>,
    default_header: RwLock<Option<HeaderValue>>,
    // Serializes set/clear so header and record change together.
    write_lock: Mutex<()>,
}

impl CredentialStore {
    /// Open a store and prime the default header from already persisted state.
    pub async fn open(
        storage: Arc<dyn CredentialStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, StorageError> {
        // A corrupt record is left for the gateway to discard on first use.
        let header = match storage.load().await {
            Ok(credential) => credential.and_then(|credential| credential.authorization()),
            Err(StorageError::Corrupt(e)) => {
                tracing::warn!(
                    name: "session.record.corrupt",
                    error = %e,
                    "Persisted credential is unreadable"
                );
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            inner: Arc::new(StoreInner {
                storage,
                navigator,
                default_header: RwLock::new(header),
                write_lock: Mutex::new(()),
            }),
        })
    }

    /// Current credential, if any.
    pub async fn get(&self) -> Result<Option<Credential>, StorageError> {
        self.inner.storage.load().await
    }

    /// Persist `credential` as a whole and point the default header at it.
    pub async fn set(&self, credential: Credential) -> Result<(), StorageError> {
        let _guard = self.inner.write_lock.lock().await;
        self.inner.storage.save(&credential).await?;

        let header = credential.authorization();
        if header.is_none() {
            tracing::warn!(
                name: "session.header.invalid",
                "Access token cannot be carried in a header; default header removed"
            );
        }
        *self.inner.default_header.write().await = header;

        tracing::debug!(
            name: "session.credential.stored",
            expires_at = %credential.expires_at,
            role_count = credential.roles.len(),
            "Credential stored"
        );
        Ok(())
    }

    /// Forget the session and send the user to the login route.
    ///
    /// The redirect happens even when the backend fails to delete the record;
    /// that failure is still returned.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.inner.write_lock.lock().await;
        self.inner.default_header.write().await.take();
        let removed = self.inner.storage.remove().await;

        tracing::info!(name: "session.cleared", "Session credential cleared");
        self.inner.navigator.navigate(Route::Login);
        removed
    }

    /// Default `Authorization` header, present while a credential is stored.
    pub async fn authorization_header(&self) -> Option<HeaderValue> {
        self.inner.default_header.read().await.clone()
    }

    /// Navigator shared with the gateway.
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.inner.navigator
    }
}
