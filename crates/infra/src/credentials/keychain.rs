//! Platform keychain persistence for provider credentials
//!
//! One keychain entry per provider under a shared service name; the secret is
//! the credential serialized as JSON. Keyring calls block, so they run on the
//! blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use finsync_core::CredentialStore;
use finsync_domain::{Credential, FinSyncError, ProviderId, Result};
use keyring::Entry;
use tracing::{debug, warn};

use crate::errors::InfraError;

pub const DEFAULT_SERVICE: &str = "com.finsync.credentials";

pub struct KeychainCredentialStore {
    service: String,
    entries: DashMap<ProviderId, Arc<Entry>>,
}

impl Default for KeychainCredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

impl KeychainCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into(), entries: DashMap::new() }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, provider: ProviderId) -> Result<Arc<Entry>> {
        if let Some(entry) = self.entries.get(&provider) {
            return Ok(Arc::clone(entry.value()));
        }
        let entry = Arc::new(
            Entry::new(&self.service, &provider.to_string())
                .map_err(|e| FinSyncError::from(InfraError::from(e)))?,
        );
        Ok(Arc::clone(self.entries.entry(provider).or_insert(entry).value()))
    }
}

async fn blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| FinSyncError::Internal(format!("keychain task failed: {e}")))?
}

#[async_trait]
impl CredentialStore for KeychainCredentialStore {
    async fn get(&self, provider: ProviderId) -> Result<Option<Credential>> {
        let entry = self.entry(provider)?;
        let secret = blocking(move || match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        })
        .await?;

        let Some(secret) = secret else {
            return Ok(None);
        };
        let credential: Credential = serde_json::from_str(&secret).map_err(|e| {
            warn!(%provider, "stored credential is unreadable");
            FinSyncError::Storage(format!("stored credential for {provider} is corrupt: {e}"))
        })?;
        if credential.provider_id() != provider {
            return Err(FinSyncError::Storage(format!(
                "keychain entry for {provider} holds a {} credential",
                credential.provider_id()
            )));
        }
        Ok(Some(credential))
    }

    async fn set(&self, credential: &Credential) -> Result<()> {
        let provider = credential.provider_id();
        let secret = serde_json::to_string(credential)
            .map_err(|e| FinSyncError::Storage(format!("cannot serialize credential: {e}")))?;
        let entry = self.entry(provider)?;

        blocking(move || entry.set_password(&secret).map_err(|e| InfraError::from(e).into()))
            .await?;
        debug!(%provider, "credential stored in keychain");
        Ok(())
    }

    async fn clear(&self, provider: ProviderId) -> Result<()> {
        let entry = self.entry(provider)?;
        blocking(move || match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(InfraError::from(e).into()),
        })
        .await?;
        debug!(%provider, "credential removed from keychain");
        Ok(())
    }
}
