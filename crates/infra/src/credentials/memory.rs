use async_trait::async_trait;
use dashmap::DashMap;
use finsync_core::CredentialStore;
use finsync_domain::{Credential, ProviderId, Result};

/// Process-local store for tests and hosts without a keychain.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    entries: DashMap<ProviderId, Credential>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, provider: ProviderId) -> Result<Option<Credential>> {
        Ok(self.entries.get(&provider).map(|entry| entry.value().clone()))
    }

    async fn set(&self, credential: &Credential) -> Result<()> {
        self.entries.insert(credential.provider_id(), credential.clone());
        Ok(())
    }

    async fn clear(&self, provider: ProviderId) -> Result<()> {
        self.entries.remove(&provider);
        Ok(())
    }
}
