use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use crate::{ClientOptions, MsoClient, MsoError, Platform, Result};

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct ClientKey {
    base_url: String,
    username: String,
    platform: Platform,
    domain: Option<String>,
}

/// Shared [`MsoClient`] instances keyed by connection identity.
///
/// The identity is the base URL, username, platform and login domain. Asking
/// for an existing identity with identical options returns the same client;
/// asking with different options fails with [`MsoError::Config`] instead of
/// silently handing back a client configured differently.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientKey, Arc<MsoClient>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry, created on first use.
    pub fn global() -> &'static ClientRegistry {
        static GLOBAL: OnceLock<ClientRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ClientRegistry::new)
    }

    /// Returns the client registered for this identity, creating it if absent.
    pub fn get_or_create(
        &self,
        base_url: impl AsRef<str>,
        username: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Arc<MsoClient>> {
        let base_url = base_url.as_ref().trim();
        let username = username.into();
        let key = ClientKey {
            base_url: base_url.to_owned(),
            username: username.clone(),
            platform: options.platform,
            domain: options.domain.clone(),
        };

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = clients.get(&key) {
            if existing.options() != &options {
                return Err(MsoError::Config(format!(
                    "a client for {username}@{base_url} is already registered with different options"
                )));
            }
            return Ok(Arc::clone(existing));
        }

        let client = Arc::new(MsoClient::new(base_url, username, options)?);
        tracing::debug!(base_url, platform = %key.platform, "registered mso client");
        clients.insert(key, Arc::clone(&client));
        Ok(client)
    }

    /// Drops the client registered for this identity, if any.
    pub fn remove(
        &self,
        base_url: &str,
        username: &str,
        platform: Platform,
        domain: Option<&str>,
    ) -> Option<Arc<MsoClient>> {
        let key = ClientKey {
            base_url: base_url.trim().to_owned(),
            username: username.to_owned(),
            platform,
            domain: domain.map(str::to_owned),
        };
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
    }

    pub fn len(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
