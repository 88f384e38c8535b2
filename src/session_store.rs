use crate::models::{ApplicantProfile, PaymentAttempt, RawProfile};
use async_trait::async_trait;
use moka::future::Cache;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Key the applicant profile document is stored under.
pub const PROFILE_KEY: &str = "myLoan";

/// Key of the till payment waiting for the applicant's report.
pub const PENDING_PAYMENT_KEY: &str = "pendingPayment";

/// Opaque identifier of one browsing session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Mints a fresh random session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session-scoped key-value storage.
///
/// Values written under one session are never visible from another.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get(&self, session: &SessionId, key: &str) -> Option<String>;
    async fn set(&self, session: &SessionId, key: &str, value: String);
    async fn remove(&self, session: &SessionId, key: &str);
}

fn storage_key(session: &SessionId, key: &str) -> String {
    format!("{}:{}", session, key)
}

/// Session storage backed by a moka cache.
///
/// Entries expire after the session has been idle for the configured TTL,
/// so an abandoned application does not outlive its session.
#[derive(Clone)]
pub struct MokaSessionStorage {
    cache: Cache<String, String>,
}

impl MokaSessionStorage {
    pub fn new(idle_ttl: Duration, max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_idle(idle_ttl)
                .max_capacity(max_capacity)
                .build(),
        }
    }
}

#[async_trait]
impl SessionStorage for MokaSessionStorage {
    async fn get(&self, session: &SessionId, key: &str) -> Option<String> {
        self.cache.get(&storage_key(session, key)).await
    }

    async fn set(&self, session: &SessionId, key: &str, value: String) {
        self.cache.insert(storage_key(session, key), value).await;
    }

    async fn remove(&self, session: &SessionId, key: &str) {
        self.cache.invalidate(&storage_key(session, key)).await;
    }
}

/// A thread-safe in-memory session storage without expiry.
///
/// Ideal for tests, where entries must stay put for the whole scenario.
#[derive(Default, Clone)]
pub struct InMemorySessionStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn get(&self, session: &SessionId, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries.get(&storage_key(session, key)).cloned()
    }

    async fn set(&self, session: &SessionId, key: &str, value: String) {
        let mut entries = self.entries.write().await;
        entries.insert(storage_key(session, key), value);
    }

    async fn remove(&self, session: &SessionId, key: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(&storage_key(session, key));
    }
}

/// The applicant profile of one session.
///
/// Eligibility writes it, the application step only reads it, and a
/// completed payment clears it.
#[derive(Clone)]
pub struct ProfileStore {
    storage: Arc<dyn SessionStorage>,
    session: SessionId,
}

impl ProfileStore {
    pub fn new(storage: Arc<dyn SessionStorage>, session: SessionId) -> Self {
        Self { storage, session }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Persists a validated profile, replacing any previous one.
    pub async fn save(&self, profile: &ApplicantProfile) {
        match serde_json::to_string(profile) {
            Ok(document) => {
                self.storage.set(&self.session, PROFILE_KEY, document).await;
                tracing::debug!("Profile saved for session {}", self.session);
            }
            Err(e) => {
                // Serializing plain strings cannot fail in practice.
                tracing::error!("Failed to serialize applicant profile: {}", e);
            }
        }
    }

    /// Reads the stored document without validating it.
    ///
    /// A document that is not valid JSON of the expected shape is reported
    /// as absent.
    pub async fn load(&self) -> Option<RawProfile> {
        let document = self.storage.get(&self.session, PROFILE_KEY).await?;
        match serde_json::from_str::<RawProfile>(&document) {
            Ok(raw) => Some(raw),
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable profile document for session {}: {}",
                    self.session,
                    e
                );
                None
            }
        }
    }

    /// Remembers a till payment until the applicant reports it, replacing
    /// any earlier one.
    pub async fn save_pending_payment(&self, attempt: &PaymentAttempt) {
        match serde_json::to_string(attempt) {
            Ok(document) => {
                self.storage
                    .set(&self.session, PENDING_PAYMENT_KEY, document)
                    .await;
            }
            Err(e) => tracing::error!("Failed to serialize payment {}: {}", attempt.reference, e),
        }
    }

    pub async fn load_pending_payment(&self) -> Option<PaymentAttempt> {
        let document = self.storage.get(&self.session, PENDING_PAYMENT_KEY).await?;
        serde_json::from_str(&document)
            .map_err(|e| {
                tracing::warn!(
                    "Ignoring unreadable pending payment for session {}: {}",
                    self.session,
                    e
                )
            })
            .ok()
    }

    /// Removes the stored profile and any pending till payment.
    pub async fn clear(&self) {
        self.storage.remove(&self.session, PROFILE_KEY).await;
        self.storage.remove(&self.session, PENDING_PAYMENT_KEY).await;
        tracing::debug!("Profile cleared for session {}", self.session);
    }
}
