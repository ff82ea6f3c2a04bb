// SPDX-License-Identifier: MPL-2.0

use crate::backend::Session;
use crate::config::APP_ID;
use secret_service::{EncryptionType, SecretService};
use std::sync::RwLock;
use thiserror::Error;

const SECRET_LABEL: &str = "Touchline Session";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("secret service unavailable: {0}")]
    SecretService(String),
    #[error("session not found")]
    NotFound,
    #[error("session expired")]
    Expired,
    #[error("invalid session data: {0}")]
    InvalidData(String),
}

/// Supplies the id of the user performing an action.
pub trait ActorSource: Send + Sync {
    /// `None` when nobody is signed in.
    fn actor_id(&self) -> Option<String>;
}

/// The signed-in session held in memory for the lifetime of the app.
#[derive(Default)]
pub struct SessionState {
    current: RwLock<Option<Session>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, session: Session) {
        *self.current.write().expect("session lock poisoned") = Some(session);
    }

    pub fn clear(&self) -> Option<Session> {
        self.current.write().expect("session lock poisoned").take()
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().expect("session lock poisoned").clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.read().expect("session lock poisoned").is_some()
    }
}

impl ActorSource for SessionState {
    fn actor_id(&self) -> Option<String> {
        self.current
            .read()
            .expect("session lock poisoned")
            .as_ref()
            .map(|s| s.user_id.clone())
    }
}

/// Persists session credentials via libsecret.
pub struct SessionManager;

impl SessionManager {
    pub async fn store(session: &Session) -> Result<(), SessionError> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;
        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        if collection.is_locked().await.unwrap_or(true) {
            collection
                .unlock()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        let session_json =
            serde_json::to_string(session).map_err(|e| SessionError::InvalidData(e.to_string()))?;

        let attributes = vec![("application", APP_ID), ("user", session.user_id.as_str())];

        collection
            .create_item(
                SECRET_LABEL,
                attributes.into_iter().collect(),
                session_json.as_bytes(),
                true, // replace existing
                "text/plain",
            )
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        Ok(())
    }

    pub async fn load() -> Result<Session, SessionError> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;
        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        if collection.is_locked().await.unwrap_or(true) {
            collection
                .unlock()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        let attributes = vec![("application", APP_ID)];
        let items = collection
            .search_items(attributes.into_iter().collect())
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        let item = items.first().ok_or(SessionError::NotFound)?;

        let secret = item
            .get_secret()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        serde_json::from_slice(&secret).map_err(|e| SessionError::InvalidData(e.to_string()))
    }

    pub async fn clear() -> Result<(), SessionError> {
        let ss = SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;
        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        let attributes = vec![("application", APP_ID)];
        let items = collection
            .search_items(attributes.into_iter().collect())
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        for item in items {
            item.delete()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        Ok(())
    }
}
