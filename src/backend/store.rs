// SPDX-License-Identifier: MPL-2.0

//! Seams between the interaction core and the hosted backend.

use crate::backend::{ClientError, Community, Notification, Post, Profile, RelationshipKind, Session};
use async_trait::async_trait;

/// Row-level relationship mutations.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Create the relationship row. Creating one that already exists is not an error.
    async fn insert_relationship(
        &self,
        subject_id: &str,
        actor_id: &str,
        kind: RelationshipKind,
    ) -> Result<(), ClientError>;

    /// Delete the relationship row. Deleting one that does not exist is not an error.
    async fn delete_relationship(
        &self,
        subject_id: &str,
        actor_id: &str,
        kind: RelationshipKind,
    ) -> Result<(), ClientError>;

    /// Idempotently set membership and return the community with its
    /// authoritative member count.
    async fn set_membership(
        &self,
        community_id: &str,
        actor_id: &str,
        joined: bool,
    ) -> Result<Community, ClientError>;
}

/// Collection fetches. Every fetch fills in the viewer's own relationship flags.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn fetch_feed(&self, actor_id: &str, limit: usize) -> Result<Vec<Post>, ClientError>;

    async fn fetch_communities(&self, actor_id: &str) -> Result<Vec<Community>, ClientError>;

    async fn fetch_profile(&self, user_id: &str, actor_id: &str) -> Result<Profile, ClientError>;

    async fn fetch_notifications(
        &self,
        actor_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, ClientError>;
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ClientError>;

    /// Attach a previously persisted session without a network round trip.
    fn resume(&self, session: &Session);

    async fn sign_out(&self) -> Result<(), ClientError>;
}

/// Everything the application shell needs from a backend.
pub trait Backend: RelationshipStore + Catalog + Authenticator + 'static {}

impl<T> Backend for T where T: RelationshipStore + Catalog + Authenticator + 'static {}
