// SPDX-License-Identifier: MPL-2.0

//! Fixtures and an in-memory backend shared by unit tests.

use crate::backend::{
    Authenticator, Author, Catalog, ClientError, Community, Engagement, Notification,
    NotificationKind, PickLeg, PickPost, Post, Profile, RelationshipKind, RelationshipStore,
    Session, TextPost,
};
use crate::optimistic::{ErrorSurface, MutationError, Relationship};
use crate::state::ActorSource;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Semaphore;

fn author() -> Author {
    Author {
        id: "author".into(),
        username: "terrace_talk".into(),
        avatar_url: None,
    }
}

pub fn text_post(id: &str, likes: u32, is_liked: bool) -> Post {
    Post::Text(TextPost {
        id: id.into(),
        author: author(),
        content: "Late winner!".into(),
        image_url: None,
        created_at: Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap(),
        engagement: Engagement {
            likes,
            is_liked,
            ..Engagement::default()
        },
    })
}

pub fn pick_post(id: &str, likes: u32, is_liked: bool) -> Post {
    Post::Pick(PickPost {
        id: id.into(),
        author: author(),
        caption: Some("Lock of the week".into()),
        legs: vec![PickLeg {
            event: "City v United".into(),
            selection: "Over 2.5".into(),
            odds: 1.9,
        }],
        stake: None,
        created_at: Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap(),
        engagement: Engagement {
            likes,
            is_liked,
            ..Engagement::default()
        },
    })
}

pub fn community(id: &str, member_count: u32, is_joined: bool) -> Community {
    Community {
        id: id.into(),
        name: format!("Community {id}"),
        description: None,
        image_url: None,
        member_count,
        is_joined,
    }
}

pub fn profile(id: &str, followers: u32, is_following: bool) -> Profile {
    Profile {
        id: id.into(),
        username: format!("user_{id}"),
        display_name: None,
        avatar_url: None,
        followers,
        following: 0,
        is_following,
    }
}

pub fn notification(id: &str) -> Notification {
    Notification {
        id: id.into(),
        kind: NotificationKind::Like,
        actor_name: Some("someone".into()),
        body: "liked your post".into(),
        created_at: Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap(),
        read: false,
    }
}

pub fn session(user_id: &str) -> Session {
    Session {
        user_id: user_id.into(),
        email: format!("{user_id}@example.test"),
        access_token: "access".into(),
        refresh_token: "refresh".into(),
        expires_at: None,
    }
}

pub struct FixedActor(pub Option<String>);

impl FixedActor {
    pub fn signed_in(id: &str) -> Self {
        Self(Some(id.into()))
    }
}

impl ActorSource for FixedActor {
    fn actor_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Records every error shown.
#[derive(Default)]
pub struct RecordingSurface {
    pub shown: Mutex<Vec<MutationError>>,
}

impl RecordingSurface {
    pub fn shown(&self) -> Vec<MutationError> {
        self.shown.lock().unwrap().clone()
    }
}

impl ErrorSurface for RecordingSurface {
    fn show_error(&self, error: &MutationError) {
        self.shown.lock().unwrap().push(error.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Insert(RelationshipKind, String),
    Delete(RelationshipKind, String),
    SetMembership(String, bool),
}

/// Scripted answer for the next mutation call.
#[derive(Debug, Clone)]
pub enum Reply {
    Ack,
    Canonical(Community),
    Fail(ClientError),
}

/// In-memory backend. Mutations answer from the script, falling back to a
/// plain acknowledgement (or, for membership, the stored community moved
/// toward the requested state).
#[derive(Default)]
pub struct FakeBackend {
    pub replies: Mutex<VecDeque<Reply>>,
    pub calls: Mutex<Vec<Call>>,
    pub feed: Mutex<Vec<Post>>,
    pub communities: Mutex<Vec<Community>>,
    pub profiles: Mutex<Vec<Profile>>,
    pub notifications: Mutex<Vec<Notification>>,
    pub resumed: Mutex<Option<Session>>,
    /// When set, every mutation waits for a permit.
    pub gate: Option<Semaphore>,
}

impl FakeBackend {
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn script(&self, replies: impl IntoIterator<Item = Reply>) {
        self.replies.lock().unwrap().extend(replies);
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn next_reply(&self, call: Call) -> Reply {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.calls.lock().unwrap().push(call);
        self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Ack)
    }
}

#[async_trait]
impl RelationshipStore for FakeBackend {
    async fn insert_relationship(
        &self,
        subject_id: &str,
        _actor_id: &str,
        kind: RelationshipKind,
    ) -> Result<(), ClientError> {
        match self.next_reply(Call::Insert(kind, subject_id.into())).await {
            Reply::Fail(err) => Err(err),
            _ => Ok(()),
        }
    }

    async fn delete_relationship(
        &self,
        subject_id: &str,
        _actor_id: &str,
        kind: RelationshipKind,
    ) -> Result<(), ClientError> {
        match self.next_reply(Call::Delete(kind, subject_id.into())).await {
            Reply::Fail(err) => Err(err),
            _ => Ok(()),
        }
    }

    async fn set_membership(
        &self,
        community_id: &str,
        _actor_id: &str,
        joined: bool,
    ) -> Result<Community, ClientError> {
        match self
            .next_reply(Call::SetMembership(community_id.into(), joined))
            .await
        {
            Reply::Fail(err) => Err(err),
            Reply::Canonical(community) => Ok(community),
            Reply::Ack => {
                let mut communities = self.communities.lock().unwrap();
                let stored = communities
                    .iter_mut()
                    .find(|c| c.id == community_id)
                    .ok_or(ClientError::NotFound)?;
                let moved = Relationship::new(stored.is_joined, stored.member_count).toward(joined);
                stored.is_joined = moved.active;
                stored.member_count = moved.count;
                Ok(stored.clone())
            }
        }
    }
}

#[async_trait]
impl Catalog for FakeBackend {
    async fn fetch_feed(&self, _actor_id: &str, limit: usize) -> Result<Vec<Post>, ClientError> {
        Ok(self.feed.lock().unwrap().iter().take(limit).cloned().collect())
    }

    async fn fetch_communities(&self, _actor_id: &str) -> Result<Vec<Community>, ClientError> {
        Ok(self.communities.lock().unwrap().clone())
    }

    async fn fetch_profile(&self, user_id: &str, _actor_id: &str) -> Result<Profile, ClientError> {
        self.profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == user_id)
            .cloned()
            .ok_or(ClientError::NotFound)
    }

    async fn fetch_notifications(
        &self,
        _actor_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, ClientError> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Authenticator for FakeBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        if password != "correct horse" {
            return Err(ClientError::Auth("Invalid login credentials".into()));
        }
        let user_id = email.split('@').next().unwrap_or(email);
        let session = session(user_id);
        self.resume(&session);
        Ok(session)
    }

    fn resume(&self, session: &Session) {
        *self.resumed.lock().unwrap() = Some(session.clone());
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        self.resumed.lock().unwrap().take();
        Ok(())
    }
}
