// SPDX-License-Identifier: MPL-2.0

use crate::backend::store::{Authenticator, Catalog, RelationshipStore};
use crate::backend::types::{
    Author, Community, Engagement, Notification, PickLeg, PickPost, Post, Profile,
    RelationshipKind, Session, TextPost,
};
use crate::config::{
    APP_NAME, COMMUNITIES_TABLE, FOLLOWS_TABLE, LIKES_TABLE, MEMBERS_TABLE, NOTIFICATIONS_TABLE,
    POSTS_TABLE, PROFILES_TABLE, REPOSTS_TABLE, SET_MEMBERSHIP_RPC,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("not authorized: {0}")]
    Unauthorized(String),
    #[error("record not found")]
    NotFound,
    #[error("conflicting change: {0}")]
    Conflict(String),
    #[error("server returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("not authenticated")]
    NotAuthenticated,
}

impl ClientError {
    /// Map a non-success HTTP status to the error the rest of the app understands.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound,
            409 => Self::Conflict(message),
            _ => Self::Http { status, message },
        }
    }

    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Pull a readable message out of a REST or auth error body.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|value| {
        ["message", "msg", "error_description", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(|v| v.as_str()))
            .map(str::to_string)
    });

    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => "no details".to_string(),
        None => body.trim().to_string(),
    }
}

fn relationship_table(kind: RelationshipKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        RelationshipKind::Like => LIKES_TABLE,
        RelationshipKind::Repost => REPOSTS_TABLE,
        RelationshipKind::Membership => MEMBERS_TABLE,
        RelationshipKind::Follow => FOLLOWS_TABLE,
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostRow {
    id: String,
    author_id: String,
    #[serde(default)]
    author_username: Option<String>,
    #[serde(default)]
    author_avatar_url: Option<String>,
    #[serde(default)]
    post_type: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    picks: Option<Vec<PickLeg>>,
    #[serde(default)]
    stake: Option<f64>,
    #[serde(default)]
    likes_count: Option<u32>,
    #[serde(default)]
    comments_count: Option<u32>,
    #[serde(default)]
    reposts_count: Option<u32>,
    created_at: DateTime<Utc>,
}

impl PostRow {
    fn into_post(self, is_liked: bool, is_reposted: bool) -> Post {
        let author = Author {
            username: self
                .author_username
                .unwrap_or_else(|| self.author_id.clone()),
            id: self.author_id,
            avatar_url: self.author_avatar_url,
        };
        let engagement = Engagement {
            likes: self.likes_count.unwrap_or(0),
            comments: self.comments_count.unwrap_or(0),
            reposts: self.reposts_count.unwrap_or(0),
            is_liked,
            is_reposted,
        };
        let legs = self.picks.unwrap_or_default();

        if self.post_type.as_deref() == Some("pick") || !legs.is_empty() {
            Post::Pick(PickPost {
                id: self.id,
                author,
                caption: self.content.filter(|c| !c.is_empty()),
                legs,
                stake: self.stake,
                created_at: self.created_at,
                engagement,
            })
        } else {
            Post::Text(TextPost {
                id: self.id,
                author,
                content: self.content.unwrap_or_default(),
                image_url: self.image_url,
                created_at: self.created_at,
                engagement,
            })
        }
    }
}

#[derive(Deserialize)]
struct ProfileRow {
    id: String,
    username: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    followers_count: Option<u32>,
    #[serde(default)]
    following_count: Option<u32>,
}

/// REST client for the hosted backend (auth + Postgres REST).
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
    token: RwLock<Option<String>>,
}

impl BackendClient {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, ClientError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| ClientError::Config(format!("backend url: {e}")))?;
        // Url::join drops the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            anon_key: anon_key.to_string(),
            token: RwLock::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Config(e.to_string()))
    }

    fn table(&self, table: &str) -> Result<Url, ClientError> {
        self.endpoint(&format!("rest/v1/{table}"))
    }

    /// Filter selecting the single row linking `actor_id` to `subject_id`.
    fn relationship_url(
        &self,
        kind: RelationshipKind,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<Url, ClientError> {
        let (table, subject_col, actor_col) = relationship_table(kind);
        let mut url = self.table(table)?;
        url.query_pairs_mut()
            .append_pair(subject_col, &format!("eq.{subject_id}"))
            .append_pair(actor_col, &format!("eq.{actor_id}"));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self
            .token
            .read()
            .expect("token lock poisoned")
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder.send().await.map_err(ClientError::from_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = ClientError::from_status(status.as_u16(), error_message(&body));
        warn!(status = status.as_u16(), error = %err, "backend request failed");
        Err(err)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        Self::send(self.request(Method::GET, url))
            .await?
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// Existence check for the actor's row, run once per fetched entity.
    async fn has_relationship(
        &self,
        kind: RelationshipKind,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<bool, ClientError> {
        let (_, subject_col, _) = relationship_table(kind);
        let mut url = self.relationship_url(kind, subject_id, actor_id)?;
        url.query_pairs_mut()
            .append_pair("select", subject_col)
            .append_pair("limit", "1");
        let rows: Vec<serde_json::Value> = self.fetch(url).await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl RelationshipStore for BackendClient {
    async fn insert_relationship(
        &self,
        subject_id: &str,
        actor_id: &str,
        kind: RelationshipKind,
    ) -> Result<(), ClientError> {
        let (table, subject_col, actor_col) = relationship_table(kind);
        let url = self.table(table)?;
        let mut row = serde_json::Map::new();
        row.insert(subject_col.to_string(), subject_id.into());
        row.insert(actor_col.to_string(), actor_id.into());

        debug!(table, subject_id, "inserting relationship row");
        Self::send(
            self.request(Method::POST, url)
                .header("Prefer", "resolution=ignore-duplicates,return=minimal")
                .json(&row),
        )
        .await?;
        Ok(())
    }

    async fn delete_relationship(
        &self,
        subject_id: &str,
        actor_id: &str,
        kind: RelationshipKind,
    ) -> Result<(), ClientError> {
        let url = self.relationship_url(kind, subject_id, actor_id)?;

        debug!(?kind, subject_id, "deleting relationship row");
        Self::send(
            self.request(Method::DELETE, url)
                .header("Prefer", "return=minimal"),
        )
        .await?;
        Ok(())
    }

    async fn set_membership(
        &self,
        community_id: &str,
        actor_id: &str,
        joined: bool,
    ) -> Result<Community, ClientError> {
        let url = self.endpoint(&format!("rest/v1/rpc/{SET_MEMBERSHIP_RPC}"))?;
        let body = serde_json::json!({
            "community_id": community_id,
            "user_id": actor_id,
            "joined": joined,
        });

        debug!(community_id, joined, "setting membership");
        Self::send(self.request(Method::POST, url).json(&body))
            .await?
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Catalog for BackendClient {
    async fn fetch_feed(&self, actor_id: &str, limit: usize) -> Result<Vec<Post>, ClientError> {
        let mut url = self.table(POSTS_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc")
            .append_pair("limit", &limit.to_string());
        let rows: Vec<PostRow> = self.fetch(url).await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            let liked = self
                .has_relationship(RelationshipKind::Like, &row.id, actor_id)
                .await?;
            let reposted = self
                .has_relationship(RelationshipKind::Repost, &row.id, actor_id)
                .await?;
            posts.push(row.into_post(liked, reposted));
        }
        Ok(posts)
    }

    async fn fetch_communities(&self, actor_id: &str) -> Result<Vec<Community>, ClientError> {
        let mut url = self.table(COMMUNITIES_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "name.asc");
        let mut communities: Vec<Community> = self.fetch(url).await?;

        for community in &mut communities {
            community.is_joined = self
                .has_relationship(RelationshipKind::Membership, &community.id, actor_id)
                .await?;
        }
        Ok(communities)
    }

    async fn fetch_profile(&self, user_id: &str, actor_id: &str) -> Result<Profile, ClientError> {
        let mut url = self.table(PROFILES_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("id", &format!("eq.{user_id}"));
        let rows: Vec<ProfileRow> = self.fetch(url).await?;
        let row = rows.into_iter().next().ok_or(ClientError::NotFound)?;

        let is_following = if user_id == actor_id {
            false
        } else {
            self.has_relationship(RelationshipKind::Follow, user_id, actor_id)
                .await?
        };

        Ok(Profile {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            followers: row.followers_count.unwrap_or(0),
            following: row.following_count.unwrap_or(0),
            is_following,
        })
    }

    async fn fetch_notifications(
        &self,
        actor_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, ClientError> {
        let mut url = self.table(NOTIFICATIONS_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("user_id", &format!("eq.{actor_id}"))
            .append_pair("order", "created_at.desc")
            .append_pair("limit", &limit.to_string());
        self.fetch(url).await
    }
}

#[async_trait]
impl Authenticator for BackendClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let body = serde_json::json!({ "email": email, "password": password });

        let response = Self::send(
            self.http
                .post(url)
                .header("apikey", &self.anon_key)
                .json(&body),
        )
        .await
        .map_err(|e| match e {
            ClientError::Unauthorized(msg) | ClientError::Http { message: msg, .. } => {
                ClientError::Auth(msg)
            }
            other => other,
        })?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        let session = Session {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.to_string()),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        };
        self.resume(&session);
        Ok(session)
    }

    fn resume(&self, session: &Session) {
        let mut token = self.token.write().expect("token lock poisoned");
        *token = Some(session.access_token.clone());
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        let url = self.endpoint("auth/v1/logout")?;
        let result = Self::send(self.request(Method::POST, url)).await.map(|_| ());
        // The local token is dropped even if the server call fails
        self.token.write().expect("token lock poisoned").take();
        result
    }
}
