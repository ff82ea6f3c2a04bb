// SPDX-License-Identifier: MPL-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decoupled from the auth provider's token payload so we own the API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Which boolean/counter pair a toggle acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Like,
    Repost,
    Membership,
    Follow,
}

impl RelationshipKind {
    /// Human label for the active direction, used in log lines.
    pub fn verb(self, active: bool) -> &'static str {
        match (self, active) {
            (Self::Like, true) => "like",
            (Self::Like, false) => "unlike",
            (Self::Repost, true) => "repost",
            (Self::Repost, false) => "undo repost",
            (Self::Membership, true) => "join",
            (Self::Membership, false) => "leave",
            (Self::Follow, true) => "follow",
            (Self::Follow, false) => "unfollow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Interaction counters and the viewer's own state, shared by every post shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Engagement {
    pub likes: u32,
    pub comments: u32,
    pub reposts: u32,
    pub is_liked: bool,
    pub is_reposted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextPost {
    pub id: String,
    pub author: Author,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub engagement: Engagement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickLeg {
    pub event: String,
    pub selection: String,
    pub odds: f64,
}

/// A shared betting pick. More than one leg makes it a parlay.
#[derive(Debug, Clone, PartialEq)]
pub struct PickPost {
    pub id: String,
    pub author: Author,
    pub caption: Option<String>,
    pub legs: Vec<PickLeg>,
    pub stake: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub engagement: Engagement,
}

impl PickPost {
    pub fn is_parlay(&self) -> bool {
        self.legs.len() > 1
    }

    /// Decimal odds of all legs combined.
    pub fn total_odds(&self) -> f64 {
        self.legs.iter().map(|leg| leg.odds).product()
    }

    pub fn potential_return(&self) -> Option<f64> {
        self.stake.map(|stake| stake * self.total_odds())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Post {
    Text(TextPost),
    Pick(PickPost),
}

/// Capabilities every post shape exposes to interaction code.
pub trait Social {
    fn id(&self) -> &str;
    fn engagement(&self) -> &Engagement;
    fn engagement_mut(&mut self) -> &mut Engagement;

    fn likes(&self) -> u32 {
        self.engagement().likes
    }

    fn comments(&self) -> u32 {
        self.engagement().comments
    }

    fn reposts(&self) -> u32 {
        self.engagement().reposts
    }

    fn is_liked(&self) -> bool {
        self.engagement().is_liked
    }

    fn is_reposted(&self) -> bool {
        self.engagement().is_reposted
    }
}

impl Social for Post {
    fn id(&self) -> &str {
        match self {
            Post::Text(p) => &p.id,
            Post::Pick(p) => &p.id,
        }
    }

    fn engagement(&self) -> &Engagement {
        match self {
            Post::Text(p) => &p.engagement,
            Post::Pick(p) => &p.engagement,
        }
    }

    fn engagement_mut(&mut self) -> &mut Engagement {
        match self {
            Post::Text(p) => &mut p.engagement,
            Post::Pick(p) => &mut p.engagement,
        }
    }
}

impl Post {
    pub fn author(&self) -> &Author {
        match self {
            Post::Text(p) => &p.author,
            Post::Pick(p) => &p.author,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Post::Text(p) => p.created_at,
            Post::Pick(p) => p.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub member_count: u32,
    /// Filled in per viewer, never stored in the communities table.
    #[serde(default)]
    pub is_joined: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub followers: u32,
    pub following: u32,
    pub is_following: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Repost,
    Follow,
    Mention,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    #[serde(default)]
    pub actor_name: Option<String>,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}
