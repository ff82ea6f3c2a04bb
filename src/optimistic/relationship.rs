// SPDX-License-Identifier: MPL-2.0

use crate::backend::RelationshipKind;

/// Identifies one toggleable pair inside a view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationshipKey {
    pub kind: RelationshipKind,
    pub subject_id: String,
}

impl RelationshipKey {
    pub fn new(kind: RelationshipKind, subject_id: impl Into<String>) -> Self {
        Self {
            kind,
            subject_id: subject_id.into(),
        }
    }

    pub fn like(post_id: impl Into<String>) -> Self {
        Self::new(RelationshipKind::Like, post_id)
    }

    pub fn repost(post_id: impl Into<String>) -> Self {
        Self::new(RelationshipKind::Repost, post_id)
    }

    pub fn membership(community_id: impl Into<String>) -> Self {
        Self::new(RelationshipKind::Membership, community_id)
    }

    pub fn follow(user_id: impl Into<String>) -> Self {
        Self::new(RelationshipKind::Follow, user_id)
    }
}

/// The displayed state of a relationship and the counter that moves with it.
///
/// Both halves only ever change through [`Relationship::toggled`] or
/// [`Relationship::toward`], so the count can never disagree with the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship {
    pub active: bool,
    pub count: u32,
}

impl Relationship {
    pub fn new(active: bool, count: u32) -> Self {
        Self { active, count }
    }

    /// Flip the state, moving the counter one step with it. Never goes below zero.
    pub fn toggled(self) -> Self {
        if self.active {
            Self {
                active: false,
                count: self.count.saturating_sub(1),
            }
        } else {
            Self {
                active: true,
                count: self.count.saturating_add(1),
            }
        }
    }

    /// Move to `target`, a no-op when already there.
    pub fn toward(self, target: bool) -> Self {
        if self.active == target {
            self
        } else {
            self.toggled()
        }
    }
}

/// A canonical value pushed from outside the toggle path.
///
/// Realtime snapshots carry counts but rarely the viewer's own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub count: u32,
    pub active: Option<bool>,
}

impl Observation {
    pub fn count(count: u32) -> Self {
        Self {
            count,
            active: None,
        }
    }

    pub fn apply(self, to: Relationship) -> Relationship {
        Relationship {
            active: self.active.unwrap_or(to.active),
            count: self.count,
        }
    }
}
