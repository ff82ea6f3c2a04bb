// SPDX-License-Identifier: MPL-2.0

use crate::backend::{Post, RelationshipKind, Social};
use crate::optimistic::{Relationship, RelationshipKey};
use crate::views::RelationshipHost;

/// A list of posts: the home feed or a community's feed.
#[derive(Debug, Default)]
pub struct FeedView {
    posts: Vec<Post>,
}

impl FeedView {
    pub fn new(posts: Vec<Post>) -> Self {
        Self { posts }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post(&self, id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id() == id)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Swap in a fresh fetch. Local state is always re-derived from the server.
    pub fn replace(&mut self, posts: Vec<Post>) {
        self.posts = posts;
    }
}

impl RelationshipHost for FeedView {
    fn relationship(&self, key: &RelationshipKey) -> Option<Relationship> {
        let post = self.post(&key.subject_id)?;
        match key.kind {
            RelationshipKind::Like => Some(Relationship::new(post.is_liked(), post.likes())),
            RelationshipKind::Repost => Some(Relationship::new(post.is_reposted(), post.reposts())),
            RelationshipKind::Membership | RelationshipKind::Follow => None,
        }
    }

    fn set_relationship(&mut self, key: &RelationshipKey, value: Relationship) -> bool {
        let Some(post) = self.posts.iter_mut().find(|p| p.id() == key.subject_id) else {
            return false;
        };
        let engagement = post.engagement_mut();
        match key.kind {
            RelationshipKind::Like => {
                engagement.is_liked = value.active;
                engagement.likes = value.count;
            }
            RelationshipKind::Repost => {
                engagement.is_reposted = value.active;
                engagement.reposts = value.count;
            }
            RelationshipKind::Membership | RelationshipKind::Follow => return false,
        }
        true
    }

    fn remove_subject(&mut self, key: &RelationshipKey) -> bool {
        if !matches!(key.kind, RelationshipKind::Like | RelationshipKind::Repost) {
            return false;
        }
        let before = self.posts.len();
        self.posts.retain(|p| p.id() != key.subject_id);
        self.posts.len() != before
    }
}
