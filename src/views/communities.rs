// SPDX-License-Identifier: MPL-2.0

use crate::backend::{Community, RelationshipKind};
use crate::optimistic::{Relationship, RelationshipKey};
use crate::views::RelationshipHost;

#[derive(Debug, Default)]
pub struct CommunitiesView {
    communities: Vec<Community>,
}

impl CommunitiesView {
    pub fn new(communities: Vec<Community>) -> Self {
        Self { communities }
    }

    pub fn communities(&self) -> &[Community] {
        &self.communities
    }

    pub fn community(&self, id: &str) -> Option<&Community> {
        self.communities.iter().find(|c| c.id == id)
    }

    pub fn joined(&self) -> impl Iterator<Item = &Community> {
        self.communities.iter().filter(|c| c.is_joined)
    }
}

impl RelationshipHost for CommunitiesView {
    fn relationship(&self, key: &RelationshipKey) -> Option<Relationship> {
        if key.kind != RelationshipKind::Membership {
            return None;
        }
        self.community(&key.subject_id)
            .map(|c| Relationship::new(c.is_joined, c.member_count))
    }

    fn set_relationship(&mut self, key: &RelationshipKey, value: Relationship) -> bool {
        if key.kind != RelationshipKind::Membership {
            return false;
        }
        match self.communities.iter_mut().find(|c| c.id == key.subject_id) {
            Some(community) => {
                community.is_joined = value.active;
                community.member_count = value.count;
                true
            }
            None => false,
        }
    }

    fn remove_subject(&mut self, key: &RelationshipKey) -> bool {
        if key.kind != RelationshipKind::Membership {
            return false;
        }
        let before = self.communities.len();
        self.communities.retain(|c| c.id != key.subject_id);
        self.communities.len() != before
    }
}
