// SPDX-License-Identifier: MPL-2.0

use crate::backend::{Profile, RelationshipKind};
use crate::optimistic::{Relationship, RelationshipKey};
use crate::views::RelationshipHost;

/// Another user's profile page. `None` once the profile is gone.
#[derive(Debug, Default)]
pub struct ProfileView {
    profile: Option<Profile>,
}

impl ProfileView {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile: Some(profile),
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    fn shown(&self, key: &RelationshipKey) -> Option<&Profile> {
        if key.kind != RelationshipKind::Follow {
            return None;
        }
        self.profile.as_ref().filter(|p| p.id == key.subject_id)
    }
}

impl RelationshipHost for ProfileView {
    fn relationship(&self, key: &RelationshipKey) -> Option<Relationship> {
        self.shown(key)
            .map(|p| Relationship::new(p.is_following, p.followers))
    }

    fn set_relationship(&mut self, key: &RelationshipKey, value: Relationship) -> bool {
        if self.shown(key).is_none() {
            return false;
        }
        if let Some(profile) = self.profile.as_mut() {
            profile.is_following = value.active;
            profile.followers = value.count;
        }
        true
    }

    fn remove_subject(&mut self, key: &RelationshipKey) -> bool {
        if self.shown(key).is_none() {
            return false;
        }
        self.profile = None;
        true
    }
}
