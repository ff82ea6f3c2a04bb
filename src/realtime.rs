// SPDX-License-Identifier: MPL-2.0

//! Canonical snapshots pushed by the backend's realtime channel.
//!
//! The socket itself belongs to whoever decodes the stream; this module only
//! routes already-decoded snapshots into live views.

use crate::backend::{Notification, RelationshipStore};
use crate::optimistic::{Coordinator, Observation, RelationshipKey};
use crate::views::{NotificationsView, RelationshipHost, WeakView};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    PostCounts {
        post_id: String,
        likes: u32,
        reposts: u32,
    },
    CommunityMembers {
        community_id: String,
        members: u32,
        /// Present only when the change came from this session
        joined: Option<bool>,
    },
    FollowerCount {
        user_id: String,
        followers: u32,
        following: Option<bool>,
    },
    Notification(Notification),
}

impl Snapshot {
    /// Relationship values carried by this snapshot.
    pub fn observations(&self) -> Vec<(RelationshipKey, Observation)> {
        match self {
            Snapshot::PostCounts {
                post_id,
                likes,
                reposts,
            } => vec![
                (RelationshipKey::like(post_id.as_str()), Observation::count(*likes)),
                (RelationshipKey::repost(post_id.as_str()), Observation::count(*reposts)),
            ],
            Snapshot::CommunityMembers {
                community_id,
                members,
                joined,
            } => vec![(
                RelationshipKey::membership(community_id.as_str()),
                Observation {
                    count: *members,
                    active: *joined,
                },
            )],
            Snapshot::FollowerCount {
                user_id,
                followers,
                following,
            } => vec![(
                RelationshipKey::follow(user_id.as_str()),
                Observation {
                    count: *followers,
                    active: *following,
                },
            )],
            Snapshot::Notification(_) => Vec::new(),
        }
    }
}

/// Something that wants snapshots. Returns false once it is gone for good.
pub trait SnapshotTarget: Send + Sync {
    fn deliver(&self, snapshot: &Snapshot) -> bool;
}

/// A view whose counters are refreshed through the coordinator, so pushes
/// compose with toggles still in flight. Goes away with the session that
/// owns the coordinator.
pub struct CoordinatedView<S: ?Sized, V> {
    coordinator: Weak<Coordinator<S>>,
    view: WeakView<V>,
}

impl<S: ?Sized, V> CoordinatedView<S, V> {
    pub fn new(coordinator: &Arc<Coordinator<S>>, view: WeakView<V>) -> Self {
        Self {
            coordinator: Arc::downgrade(coordinator),
            view,
        }
    }
}

impl<S, V> SnapshotTarget for CoordinatedView<S, V>
where
    S: RelationshipStore + ?Sized,
    V: RelationshipHost,
{
    fn deliver(&self, snapshot: &Snapshot) -> bool {
        let (Some(coordinator), Some(view)) = (self.coordinator.upgrade(), self.view.upgrade())
        else {
            return false;
        };
        for (key, observation) in snapshot.observations() {
            coordinator.observe(&view, &key, observation);
        }
        true
    }
}

impl SnapshotTarget for WeakView<NotificationsView> {
    fn deliver(&self, snapshot: &Snapshot) -> bool {
        let Some(view) = self.upgrade() else {
            return false;
        };
        if let Snapshot::Notification(notification) = snapshot {
            view.update(|v| v.push(notification.clone()));
        }
        true
    }
}

/// Drain the stream into `targets`. Returns the number of snapshots handled,
/// stopping early once every target is gone.
pub async fn pump(mut rx: mpsc::Receiver<Snapshot>, mut targets: Vec<Box<dyn SnapshotTarget>>) -> usize {
    let mut handled = 0;
    while !targets.is_empty() {
        let Some(snapshot) = rx.recv().await else {
            break;
        };
        targets.retain(|target| target.deliver(&snapshot));
        handled += 1;
    }
    debug!(handled, "realtime pump finished");
    handled
}
