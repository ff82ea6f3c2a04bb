// SPDX-License-Identifier: MPL-2.0

//! Session-scoped publish/subscribe for confirmed relationship changes.
//!
//! One bus exists per signed-in session. Dropping it at sign-out closes every
//! subscriber's receiver.

use crate::realtime::{Snapshot, SnapshotTarget};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocialEvent {
    FollowChanged {
        user_id: String,
        following: bool,
        followers: u32,
    },
    MembershipChanged {
        community_id: String,
        joined: bool,
        members: u32,
    },
}

impl From<&SocialEvent> for Snapshot {
    fn from(event: &SocialEvent) -> Self {
        match event {
            SocialEvent::FollowChanged {
                user_id,
                following,
                followers,
            } => Snapshot::FollowerCount {
                user_id: user_id.clone(),
                followers: *followers,
                following: Some(*following),
            },
            SocialEvent::MembershipChanged {
                community_id,
                joined,
                members,
            } => Snapshot::CommunityMembers {
                community_id: community_id.clone(),
                members: *members,
                joined: Some(*joined),
            },
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SocialEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns how many subscribers saw the event.
    pub fn publish(&self, event: SocialEvent) -> usize {
        debug!(?event, "publishing social event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SocialEvent> {
        self.tx.subscribe()
    }
}

/// Deliver bus events to a view until the bus closes or the view goes away.
pub async fn forward(mut rx: broadcast::Receiver<SocialEvent>, target: Box<dyn SnapshotTarget>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if !target.deliver(&Snapshot::from(&event)) {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        seen: Arc<Mutex<Vec<Snapshot>>>,
        limit: usize,
    }

    impl SnapshotTarget for Recorder {
        fn deliver(&self, snapshot: &Snapshot) -> bool {
            let mut seen = self.seen.lock().unwrap();
            seen.push(snapshot.clone());
            seen.len() < self.limit
        }
    }

    fn follow(user_id: &str) -> SocialEvent {
        SocialEvent::FollowChanged {
            user_id: user_id.into(),
            following: true,
            followers: 5,
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(follow("u1")), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        assert_eq!(bus.publish(follow("u1")), 1);
        assert_eq!(rx.recv().await.unwrap(), follow("u1"));
    }

    #[tokio::test]
    async fn test_dropping_bus_closes_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        drop(bus);
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_forward_until_closed() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let rx = bus.subscribe();
        bus.publish(follow("u1"));
        bus.publish(SocialEvent::MembershipChanged {
            community_id: "c1".into(),
            joined: false,
            members: 3,
        });
        drop(bus);

        let target = Recorder {
            seen: Arc::clone(&seen),
            limit: usize::MAX,
        };
        forward(rx, Box::new(target)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[1],
            Snapshot::CommunityMembers {
                community_id: "c1".into(),
                members: 3,
                joined: Some(false),
            }
        );
    }

    #[tokio::test]
    async fn test_forward_stops_when_target_gone() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let rx = bus.subscribe();
        bus.publish(follow("u1"));
        bus.publish(follow("u2"));

        let target = Recorder {
            seen: Arc::clone(&seen),
            limit: 1,
        };
        // Bus is still open; forward must return on its own
        forward(rx, Box::new(target)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
