// SPDX-License-Identifier: MPL-2.0

//! Optimistic toggles with remote reconciliation and rollback.
//!
//! Every toggle lives in a *lane*, one per (view, relationship key). A lane
//! keeps the last confirmed pair (the baseline) and the toggles still in
//! flight, each stamped with a sequence number. What the view shows is always
//! the baseline with the pending toggles replayed on top:
//!
//! * a success moves the baseline, unless a newer toggle already did, and
//!   retires every older toggle still in flight;
//! * a failure leaves the baseline alone, so dropping the toggle from the
//!   pending list restores exactly the pair the user saw before tapping;
//! * a canonical entity from the server replaces the baseline outright;
//! * a bare count pushed while toggles are in flight is taken to include
//!   them, and a toggle that later fails hands its share back.
//!
//! Lanes exist only while something is in flight.

use crate::backend::{ClientError, RelationshipKind, RelationshipStore};
use crate::events::{EventBus, SocialEvent};
use crate::optimistic::{ErrorSurface, MutationError, Observation, Relationship, RelationshipKey};
use crate::state::ActorSource;
use crate::views::{RelationshipHost, ViewHandle, ViewId, WeakView};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Asks the user before a destructive membership change.
#[async_trait]
pub trait ConfirmLeave: Send + Sync {
    async fn confirm_leave(&self, community_id: &str) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct PendingOp {
    seq: u64,
    target: bool,
    /// Counter movement credited to this toggle by the last bare count
    assumed: i64,
}

#[derive(Debug)]
struct Lane {
    baseline: Relationship,
    pending: Vec<PendingOp>,
    next_seq: u64,
    /// Sequence number of the newest confirmation folded into the baseline
    applied_seq: u64,
}

impl Lane {
    fn new(baseline: Relationship) -> Self {
        Self {
            baseline,
            pending: Vec::new(),
            next_seq: 1,
            applied_seq: 0,
        }
    }

    /// Baseline plus every pending toggle newer than the last confirmation.
    /// Older ones were superseded by that confirmation.
    fn display(&self) -> Relationship {
        self.pending
            .iter()
            .filter(|op| op.seq > self.applied_seq)
            .fold(self.baseline, |shown, op| shown.toward(op.target))
    }

    fn push(&mut self) -> PendingOp {
        let op = PendingOp {
            seq: self.next_seq,
            target: !self.display().active,
            assumed: 0,
        };
        self.next_seq += 1;
        self.pending.push(op);
        op
    }

    fn take(&mut self, seq: u64) -> Option<PendingOp> {
        let idx = self.pending.iter().position(|op| op.seq == seq)?;
        Some(self.pending.remove(idx))
    }

    /// Returns true if the confirmation was newer than anything applied so far.
    fn confirm(&mut self, seq: u64, canonical: Option<Relationship>) -> bool {
        let Some(op) = self.take(seq) else {
            return false;
        };
        if seq <= self.applied_seq {
            return false;
        }
        self.applied_seq = seq;
        match canonical {
            Some(canonical) => self.rebase(canonical),
            None => self.baseline = self.baseline.toward(op.target),
        }
        true
    }

    fn reject(&mut self, seq: u64) {
        let Some(op) = self.take(seq) else {
            return;
        };
        if op.seq > self.applied_seq && op.assumed != 0 {
            self.baseline.count = shift(self.baseline.count, op.assumed);
        }
    }

    /// Adopt a full server pair as the new baseline.
    fn rebase(&mut self, truth: Relationship) {
        self.baseline = truth;
        for op in &mut self.pending {
            op.assumed = 0;
        }
    }

    fn observe(&mut self, observation: Observation) {
        match observation.active {
            Some(active) => self.rebase(Relationship::new(active, observation.count)),
            None => self.observe_count(observation.count),
        }
    }

    /// The count already reflects every live toggle, so the baseline is
    /// whatever that count minus their movement leaves.
    fn observe_count(&mut self, count: u32) {
        let applied = self.applied_seq;
        let mut shown = self.baseline;
        for op in &mut self.pending {
            if op.seq <= applied {
                op.assumed = 0;
                continue;
            }
            let next = shown.toward(op.target);
            op.assumed = i64::from(next.count) - i64::from(shown.count);
            shown = next;
        }
        let offset = i64::from(shown.count) - i64::from(self.baseline.count);
        self.baseline.count = shift(count, -offset);
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

fn shift(count: u32, by: i64) -> u32 {
    (i64::from(count) + by).clamp(0, i64::from(u32::MAX)) as u32
}

type LaneKey = (ViewId, RelationshipKey);

/// Step 1 has been applied; the remote half is still to run.
#[must_use = "a pending toggle must be settled or the view keeps its unconfirmed state"]
pub struct Pending<V> {
    view: WeakView<V>,
    key: RelationshipKey,
    actor_id: String,
    seq: u64,
    target: bool,
    optimistic: Relationship,
}

impl<V> Pending<V> {
    pub fn key(&self) -> &RelationshipKey {
        &self.key
    }

    /// The state being requested from the server.
    pub fn target(&self) -> bool {
        self.target
    }

    /// The pair written to the view by step 1.
    pub fn optimistic(&self) -> Relationship {
        self.optimistic
    }
}

struct Settled<R> {
    outcome: R,
    display: Relationship,
    baseline: Relationship,
    /// Whether the view was still mounted and received the result
    mounted: bool,
}

pub struct Coordinator<S: ?Sized> {
    store: Arc<S>,
    actor: Arc<dyn ActorSource>,
    surface: Arc<dyn ErrorSurface>,
    events: EventBus,
    lanes: Mutex<HashMap<LaneKey, Lane>>,
}

impl<S: RelationshipStore + ?Sized> Coordinator<S> {
    pub fn new(
        store: Arc<S>,
        actor: Arc<dyn ActorSource>,
        surface: Arc<dyn ErrorSurface>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            actor,
            surface,
            events,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn lanes(&self) -> MutexGuard<'_, HashMap<LaneKey, Lane>> {
        self.lanes.lock().expect("lane lock poisoned")
    }

    /// Number of toggles still waiting on the server, across all views.
    pub fn in_flight(&self) -> usize {
        self.lanes().values().map(|lane| lane.pending.len()).sum()
    }

    /// The pair currently shown for `key`, including unconfirmed toggles.
    pub fn displayed<V: RelationshipHost>(
        &self,
        view: &ViewHandle<V>,
        key: &RelationshipKey,
    ) -> Option<Relationship> {
        let lanes = self.lanes();
        match lanes.get(&(view.id(), key.clone())) {
            Some(lane) => Some(lane.display()),
            None => view.read(|v| v.relationship(key)),
        }
    }

    /// Toggle `key` in `view`: optimistic flip, remote call, reconcile.
    pub async fn toggle<V: RelationshipHost>(
        &self,
        view: &ViewHandle<V>,
        key: RelationshipKey,
    ) -> Result<Relationship, MutationError> {
        let pending = self.begin(view, key)?;
        self.settle(pending).await
    }

    /// Step 1. Synchronous; the view shows the new pair when this returns.
    pub fn begin<V: RelationshipHost>(
        &self,
        view: &ViewHandle<V>,
        key: RelationshipKey,
    ) -> Result<Pending<V>, MutationError> {
        let actor_id = self.actor.actor_id().ok_or(MutationError::Unauthorized)?;

        // Lock order is lanes, then view
        let mut lanes = self.lanes();
        let lane_key = (view.id(), key.clone());
        let lane = match lanes.entry(lane_key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let current = view
                    .read(|v| v.relationship(&key))
                    .ok_or(MutationError::NotFound)?;
                entry.insert(Lane::new(current))
            }
        };
        let op = lane.push();
        let optimistic = lane.display();
        view.update(|v| v.set_relationship(&key, optimistic));
        drop(lanes);

        debug!(
            action = key.kind.verb(op.target),
            subject = %key.subject_id,
            seq = op.seq,
            count = optimistic.count,
            "optimistic toggle applied"
        );

        Ok(Pending {
            view: view.downgrade(),
            key,
            actor_id,
            seq: op.seq,
            target: op.target,
            optimistic,
        })
    }

    /// Step 2. The only suspension point of a toggle.
    pub async fn settle<V: RelationshipHost>(
        &self,
        pending: Pending<V>,
    ) -> Result<Relationship, MutationError> {
        let Pending {
            view,
            key,
            actor_id,
            seq,
            target,
            optimistic,
        } = pending;

        match self.remote(&key, &actor_id, target).await {
            Ok(canonical) => {
                let Some(settled) =
                    self.reconcile(&view, &key, |lane| lane.confirm(seq, canonical), false)
                else {
                    return Ok(canonical.unwrap_or(optimistic));
                };
                if settled.outcome {
                    self.announce(&key, settled.baseline);
                } else {
                    debug!(subject = %key.subject_id, seq, "stale confirmation discarded");
                }
                Ok(settled.display)
            }
            Err(err) => {
                let err = MutationError::from(err);
                warn!(
                    action = key.kind.verb(target),
                    subject = %key.subject_id,
                    seq,
                    error = %err,
                    "toggle failed, rolling back"
                );
                let mounted = self
                    .reconcile(&view, &key, |lane| lane.reject(seq), err.removes_subject())
                    .is_some_and(|settled| settled.mounted);
                if mounted {
                    self.surface.show_error(&err);
                } else {
                    info!(subject = %key.subject_id, "view gone, failure not shown");
                }
                Err(err)
            }
        }
    }

    /// Membership toggle that asks before leaving.
    ///
    /// Returns `Ok(None)` when the user declines the prompt.
    pub async fn join_or_leave<V, C>(
        &self,
        view: &ViewHandle<V>,
        community_id: &str,
        confirm: &C,
    ) -> Result<Option<Relationship>, MutationError>
    where
        V: RelationshipHost,
        C: ConfirmLeave + ?Sized,
    {
        if self.actor.actor_id().is_none() {
            return Err(MutationError::Unauthorized);
        }
        let key = RelationshipKey::membership(community_id);
        let current = self
            .displayed(view, &key)
            .ok_or(MutationError::NotFound)?;

        if current.active {
            if !confirm.confirm_leave(community_id).await {
                info!(community_id, "leave cancelled");
                return Ok(None);
            }
            // Another toggle may have landed while the prompt was open
            if self.displayed(view, &key).is_none_or(|now| !now.active) {
                info!(community_id, "already left, nothing to confirm");
                return Ok(None);
            }
        }

        self.toggle(view, key).await.map(Some)
    }

    /// Fold a canonical value pushed from outside the toggle path into `view`.
    pub fn observe<V: RelationshipHost>(
        &self,
        view: &ViewHandle<V>,
        key: &RelationshipKey,
        observation: Observation,
    ) -> bool {
        let mut lanes = self.lanes();
        let shown = match lanes.get_mut(&(view.id(), key.clone())) {
            Some(lane) => {
                lane.observe(observation);
                lane.display()
            }
            None => match view.read(|v| v.relationship(key)) {
                Some(current) => observation.apply(current),
                None => return false,
            },
        };
        if view.read(|v| v.relationship(key)) == Some(shown) {
            return true;
        }
        view.update(|v| v.set_relationship(key, shown))
    }

    /// Swap freshly fetched state into `view`. Toggles still in flight are
    /// replayed on top of the fetched pairs.
    pub fn rebase<V, R>(&self, view: &ViewHandle<V>, f: impl FnOnce(&mut V) -> R) -> R
    where
        V: RelationshipHost,
    {
        let view_id = view.id();
        let mut lanes = self.lanes();
        view.update(|v| {
            let result = f(v);
            for ((id, key), lane) in lanes.iter_mut() {
                if *id != view_id {
                    continue;
                }
                if let Some(fetched) = v.relationship(key) {
                    lane.rebase(fetched);
                    v.set_relationship(key, lane.display());
                }
            }
            result
        })
    }

    async fn remote(
        &self,
        key: &RelationshipKey,
        actor_id: &str,
        target: bool,
    ) -> Result<Option<Relationship>, ClientError> {
        match key.kind {
            RelationshipKind::Membership => {
                let community = self
                    .store
                    .set_membership(&key.subject_id, actor_id, target)
                    .await?;
                Ok(Some(Relationship::new(
                    community.is_joined,
                    community.member_count,
                )))
            }
            kind if target => self
                .store
                .insert_relationship(&key.subject_id, actor_id, kind)
                .await
                .map(|()| None),
            kind => self
                .store
                .delete_relationship(&key.subject_id, actor_id, kind)
                .await
                .map(|()| None),
        }
    }

    /// Apply `f` to the lane and write the resulting display into the view.
    /// The write happens under the lane lock so two completions can never
    /// paint their results out of order.
    fn reconcile<V, R>(
        &self,
        view: &WeakView<V>,
        key: &RelationshipKey,
        f: impl FnOnce(&mut Lane) -> R,
        remove_subject: bool,
    ) -> Option<Settled<R>>
    where
        V: RelationshipHost,
    {
        let mut lanes = self.lanes();
        let lane_key = (view.id(), key.clone());
        let lane = lanes.get_mut(&lane_key)?;
        let outcome = f(lane);
        let display = lane.display();
        let baseline = lane.baseline;
        if lane.is_idle() {
            lanes.remove(&lane_key);
        }

        let mounted = match view.upgrade() {
            Some(handle) => {
                if remove_subject {
                    handle.update(|v| v.remove_subject(key));
                } else {
                    handle.update(|v| v.set_relationship(key, display));
                }
                true
            }
            None => {
                debug!(subject = %key.subject_id, "view unmounted before settle");
                false
            }
        };
        drop(lanes);

        Some(Settled {
            outcome,
            display,
            baseline,
            mounted,
        })
    }

    fn announce(&self, key: &RelationshipKey, confirmed: Relationship) {
        let event = match key.kind {
            RelationshipKind::Follow => SocialEvent::FollowChanged {
                user_id: key.subject_id.clone(),
                following: confirmed.active,
                followers: confirmed.count,
            },
            RelationshipKind::Membership => SocialEvent::MembershipChanged {
                community_id: key.subject_id.clone(),
                joined: confirmed.active,
                members: confirmed.count,
            },
            RelationshipKind::Like | RelationshipKind::Repost => return,
        };
        self.events.publish(event);
    }
}
