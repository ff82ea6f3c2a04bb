// SPDX-License-Identifier: MPL-2.0

//! Headless screen state. Rendering lives elsewhere and watches the revision.

mod communities;
mod feed;
mod handle;
mod notifications;
mod profile;

pub use communities::CommunitiesView;
pub use feed::FeedView;
pub use handle::{ViewHandle, ViewId, WeakView};
pub use notifications::NotificationsView;
pub use profile::ProfileView;

use crate::optimistic::{Relationship, RelationshipKey};

/// A view that displays one or more toggleable relationships.
pub trait RelationshipHost: Send + 'static {
    /// Current displayed pair, `None` if the subject is not shown here.
    fn relationship(&self, key: &RelationshipKey) -> Option<Relationship>;

    /// Overwrite the displayed pair. Returns false if the subject is not shown here.
    fn set_relationship(&mut self, key: &RelationshipKey, value: Relationship) -> bool;

    /// Drop the subject from the displayed collection.
    fn remove_subject(&mut self, key: &RelationshipKey) -> bool;
}
