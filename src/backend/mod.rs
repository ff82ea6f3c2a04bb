// SPDX-License-Identifier: MPL-2.0

mod client;
mod store;
mod types;

pub use client::{BackendClient, ClientError};
pub use store::{Authenticator, Backend, Catalog, RelationshipStore};
pub use types::{
    Author, Community, Engagement, Notification, NotificationKind, PickLeg, PickPost, Post,
    Profile, RelationshipKind, Session, Social, TextPost,
};
