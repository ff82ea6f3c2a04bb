// SPDX-License-Identifier: MPL-2.0

mod coordinator;
mod error;
mod relationship;
mod surface;

pub use coordinator::{ConfirmLeave, Coordinator, Pending};
pub use error::MutationError;
pub use relationship::{Observation, Relationship, RelationshipKey};
pub use surface::{Banner, BannerQueue, ErrorSurface};
