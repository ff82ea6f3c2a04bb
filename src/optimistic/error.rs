// SPDX-License-Identifier: MPL-2.0

use crate::backend::ClientError;
use thiserror::Error;

/// Failures surfaced to the user after a toggle is rolled back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("You appear to be offline. Check your connection and try again.")]
    NetworkUnavailable,
    #[error("Your session has expired. Please sign in again.")]
    Unauthorized,
    #[error("This item is no longer available.")]
    NotFound,
    #[error("Someone else changed this at the same time. Please try again.")]
    Conflict,
    #[error("{0}")]
    Unknown(String),
}

impl MutationError {
    /// Whether the banner should offer to sign in again.
    pub fn offers_reauth(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Whether the subject should disappear from the displayed collection.
    pub fn removes_subject(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<ClientError> for MutationError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Network(_) => Self::NetworkUnavailable,
            ClientError::Unauthorized(_) | ClientError::NotAuthenticated | ClientError::Auth(_) => {
                Self::Unauthorized
            }
            ClientError::NotFound => Self::NotFound,
            ClientError::Conflict(_) => Self::Conflict,
            other @ (ClientError::Http { .. }
            | ClientError::InvalidResponse(_)
            | ClientError::Config(_)) => Self::Unknown(other.to_string()),
        }
    }
}
