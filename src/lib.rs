// SPDX-License-Identifier: MPL-2.0

//! Optimistic social interactions for the Touchline sports companion.
//!
//! Likes, reposts, follows and community memberships flip on screen the
//! moment they are tapped, reconcile with the hosted backend in the
//! background and roll back exactly when the backend refuses.

pub mod app;
pub mod backend;
pub mod config;
pub mod events;
pub mod optimistic;
pub mod realtime;
pub mod runtime;
pub mod state;
pub mod views;

#[cfg(test)]
mod testing;

pub use app::TouchlineApp;

use tracing_subscriber::EnvFilter;

/// Install the global log subscriber. `RUST_LOG` wins; otherwise development
/// builds log at debug and release builds at info.
pub fn init_tracing() {
    let default = if config::IS_DEVEL {
        "touchline=debug"
    } else {
        "touchline=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second call keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
