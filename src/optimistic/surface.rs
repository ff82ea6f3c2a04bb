// SPDX-License-Identifier: MPL-2.0

use crate::optimistic::MutationError;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Where rolled-back toggles are reported. Never blocks the caller.
pub trait ErrorSurface: Send + Sync {
    fn show_error(&self, error: &MutationError);
}

/// A transient, dismissible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub id: u64,
    pub message: String,
    /// Render a "Sign in" action alongside the message.
    pub offers_reauth: bool,
    pub expires_at: Instant,
}

/// Snackbar-style banner stack. Oldest banners fall off once the stack is full.
pub struct BannerQueue {
    ttl: Duration,
    capacity: usize,
    next_id: AtomicU64,
    banners: Mutex<VecDeque<Banner>>,
}

impl BannerQueue {
    pub const DEFAULT_CAPACITY: usize = 3;

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            capacity: Self::DEFAULT_CAPACITY,
            next_id: AtomicU64::new(1),
            banners: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, message: impl Into<String>, offers_reauth: bool) -> u64 {
        self.push_at(message.into(), offers_reauth, Instant::now())
    }

    fn push_at(&self, message: String, offers_reauth: bool, now: Instant) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut banners = self.banners.lock().expect("banner lock poisoned");
        if banners.len() >= self.capacity {
            banners.pop_front();
        }
        banners.push_back(Banner {
            id,
            message,
            offers_reauth,
            expires_at: now + self.ttl,
        });
        id
    }

    /// Banners still on screen, oldest first. Expired ones are dropped.
    pub fn active(&self) -> Vec<Banner> {
        self.active_at(Instant::now())
    }

    fn active_at(&self, now: Instant) -> Vec<Banner> {
        let mut banners = self.banners.lock().expect("banner lock poisoned");
        banners.retain(|b| b.expires_at > now);
        banners.iter().cloned().collect()
    }

    pub fn dismiss(&self, id: u64) -> bool {
        let mut banners = self.banners.lock().expect("banner lock poisoned");
        let before = banners.len();
        banners.retain(|b| b.id != id);
        banners.len() != before
    }

    pub fn clear(&self) {
        self.banners.lock().expect("banner lock poisoned").clear();
    }
}

impl ErrorSurface for BannerQueue {
    fn show_error(&self, error: &MutationError) {
        self.push(error.to_string(), error.offers_reauth());
    }
}
