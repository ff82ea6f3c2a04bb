// SPDX-License-Identifier: MPL-2.0

pub const APP_ID: &str = "io.github.touchline.Touchline";
pub const APP_NAME: &str = "Touchline";

#[cfg(feature = "devel")]
pub const IS_DEVEL: bool = true;
#[cfg(not(feature = "devel"))]
pub const IS_DEVEL: bool = false;

pub const DEFAULT_BACKEND_URL: &str = "https://touchline.supabase.co";

/// Environment overrides applied on top of the settings file.
pub const ENV_BACKEND_URL: &str = "TOUCHLINE_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "TOUCHLINE_ANON_KEY";

// Relationship tables: (table, subject column, actor column)
pub const LIKES_TABLE: (&str, &str, &str) = ("post_likes", "post_id", "user_id");
pub const REPOSTS_TABLE: (&str, &str, &str) = ("post_reposts", "post_id", "user_id");
pub const FOLLOWS_TABLE: (&str, &str, &str) = ("follows", "following_id", "follower_id");
pub const MEMBERS_TABLE: (&str, &str, &str) = ("community_members", "community_id", "user_id");

pub const POSTS_TABLE: &str = "posts";
pub const COMMUNITIES_TABLE: &str = "communities";
pub const PROFILES_TABLE: &str = "profiles";
pub const NOTIFICATIONS_TABLE: &str = "notifications";

pub const SET_MEMBERSHIP_RPC: &str = "set_membership";
