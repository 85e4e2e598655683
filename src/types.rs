//! Basic type definitions for the chat server
//!
//! Provides the `SessionId` newtype and the bounds applied to user-supplied
//! display names and room names.

use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum length (in characters) of a display name or room name.
/// Longer input is truncated, never rejected.
pub const MAX_NAME_LEN: usize = 31;

/// Prefix of the display name every session starts with.
pub const GUEST_PREFIX: &str = "GUEST_";

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique session identifier (newtype pattern)
///
/// Allocated from a process-wide monotonic counter, so an identifier is never
/// handed to two sessions during the lifetime of the process.
/// Implements Hash, Eq and Ord for use as map keys; ordering follows
/// allocation (and therefore registration) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Allocate the next unused session ID
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Default display name for a session that has not logged in
    pub fn guest_name(&self) -> String {
        format!("{}{}", GUEST_PREFIX, self.0)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Truncate a user-supplied name to `MAX_NAME_LEN` characters
pub fn bounded_name(name: &str) -> String {
    name.chars().take(MAX_NAME_LEN).collect()
}
