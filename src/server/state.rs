//! Application state shared across request handlers.

use crate::config::AuthConfig;
use crate::tracker::Tracker;

pub struct AppState {
    pub tracker: Tracker,
    /// Accepted bearer tokens
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(tracker: Tracker, auth: AuthConfig) -> Self {
        Self { tracker, auth }
    }
}
