use std::sync::Arc;

use anyhow::Result;

use crate::config::{AuthConfig, ServerConfig};
use crate::server::{start_server, AppState};
use crate::tracker::Tracker;

pub struct ServeCommand {
    pub tracker: Tracker,
    pub server: ServerConfig,
    pub auth: AuthConfig,
}

impl ServeCommand {
    pub fn new(tracker: Tracker, server: ServerConfig, auth: AuthConfig) -> Self {
        Self {
            tracker,
            server,
            auth,
        }
    }

    pub fn with_host(mut self, host: Option<String>) -> Self {
        if let Some(host) = host {
            self.server.host = host;
        }
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }

    pub async fn execute(self) -> Result<()> {
        println!(
            "🌐 Serving runbook API on http://{}:{}",
            self.server.host, self.server.port
        );
        let state = Arc::new(AppState::new(self.tracker, self.auth));
        start_server(&self.server, state).await
    }
}
