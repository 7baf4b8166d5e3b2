//! Link manager: network association and messaging-session lifecycle.
//!
//! The node never resumes a broken session.  Any failure drops it and the
//! next [`LinkManager::establish`] builds a fresh one, re-subscribing from
//! scratch.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::LinkError;

/// One inbound publish on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub topic: String,
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

pub trait Network {
    /// Non-blocking check of the network association.
    async fn is_associated(&mut self) -> bool;
}

pub trait Connector {
    type Session: Session;

    /// Open a session and subscribe to the command topics.  Only returns
    /// `Ok` once the session is ready to deliver commands.
    async fn connect(&mut self) -> Result<Self::Session, LinkError>;
}

pub trait Session {
    /// Queue a message for sending.  Never blocks.
    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), LinkError>;

    /// Service the connection and return at most one inbound message.
    /// Must return promptly when nothing is pending.
    async fn poll_once(&mut self) -> Result<Option<Inbound>, LinkError>;
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct LinkSettings {
    /// Fixed poll interval while waiting for association.
    pub association_poll: Duration,
    /// Fixed delay between session connect attempts.
    pub reconnect_delay: Duration,
}

pub struct LinkManager<N, C> {
    network: N,
    connector: C,
    settings: LinkSettings,
    sessions: u32,
}

impl<N: Network, C: Connector> LinkManager<N, C> {
    pub fn new(network: N, connector: C, settings: LinkSettings) -> Self {
        Self {
            network,
            connector,
            settings,
            sessions: 0,
        }
    }

    /// Number of sessions opened so far.
    pub fn sessions_established(&self) -> u32 {
        self.sessions
    }

    /// Block until the network is associated.  No backoff.
    pub async fn ensure_associated(&mut self) {
        if self.network.is_associated().await {
            return;
        }
        info!("waiting for network association");
        let mut polls: u32 = 1;
        loop {
            sleep(self.settings.association_poll).await;
            polls += 1;
            if self.network.is_associated().await {
                info!(polls, "network associated");
                return;
            }
        }
    }

    /// Connect a session, retrying forever with a fixed delay.
    pub async fn connect_session(&mut self) -> C::Session {
        let mut attempt: u32 = 1;
        loop {
            match self.connector.connect().await {
                Ok(session) => {
                    self.sessions += 1;
                    info!(attempt, session = self.sessions, "session ready");
                    return session;
                }
                Err(e) => {
                    warn!(
                        attempt,
                        retry_in_ms = self.settings.reconnect_delay.as_millis() as u64,
                        "{e}"
                    );
                    sleep(self.settings.reconnect_delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Associate, then connect.  Returns a ready session.
    pub async fn establish(&mut self) -> C::Session {
        self.ensure_associated().await;
        self.connect_session().await
    }
}

// ===========================================================================
// Tests
// ===========================================================================
