//! MQTT session over `rumqttc`.
//!
//! The event loop is only ever driven from [`Session::poll_once`], with a
//! short time budget, so steady-state polling never stalls the control loop.
//! Outgoing publishes are queued with `try_publish` and flushed by the same
//! polls.

use std::collections::VecDeque;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode};
use tracing::{debug, info};

use crate::error::LinkError;
use crate::link::{Connector, Inbound, Session};
use crate::messages::COMMAND_TOPICS;

/// Request queue depth between client handle and event loop.
const CHANNEL_CAPACITY: usize = 32;

/// How long a single event-loop poll may wait for something to happen.
/// Expiry cancels `EventLoop::poll`, which can interrupt an outgoing flush
/// mid-write; the partly written buffer is then sent again in full on the
/// next flush.  Outbound payloads must stay small (well under one socket
/// write) so a flush completes within the budget.
const POLL_BUDGET: Duration = Duration::from_millis(5);

/// Upper bound on events serviced per `poll_once` call.
const MAX_EVENTS_PER_POLL: usize = 16;

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Deadline for CONNACK plus both SUBACKs.
    pub connect_timeout: Duration,
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

pub struct MqttConnector {
    settings: MqttSettings,
}

impl MqttConnector {
    pub fn new(settings: MqttSettings) -> Self {
        Self { settings }
    }
}

impl Connector for MqttConnector {
    type Session = MqttSession;

    async fn connect(&mut self) -> Result<MqttSession, LinkError> {
        let s = &self.settings;
        let mut opts = MqttOptions::new(s.client_id.clone(), s.host.clone(), s.port);
        opts.set_keep_alive(s.keep_alive);
        opts.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(opts, CHANNEL_CAPACITY);

        // Queued now, sent right after CONNACK.
        for topic in COMMAND_TOPICS {
            client
                .try_subscribe(topic, QoS::AtMostOnce)
                .map_err(|e| LinkError::Connect(e.to_string()))?;
        }

        let mut pending = VecDeque::new();
        tokio::time::timeout(
            s.connect_timeout,
            handshake(&mut eventloop, &mut pending),
        )
        .await
        .map_err(|_| {
            LinkError::Connect(format!(
                "broker {}:{} did not acknowledge within {:?}",
                s.host, s.port, s.connect_timeout
            ))
        })??;

        info!(host = %s.host, port = s.port, client_id = %s.client_id, "mqtt connected");
        Ok(MqttSession {
            client,
            eventloop,
            pending,
        })
    }
}

/// Drive the event loop until CONNACK and one SUBACK per command topic.
/// Commands that arrive in between are kept for the first polls.
async fn handshake(
    eventloop: &mut EventLoop,
    pending: &mut VecDeque<Inbound>,
) -> Result<(), LinkError> {
    let mut connected = false;
    let mut subacks = 0;
    while !connected || subacks < COMMAND_TOPICS.len() {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => connected = true,
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|c| matches!(c, SubscribeReasonCode::Failure))
                {
                    return Err(LinkError::Connect("broker rejected subscription".into()));
                }
                subacks += 1;
            }
            Ok(Event::Incoming(Packet::Publish(p))) => pending.push_back(Inbound {
                topic: p.topic,
                payload: p.payload.to_vec(),
            }),
            Ok(_) => {}
            Err(e) => return Err(LinkError::Connect(e.to_string())),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
    pending: VecDeque<Inbound>,
}

impl Session for MqttSession {
    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), LinkError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| LinkError::Publish(e.to_string()))
    }

    async fn poll_once(&mut self) -> Result<Option<Inbound>, LinkError> {
        if let Some(msg) = self.pending.pop_front() {
            return Ok(Some(msg));
        }
        for _ in 0..MAX_EVENTS_PER_POLL {
            match tokio::time::timeout(POLL_BUDGET, self.eventloop.poll()).await {
                Err(_) => return Ok(None), // idle
                Ok(Ok(Event::Incoming(Packet::Publish(p)))) => {
                    return Ok(Some(Inbound {
                        topic: p.topic,
                        payload: p.payload.to_vec(),
                    }));
                }
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    return Err(LinkError::Session("broker sent DISCONNECT".into()));
                }
                Ok(Ok(event)) => debug!(?event, "mqtt event"),
                Ok(Err(e)) => return Err(LinkError::Session(e.to_string())),
            }
        }
        Ok(None)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
