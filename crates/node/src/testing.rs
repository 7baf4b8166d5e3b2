//! Test doubles for the sensor, actuator and link ports.
//!
//! Each double is a cheap `Rc` handle so a test can keep one copy for
//! scripting/inspection while the code under test owns another.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{LinkError, SensorError};
use crate::link::{Connector, Inbound, Network, Session};
use crate::messages::COMMAND_TOPICS;
use crate::relay::ActuatorAdapter;
use crate::sensors::SensorAdapter;

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

struct SensorScript {
    dht: Result<(f32, f32), SensorError>,
    gas: u16,
    light: u16,
}

#[derive(Clone)]
pub struct ScriptedSensors(Rc<RefCell<SensorScript>>);

impl ScriptedSensors {
    pub fn new(dht: Result<(f32, f32), SensorError>, gas: u16, light: u16) -> Self {
        Self(Rc::new(RefCell::new(SensorScript { dht, gas, light })))
    }

    pub fn set_dht(&self, dht: Result<(f32, f32), SensorError>) {
        self.0.borrow_mut().dht = dht;
    }

    pub fn set_gas(&self, raw: u16) {
        self.0.borrow_mut().gas = raw;
    }

    pub fn set_light(&self, raw: u16) {
        self.0.borrow_mut().light = raw;
    }
}

impl SensorAdapter for ScriptedSensors {
    fn read_temperature_humidity(&mut self) -> Result<(f32, f32), SensorError> {
        self.0.borrow().dht
    }

    fn read_gas_raw(&mut self) -> u16 {
        self.0.borrow().gas
    }

    fn read_light_raw(&mut self) -> u16 {
        self.0.borrow().light
    }
}

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ActuatorLog {
    light: Option<bool>,
    fan: Option<bool>,
    alarm: Option<bool>,
    writes: usize,
    fan_writes: usize,
}

/// Records the last commanded state of each output (`None` = never driven).
#[derive(Clone, Default)]
pub struct RecordingActuators(Rc<RefCell<ActuatorLog>>);

impl RecordingActuators {
    pub fn light(&self) -> Option<bool> {
        self.0.borrow().light
    }

    pub fn fan(&self) -> Option<bool> {
        self.0.borrow().fan
    }

    pub fn alarm(&self) -> Option<bool> {
        self.0.borrow().alarm
    }

    pub fn writes(&self) -> usize {
        self.0.borrow().writes
    }

    pub fn fan_writes(&self) -> usize {
        self.0.borrow().fan_writes
    }
}

impl ActuatorAdapter for RecordingActuators {
    fn set_light(&mut self, energized: bool) {
        let mut log = self.0.borrow_mut();
        log.light = Some(energized);
        log.writes += 1;
    }

    fn set_fan(&mut self, energized: bool) {
        let mut log = self.0.borrow_mut();
        log.fan = Some(energized);
        log.writes += 1;
        log.fan_writes += 1;
    }

    fn set_alarm(&mut self, energized: bool) {
        let mut log = self.0.borrow_mut();
        log.alarm = Some(energized);
        log.writes += 1;
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Default)]
struct NetworkLog {
    polls: usize,
    associated_on: usize,
}

#[derive(Clone)]
pub struct MockNetwork(Rc<RefCell<NetworkLog>>);

impl MockNetwork {
    /// Reports associated from the `n`-th check onwards.
    pub fn associated_after(n: usize) -> Self {
        Self(Rc::new(RefCell::new(NetworkLog {
            polls: 0,
            associated_on: n,
        })))
    }

    pub fn polls(&self) -> usize {
        self.0.borrow().polls
    }
}

impl Network for MockNetwork {
    async fn is_associated(&mut self) -> bool {
        let mut log = self.0.borrow_mut();
        log.polls += 1;
        log.polls >= log.associated_on
    }
}

// ---------------------------------------------------------------------------
// Broker, connector, session
// ---------------------------------------------------------------------------

/// A message published by the node, tagged with the session that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub session: usize,
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct BrokerState {
    connect_attempts: usize,
    sessions: usize,
    failing_connects: usize,
    failing_publishes: usize,
    subscriptions: Vec<String>,
    inbound: VecDeque<Inbound>,
    published: Vec<Published>,
    drop_session: bool,
}

/// In-memory stand-in for the MQTT broker shared by connector and sessions.
#[derive(Clone, Default)]
pub struct MockBroker(Rc<RefCell<BrokerState>>);

impl MockBroker {
    pub fn fail_next_connects(&self, n: usize) {
        self.0.borrow_mut().failing_connects = n;
    }

    /// Reject the next `n` publishes as if the outbound queue were full.
    pub fn fail_next_publishes(&self, n: usize) {
        self.0.borrow_mut().failing_publishes = n;
    }

    /// Queue a command for the node to receive.
    pub fn send(&self, topic: &str, payload: &[u8]) {
        self.0.borrow_mut().inbound.push_back(Inbound {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    /// Make the current session fail on its next poll.
    pub fn drop_session(&self) {
        self.0.borrow_mut().drop_session = true;
    }

    pub fn connect_attempts(&self) -> usize {
        self.0.borrow().connect_attempts
    }

    pub fn sessions(&self) -> usize {
        self.0.borrow().sessions
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.0.borrow().subscriptions.clone()
    }

    pub fn published(&self) -> Vec<Published> {
        self.0.borrow().published.clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .collect()
    }
}

pub struct MockConnector {
    broker: MockBroker,
}

impl MockConnector {
    pub fn new(broker: MockBroker) -> Self {
        Self { broker }
    }
}

impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&mut self) -> Result<MockSession, LinkError> {
        let mut st = self.broker.0.borrow_mut();
        st.connect_attempts += 1;
        if st.failing_connects > 0 {
            st.failing_connects -= 1;
            return Err(LinkError::Connect("connection refused".into()));
        }
        st.sessions += 1;
        st.subscriptions = COMMAND_TOPICS.iter().map(|t| t.to_string()).collect();
        Ok(MockSession {
            broker: self.broker.clone(),
            id: st.sessions,
        })
    }
}

pub struct MockSession {
    broker: MockBroker,
    id: usize,
}

impl Session for MockSession {
    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), LinkError> {
        let mut st = self.broker.0.borrow_mut();
        if st.failing_publishes > 0 {
            st.failing_publishes -= 1;
            return Err(LinkError::Publish("request queue full".into()));
        }
        st.published.push(Published {
            session: self.id,
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn poll_once(&mut self) -> Result<Option<Inbound>, LinkError> {
        let mut st = self.broker.0.borrow_mut();
        if st.drop_session {
            st.drop_session = false;
            return Err(LinkError::Session("connection reset by peer".into()));
        }
        Ok(st.inbound.pop_front())
    }
}
