//! Main loop: one cooperative task that owns the controller and the session.
//!
//! Each tick polls at most one command, expires overrides, runs the sensing
//! cycle when due and publishes whatever the controller produced.  A session
//! failure anywhere in a tick drops the session; the next tick reconnects.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::clock::Clock;
use crate::controller::Controller;
use crate::error::LinkError;
use crate::link::{Connector, LinkManager, Network, Session};
use crate::messages::Outbound;
use crate::relay::ActuatorAdapter;
use crate::sensors::SensorAdapter;

pub struct Node<N, C: Connector, S, A, K> {
    link: LinkManager<N, C>,
    controller: Controller<S, A>,
    clock: K,
    session: Option<C::Session>,
    loop_sleep: Duration,
    recovery_delay: Duration,
}

impl<N, C, S, A, K> Node<N, C, S, A, K>
where
    N: Network,
    C: Connector,
    S: SensorAdapter,
    A: ActuatorAdapter,
    K: Clock,
{
    pub fn new(
        link: LinkManager<N, C>,
        controller: Controller<S, A>,
        clock: K,
        loop_sleep: Duration,
        recovery_delay: Duration,
    ) -> Self {
        Self {
            link,
            controller,
            clock,
            session: None,
            loop_sleep,
            recovery_delay,
        }
    }

    #[cfg(test)]
    pub fn controller(&self) -> &Controller<S, A> {
        &self.controller
    }

    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Tick forever.  Never returns.
    pub async fn run(&mut self) {
        loop {
            self.tick().await;
            sleep(self.loop_sleep).await;
        }
    }

    /// One loop iteration, including the (re)connect when there is no
    /// session.
    pub async fn tick(&mut self) {
        if self.session.is_none() {
            self.session = Some(self.link.establish().await);
            debug!(sessions = self.link.sessions_established(), "control loop online");
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if let Err(e) = step(session, &mut self.controller, &self.clock).await {
            error!(
                recovery_ms = self.recovery_delay.as_millis() as u64,
                "session lost: {e}"
            );
            self.session = None;
            sleep(self.recovery_delay).await;
        }
    }
}

async fn step<Sn, S, A, K>(
    session: &mut Sn,
    controller: &mut Controller<S, A>,
    clock: &K,
) -> Result<(), LinkError>
where
    Sn: Session,
    S: SensorAdapter,
    A: ActuatorAdapter,
    K: Clock,
{
    if let Some(msg) = session.poll_once().await? {
        match controller.handle_command(&msg.topic, &msg.payload, clock.now_ms()) {
            Ok(Some(confirm)) => publish(session, &confirm)?,
            Ok(None) => debug!(topic = %msg.topic, "message on unhandled topic"),
            Err(e) => warn!(topic = %msg.topic, "ignoring command: {e}"),
        }
    }

    let now = clock.now_ms();
    controller.expire_overrides(now);

    if controller.sensing_due(now) {
        for out in controller.run_cycle(now) {
            publish(session, &out)?;
        }
    }
    Ok(())
}

/// Encode and queue one message.  Encoding problems are logged and skipped;
/// only session errors propagate.
fn publish<Sn: Session>(session: &mut Sn, out: &Outbound) -> Result<(), LinkError> {
    match out.encode() {
        Ok(payload) => session.publish(out.topic(), payload),
        Err(e) => {
            error!(topic = out.topic(), "failed to encode message: {e}");
            Ok(())
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
