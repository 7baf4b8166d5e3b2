mod clock;
mod config;
mod controller;
mod error;
mod gas;
mod link;
mod messages;
mod mqtt;
mod network;
mod node;
mod relay;
mod sensors;
mod sim;
#[cfg(test)]
mod testing;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::clock::{Clock, TokioClock};
use crate::controller::Controller;
use crate::link::LinkManager;
use crate::mqtt::MqttConnector;
use crate::network::HostNetwork;
use crate::node::Node;
use crate::relay::RelayBoard;
use crate::sim::SimulatedSensors;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "node.toml".to_string());
    let config = config::load(&config_path, |key| std::env::var(key).ok())?;

    info!(
        broker = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        client_id = %config.mqtt.client_id,
        scenario = %config.scenario(),
        sensing_interval_ms = config.timing.sensing_interval_ms,
        override_timeout_ms = config.timing.override_timeout_ms,
        "envmon node starting"
    );

    // Outputs go to a known OFF state before anything else runs.
    let mut relays = RelayBoard::new(config.relay_pins(), config.relays.active_low)?;
    relays.all_off();

    let sensors = SimulatedSensors::new(config.scenario());

    let network = HostNetwork::new(
        config.network.interface.clone(),
        &config.mqtt.host,
        config.mqtt.port,
    );
    let connector = MqttConnector::new(config.mqtt_settings());
    let link = LinkManager::new(network, connector, config.link_settings());

    let clock = TokioClock::new();
    let controller = Controller::new(
        sensors,
        relays,
        config.policy(),
        config.timing(),
        clock.now_ms(),
    );

    let mut node = Node::new(
        link,
        controller,
        clock,
        config.loop_sleep(),
        config.recovery_delay(),
    );
    node.run().await;
    Ok(())
}
