//! Host network association check.
//!
//! WLAN credentials are owned by the OS (wpa_supplicant / NetworkManager);
//! the node only waits for the link to come up.  "Associated" means the
//! configured interface reports `operstate == up` and the broker host name
//! resolves.

use tokio::net::lookup_host;
use tracing::debug;

use crate::link::Network;

pub struct HostNetwork {
    interface: Option<String>,
    /// `host:port` of the broker, resolved as a reachability probe.
    probe: String,
}

impl HostNetwork {
    pub fn new(interface: Option<String>, broker_host: &str, broker_port: u16) -> Self {
        Self {
            interface,
            probe: format!("{broker_host}:{broker_port}"),
        }
    }
}

async fn interface_up(iface: &str) -> bool {
    let path = format!("/sys/class/net/{iface}/operstate");
    match tokio::fs::read_to_string(&path).await {
        Ok(state) => state.trim() == "up",
        Err(e) => {
            debug!(iface, "cannot read operstate: {e}");
            false
        }
    }
}

impl Network for HostNetwork {
    async fn is_associated(&mut self) -> bool {
        if let Some(iface) = &self.interface {
            if !interface_up(iface).await {
                return false;
            }
        }
        match lookup_host(self.probe.as_str()).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                debug!(probe = %self.probe, "broker lookup failed: {e}");
                false
            }
        }
    }
}
