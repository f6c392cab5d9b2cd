//! Serial endpoint enumeration and the exclusive-access availability probe.
//!
//! Serial operations are blocking; async callers go through the
//! `spawn_blocking` wrappers so a slow driver never stalls the caller's
//! thread of control.

use std::sync::Arc;
use std::time::Duration;

use serialport::SerialPortType;
use tracing::warn;

/// One enumerated serial endpoint with whatever descriptive strings the OS
/// attached to it. The strings are opaque text consumed only by heuristic
/// matching.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialEndpoint {
    pub port_name: String,

    /// Manufacturer/product/VID:PID text from the device registry, when the
    /// endpoint is a USB device the OS knows something about.
    pub device_strings: Option<String>,
}

/// Lists serial endpoints and probes their availability.
pub trait PortEnumerator: Send + Sync {
    /// Currently available endpoints.
    fn list(&self) -> Vec<SerialEndpoint>;

    /// Open-then-immediately-close probe. `true` means the endpoint could
    /// be claimed exclusively at this instant.
    fn probe(&self, port_name: &str) -> bool;
}

/// The host's real serial bus.
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn list(&self) -> Vec<SerialEndpoint> {
        let ports = match serialport::available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!("serial enumeration failed: {e}");
                return Vec::new();
            }
        };

        ports
            .into_iter()
            .map(|p| {
                let device_strings = match p.port_type {
                    SerialPortType::UsbPort(usb) => {
                        let mut parts = Vec::new();
                        if let Some(manufacturer) = usb.manufacturer {
                            parts.push(manufacturer);
                        }
                        if let Some(product) = usb.product {
                            parts.push(product);
                        }
                        parts.push(format!("VID:{:04X} PID:{:04X}", usb.vid, usb.pid));
                        Some(parts.join(" "))
                    }
                    _ => None,
                };
                SerialEndpoint {
                    port_name: p.port_name,
                    device_strings,
                }
            })
            .collect()
    }

    fn probe(&self, port_name: &str) -> bool {
        // Opening claims the endpoint; dropping the handle releases it.
        serialport::new(port_name, 9600)
            .timeout(Duration::from_millis(500))
            .open()
            .is_ok()
    }
}

/// Enumerate endpoints off the async caller's thread.
pub async fn list_endpoints(ports: &Arc<dyn PortEnumerator>) -> Vec<SerialEndpoint> {
    let ports = Arc::clone(ports);
    match tokio::task::spawn_blocking(move || ports.list()).await {
        Ok(endpoints) => endpoints,
        Err(e) => {
            warn!("endpoint enumeration task failed: {e}");
            Vec::new()
        }
    }
}

/// Probe an endpoint off the async caller's thread.
pub async fn probe_endpoint(ports: &Arc<dyn PortEnumerator>, port_name: &str) -> bool {
    let ports = Arc::clone(ports);
    let port_name = port_name.to_string();
    match tokio::task::spawn_blocking(move || ports.probe(&port_name)).await {
        Ok(available) => available,
        Err(e) => {
            warn!("endpoint probe task failed: {e}");
            false
        }
    }
}
