//! Identity resolution for connected boards.
//!
//! Each endpoint runs through an ordered strategy chain (toolchain
//! board-list query, then OS device-property strings, then name
//! heuristics) and the chain always produces a [`BoardIdentity`],
//! degrading confidence instead of raising errors. A timed-out or
//! malformed toolchain query simply feeds the heuristics; only a missing
//! toolchain executable (caught at
//! [`ArduinoCli::locate`](crate::toolchain::ArduinoCli::locate)) is fatal.

use std::sync::Arc;

use boardpilot_core::catalog;
use boardpilot_core::compat::{self, CompatibilityRuleSet};
use boardpilot_core::{BoardIdentity, BoardProfileId, Confidence};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ports::{self, PortEnumerator, SerialEndpoint};
use crate::toolchain::ArduinoCli;

/// Resolves serial endpoints to best-effort board identities.
pub struct IdentityResolver {
    cli: Arc<ArduinoCli>,
    ports: Arc<dyn PortEnumerator>,
}

impl IdentityResolver {
    pub fn new(cli: Arc<ArduinoCli>, ports: Arc<dyn PortEnumerator>) -> Self {
        Self { cli, ports }
    }

    /// Resolve every currently enumerated endpoint.
    ///
    /// Endpoints resolve independently against one board-list snapshot; two
    /// passes over unchanged hardware yield the same (port, profile) pairs.
    /// An empty bus spawns nothing.
    pub async fn resolve_all(&self) -> Vec<BoardIdentity> {
        let endpoints = ports::list_endpoints(&self.ports).await;
        if endpoints.is_empty() {
            return Vec::new();
        }

        let snapshot = self.board_list_snapshot().await;
        endpoints
            .iter()
            .map(|ep| resolve_endpoint(ep, snapshot.as_deref()))
            .collect()
    }

    /// Resolve a single endpoint by port name.
    ///
    /// A port that is not currently enumerated still runs the chain (the
    /// toolchain may know it even when enumeration lags), ending at the
    /// unknown sentinel if nothing matches.
    pub async fn resolve_one(&self, port_name: &str) -> BoardIdentity {
        let endpoints = ports::list_endpoints(&self.ports).await;
        let endpoint = endpoints
            .into_iter()
            .find(|ep| ep.port_name == port_name)
            .unwrap_or_else(|| SerialEndpoint {
                port_name: port_name.to_string(),
                device_strings: None,
            });

        let snapshot = self.board_list_snapshot().await;
        resolve_endpoint(&endpoint, snapshot.as_deref())
    }

    /// Among all detected boards, pick the one most compatible with the
    /// selected profile: an exact profile match first, then any board the
    /// gate allows.
    pub async fn best_compatible(
        &self,
        rules: &CompatibilityRuleSet,
        selected: &BoardProfileId,
    ) -> Option<BoardIdentity> {
        let compatible: Vec<BoardIdentity> = self
            .resolve_all()
            .await
            .into_iter()
            .filter(|b| compat::validate(rules, selected, &b.profile).allowed)
            .collect();

        compatible
            .iter()
            .find(|b| b.profile == *selected)
            .cloned()
            .or_else(|| compatible.into_iter().next())
    }

    /// One board-list query per detection pass. Any failure (non-zero
    /// exit, empty output, timeout) degrades to `None` and the heuristics
    /// take over.
    async fn board_list_snapshot(&self) -> Option<String> {
        match self.cli.board_list_json().await {
            Ok(out) if out.success() && !out.output.trim().is_empty() => Some(out.output),
            Ok(out) => {
                debug!(exit = out.exit_code, "board list gave no usable output");
                None
            }
            Err(e) => {
                warn!("board list query degraded to heuristics: {e}");
                None
            }
        }
    }
}

/// Run the strategy chain for one endpoint. First success wins.
fn resolve_endpoint(endpoint: &SerialEndpoint, board_list: Option<&str>) -> BoardIdentity {
    if let Some(raw) = board_list {
        if let Some(identity) = extract_structured(raw, &endpoint.port_name) {
            return identity;
        }
    }

    if let Some(device_strings) = &endpoint.device_strings {
        if let Some(m) = catalog::match_device_string(device_strings) {
            debug!(port = %endpoint.port_name, device = %device_strings, "matched OS device strings");
            return BoardIdentity {
                port_name: endpoint.port_name.clone(),
                profile: m.profile,
                display_name: m.display_name,
                vendor: m.vendor,
                product: m.product,
                confidence: Confidence::OsFallback,
            };
        }
    }

    if let Some(m) = catalog::match_device_string(&endpoint.port_name) {
        return BoardIdentity {
            port_name: endpoint.port_name.clone(),
            profile: m.profile,
            display_name: m.display_name,
            vendor: m.vendor,
            product: m.product,
            confidence: Confidence::Heuristic,
        };
    }

    BoardIdentity::unresolved(&endpoint.port_name)
}

/// Best-effort extraction from the toolchain's board-list output: proper
/// JSON first, line-oriented regex scraping when the output is not valid
/// JSON (older toolchains interleave log lines with it).
fn extract_structured(raw: &str, port_name: &str) -> Option<BoardIdentity> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        if let Some(identity) = extract_from_json(&value, port_name) {
            return Some(identity);
        }
    }
    extract_with_regex(raw, port_name)
}

fn extract_from_json(value: &Value, port_name: &str) -> Option<BoardIdentity> {
    // Newer toolchains wrap the list in "detected_ports"; older ones emit a
    // bare array.
    let entries = value
        .get("detected_ports")
        .and_then(Value::as_array)
        .or_else(|| value.as_array())?;

    for entry in entries {
        let address = entry
            .pointer("/port/address")
            .and_then(Value::as_str)
            .or_else(|| entry.get("port").and_then(Value::as_str))
            .or_else(|| entry.get("address").and_then(Value::as_str));
        if address != Some(port_name) {
            continue;
        }

        let fqbn = entry
            .pointer("/matching_boards/0/fqbn")
            .and_then(Value::as_str)
            .or_else(|| entry.pointer("/boards/0/fqbn").and_then(Value::as_str))
            .or_else(|| entry.pointer("/boards/0/FQBN").and_then(Value::as_str))?;
        let profile: BoardProfileId = fqbn.parse().ok()?;
        if profile.is_unknown() {
            return None;
        }

        let display_name = entry
            .pointer("/matching_boards/0/name")
            .and_then(Value::as_str)
            .or_else(|| entry.pointer("/boards/0/name").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| catalog::display_name_for(&profile));

        let vendor = entry
            .get("vendor")
            .and_then(Value::as_str)
            .or_else(|| entry.pointer("/port/properties/vendor").and_then(Value::as_str))
            .or_else(|| {
                entry
                    .pointer("/port/properties/manufacturer")
                    .and_then(Value::as_str)
            })
            .unwrap_or("Unknown Vendor")
            .to_string();

        let product = entry
            .get("product")
            .and_then(Value::as_str)
            .or_else(|| entry.pointer("/port/properties/product").and_then(Value::as_str))
            .unwrap_or("Unknown Product")
            .to_string();

        return Some(BoardIdentity {
            port_name: port_name.to_string(),
            profile,
            display_name,
            vendor,
            product,
            confidence: Confidence::Structured,
        });
    }

    None
}

/// Line-oriented fallback: find the entry mentioning the port, then scrape
/// board/vendor/product fields from the following lines until the next
/// entry starts.
fn extract_with_regex(raw: &str, port_name: &str) -> Option<BoardIdentity> {
    let field = |name: &str| Regex::new(&format!(r#""{name}":\s*"([^"]+)""#)).ok();
    let board_re = field("(?:board|fqbn|FQBN)")?;
    let vendor_re = field("vendor")?;
    let product_re = field("product")?;
    let port_marker = format!("\"{port_name}\"");

    let mut found_port = false;
    let mut fqbn = None;
    let mut vendor = None;
    let mut product = None;

    for line in raw.lines() {
        if !found_port {
            if (line.contains("\"port\"") || line.contains("\"address\""))
                && line.contains(&port_marker)
            {
                found_port = true;
            }
            continue;
        }

        // Stop at the next entry's port line.
        if (line.contains("\"port\"") || line.contains("\"address\"")) && fqbn.is_some() {
            break;
        }

        if fqbn.is_none() {
            if let Some(c) = board_re.captures(line) {
                fqbn = Some(c[1].to_string());
            }
        }
        if vendor.is_none() {
            if let Some(c) = vendor_re.captures(line) {
                vendor = Some(c[1].to_string());
            }
        }
        if product.is_none() {
            if let Some(c) = product_re.captures(line) {
                product = Some(c[1].to_string());
            }
        }
        if fqbn.is_some() && vendor.is_some() && product.is_some() {
            break;
        }
    }

    let profile: BoardProfileId = fqbn?.parse().ok()?;
    if profile.is_unknown() {
        return None;
    }
    Some(BoardIdentity {
        port_name: port_name.to_string(),
        display_name: catalog::display_name_for(&profile),
        vendor: vendor.unwrap_or_else(|| "Unknown Vendor".to_string()),
        product: product.unwrap_or_else(|| "Unknown Product".to_string()),
        profile,
        confidence: Confidence::Structured,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_detected_ports_shape() {
        let raw = r#"{
          "detected_ports": [
            {
              "port": {
                "address": "COM7",
                "properties": { "manufacturer": "Arduino LLC", "product": "Uno R3" }
              },
              "matching_boards": [ { "name": "Arduino Uno", "fqbn": "arduino:avr:uno" } ]
            }
          ]
        }"#;

        let identity = extract_structured(raw, "COM7").expect("should extract");
        assert_eq!(identity.profile.to_string(), "arduino:avr:uno");
        assert_eq!(identity.display_name, "Arduino Uno");
        assert_eq!(identity.vendor, "Arduino LLC");
        assert_eq!(identity.product, "Uno R3");
        assert_eq!(identity.confidence, Confidence::Structured);
    }

    #[test]
    fn test_extract_from_bare_array_shape() {
        let raw = r#"[
          { "port": "COM3", "boards": [ { "name": "Arduino Mega", "fqbn": "arduino:avr:mega" } ] }
        ]"#;

        let identity = extract_structured(raw, "COM3").expect("should extract");
        assert_eq!(identity.profile.to_string(), "arduino:avr:mega");
        assert_eq!(identity.display_name, "Arduino Mega");
    }

    #[test]
    fn test_extract_ignores_other_ports() {
        let raw = r#"{
          "detected_ports": [
            { "port": { "address": "COM1" },
              "matching_boards": [ { "fqbn": "esp32:esp32:esp32" } ] }
          ]
        }"#;
        assert!(extract_structured(raw, "COM9").is_none());
    }

    #[test]
    fn test_regex_fallback_on_malformed_json() {
        // Log noise before the payload makes the JSON parse fail.
        let raw = r#"Downloading index...
          "port": "COM5",
          "board": "esp8266:esp8266:nodemcuv2",
          "vendor": "Espressif",
          "product": "NodeMCU"
        "#;

        let identity = extract_structured(raw, "COM5").expect("regex fallback");
        assert_eq!(identity.profile.to_string(), "esp8266:esp8266:nodemcuv2");
        assert_eq!(identity.vendor, "Espressif");
        assert_eq!(identity.product, "NodeMCU");
        assert_eq!(identity.confidence, Confidence::Structured);
    }

    #[test]
    fn test_chain_falls_back_to_os_strings() {
        let ep = SerialEndpoint {
            port_name: "COM4".to_string(),
            device_strings: Some("Silicon Labs CP210x USB to UART Bridge".to_string()),
        };
        let identity = resolve_endpoint(&ep, None);
        assert_eq!(identity.profile.to_string(), "esp32:esp32:esp32");
        assert_eq!(identity.confidence, Confidence::OsFallback);
    }

    #[test]
    fn test_chain_falls_back_to_port_name() {
        let ep = SerialEndpoint {
            port_name: "/dev/ttyUSB-CH340".to_string(),
            device_strings: None,
        };
        let identity = resolve_endpoint(&ep, None);
        assert_eq!(identity.profile.to_string(), "arduino:avr:uno");
        assert_eq!(identity.confidence, Confidence::Heuristic);
    }

    #[test]
    fn test_chain_ends_unresolved() {
        let ep = SerialEndpoint {
            port_name: "/dev/ttyS0".to_string(),
            device_strings: Some("PCI Serial Port".to_string()),
        };
        let identity = resolve_endpoint(&ep, None);
        assert!(identity.profile.is_unknown());
        assert_eq!(identity.confidence, Confidence::Unresolved);
        assert_eq!(identity.display_name, "Unknown Board");
    }
}
