//! Static board knowledge: label-to-profile mapping, friendly display
//! names, per-profile recommendations, and the USB device-string heuristic
//! table.
//!
//! Everything here is an explicit ordered decision table. Entries are
//! matched top to bottom, so more specific token sets must precede the
//! general ones they contain ("Uno WiFi" before "Uno", "Mega ADK" before
//! "Mega").

use crate::domain::board::BoardProfileId;

fn id(s: &'static str) -> BoardProfileId {
    let mut parts = s.split(':');
    BoardProfileId::new(
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
    )
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Ordered (label tokens, profile) table mapping human board labels to
/// profile ids. A label matches when it contains every token.
const LABELS: &[(&[&str], &str)] = &[
    (&["ATmega4809"], "MegaCoreX:megaavr:4809"),
    (&["ESP32"], "esp32:esp32:esp32"),
    (&["Arduino", "Uno WiFi"], "arduino:avr:unowifi"),
    (&["Arduino", "Uno Mini"], "arduino:avr:unomini"),
    (&["Arduino", "Uno"], "arduino:avr:uno"),
    (&["Arduino", "Nano"], "arduino:avr:nano"),
    (&["Arduino", "Mega ADK"], "arduino:avr:megaADK"),
    (&["Arduino", "Mega"], "arduino:avr:mega"),
    (&["Arduino", "Leonardo"], "arduino:avr:leonardo"),
    (&["Arduino", "Micro"], "arduino:avr:micro"),
    (&["Arduino", "Pro"], "arduino:avr:pro"),
    (&["Arduino", "BT"], "arduino:avr:bt"),
    (&["Arduino", "Esplora"], "arduino:avr:esplora"),
    (&["Arduino", "Ethernet"], "arduino:avr:ethernet"),
    (&["Arduino", "Fio"], "arduino:avr:fio"),
    (&["Arduino", "Gemma"], "arduino:avr:gemma"),
    (&["Arduino", "Industrial"], "arduino:avr:chiwawa"),
    (&["Arduino", "Yún Mini"], "arduino:avr:yunmini"),
    (&["Arduino", "Yún"], "arduino:avr:yun"),
    (&["Arduino", "Mini"], "arduino:avr:mini"),
    (&["Arduino", "NG"], "arduino:avr:atmegang"),
    (&["Arduino", "Robot Control"], "arduino:avr:robotControl"),
    (&["Arduino", "Robot Motor"], "arduino:avr:robotMotor"),
    (&["LilyPad Arduino USB"], "arduino:avr:LilyPadUSB"),
    (&["LilyPad Arduino"], "arduino:avr:lilypad"),
    (&["Linino One"], "arduino:avr:one"),
    (&["Adafruit Circuit Playground"], "arduino:avr:circuitplay32u4cat"),
    (&["Arduino"], "arduino:avr:uno"),
];

/// Map a human board label to its profile id.
///
/// Unmatched labels fall back to the default AVR profile, the safest
/// conservative target.
pub fn profile_for_label(label: &str) -> BoardProfileId {
    LABELS
        .iter()
        .find(|(tokens, _)| tokens.iter().all(|t| contains_ignore_case(label, t)))
        .map(|(_, profile)| id(profile))
        .unwrap_or_else(|| id("arduino:avr:uno"))
}

/// Derive a friendly display name from a profile id's architecture and
/// variant segments.
pub fn display_name_for(profile: &BoardProfileId) -> String {
    if profile.is_unknown() {
        return "Unknown Board".to_string();
    }
    let variant = profile.variant();
    match profile.arch().to_lowercase().as_str() {
        "avr" | "sam" | "samd" => format!("Arduino {}", variant.to_uppercase()),
        "megaavr" => format!("ATmega{variant}"),
        "esp32" => format!("ESP32 {variant}"),
        "esp8266" => format!("ESP8266 {variant}"),
        _ => format!(
            "{} {}",
            profile.arch().to_uppercase(),
            variant.to_uppercase()
        ),
    }
}

/// The board label to recommend for a detected profile, when curated.
pub fn recommended_label(profile: &BoardProfileId) -> Option<&'static str> {
    const RECOMMENDATIONS: &[(&str, &str)] = &[
        ("esp32:esp32:esp32", "ESP32 Dev Module"),
        ("esp32:esp32:esp32s3", "ESP32-S3 Dev Module"),
        ("esp32:esp32:esp32c3", "ESP32-C3 Dev Module"),
        ("esp8266:esp8266:nodemcuv2", "NodeMCU 1.0 (ESP-12E Module)"),
        ("esp8266:esp8266:esp01", "ESP8266 ESP-01"),
        ("MegaCoreX:megaavr:4809", "ATmega4809"),
        ("MegaCoreX:megaavr:4808", "ATmega4808"),
        ("MegaCoreX:megaavr:3208", "ATmega3208"),
        ("arduino:avr:uno", "Arduino Uno"),
        ("arduino:avr:nano", "Arduino Nano"),
        ("arduino:avr:mega", "Arduino Mega"),
    ];

    RECOMMENDATIONS
        .iter()
        .find(|(p, _)| id(p) == *profile)
        .map(|(_, label)| *label)
}

/// A heuristic match of an opaque device string against the known
/// USB-bridge-chip and vendor-token table.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMatch {
    pub profile: BoardProfileId,
    pub display_name: String,
    pub vendor: String,
    pub product: String,
}

/// Ordered heuristic table: (tokens, profile, display name, vendor,
/// product). Bridge-chip signatures first, then vendor-name tokens; a CH340
/// maps to the default AVR profile as a conservative guess since the chip
/// appears on many clone boards.
const HEURISTICS: &[(&[&str], &str, &str, &str, &str)] = &[
    (
        &["CP210x"],
        "esp32:esp32:esp32",
        "ESP32 (CP210x)",
        "Silicon Labs",
        "CP210x",
    ),
    (
        &["CP2102"],
        "esp32:esp32:esp32",
        "ESP32 (CP2102)",
        "Silicon Labs",
        "CP2102",
    ),
    (
        &["CH340"],
        "arduino:avr:uno",
        "Generic Board (CH340)",
        "WCH",
        "CH340",
    ),
    (
        &["Arduino", "Mega"],
        "arduino:avr:mega",
        "Arduino Mega",
        "Arduino",
        "Mega",
    ),
    (
        &["Arduino", "Nano"],
        "arduino:avr:nano",
        "Arduino Nano",
        "Arduino",
        "Nano",
    ),
    (
        &["Arduino", "Uno"],
        "arduino:avr:uno",
        "Arduino Uno",
        "Arduino",
        "Uno",
    ),
    (
        &["Arduino"],
        "arduino:avr:uno",
        "Arduino",
        "Arduino",
        "Unknown Product",
    ),
];

/// Match an opaque device string (OS descriptive text or a raw port name)
/// against the heuristic table.
pub fn match_device_string(device_string: &str) -> Option<DeviceMatch> {
    HEURISTICS
        .iter()
        .find(|(tokens, _, _, _, _)| {
            tokens.iter().all(|t| contains_ignore_case(device_string, t))
        })
        .map(|(_, profile, display, vendor, product)| DeviceMatch {
            profile: id(profile),
            display_name: (*display).to_string(),
            vendor: (*vendor).to_string(),
            product: (*product).to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_mapping_basics() {
        assert_eq!(
            profile_for_label("Arduino Uno").to_string(),
            "arduino:avr:uno"
        );
        assert_eq!(
            profile_for_label("ATmega4809").to_string(),
            "MegaCoreX:megaavr:4809"
        );
        assert_eq!(
            profile_for_label("ESP32 Dev Module").to_string(),
            "esp32:esp32:esp32"
        );
    }

    #[test]
    fn test_specific_labels_win_over_general() {
        assert_eq!(
            profile_for_label("Arduino Mega ADK").to_string(),
            "arduino:avr:megaADK"
        );
        assert_eq!(
            profile_for_label("Arduino Uno WiFi").to_string(),
            "arduino:avr:unowifi"
        );
        assert_eq!(
            profile_for_label("LilyPad Arduino USB").to_string(),
            "arduino:avr:LilyPadUSB"
        );
    }

    #[test]
    fn test_unmatched_label_falls_back_to_default_avr() {
        assert_eq!(
            profile_for_label("Some Mystery Device").to_string(),
            "arduino:avr:uno"
        );
    }

    #[test]
    fn test_display_names() {
        assert_eq!(
            display_name_for(&"arduino:avr:uno".parse().unwrap()),
            "Arduino UNO"
        );
        assert_eq!(
            display_name_for(&"MegaCoreX:megaavr:4809".parse().unwrap()),
            "ATmega4809"
        );
        assert_eq!(
            display_name_for(&"esp8266:esp8266:nodemcuv2".parse().unwrap()),
            "ESP8266 nodemcuv2"
        );
        assert_eq!(
            display_name_for(&BoardProfileId::unknown()),
            "Unknown Board"
        );
    }

    #[test]
    fn test_recommendations() {
        assert_eq!(
            recommended_label(&"esp32:esp32:esp32".parse().unwrap()),
            Some("ESP32 Dev Module")
        );
        assert_eq!(
            recommended_label(&"arduino:avr:lilypad".parse().unwrap()),
            None
        );
    }

    #[test]
    fn test_heuristic_bridge_chips() {
        let m = match_device_string("Silicon Labs CP210x USB to UART Bridge (COM7)").unwrap();
        assert_eq!(m.profile.to_string(), "esp32:esp32:esp32");
        assert_eq!(m.vendor, "Silicon Labs");

        let m = match_device_string("USB-SERIAL CH340 (COM3)").unwrap();
        assert_eq!(m.profile.to_string(), "arduino:avr:uno");
        assert_eq!(m.display_name, "Generic Board (CH340)");
    }

    #[test]
    fn test_heuristic_vendor_tokens() {
        let m = match_device_string("Arduino Mega 2560").unwrap();
        assert_eq!(m.profile.to_string(), "arduino:avr:mega");

        let m = match_device_string("Arduino SA").unwrap();
        assert_eq!(m.profile.to_string(), "arduino:avr:uno");
        assert_eq!(m.display_name, "Arduino");
    }

    #[test]
    fn test_heuristic_no_match() {
        assert!(match_device_string("Bluetooth Serial Link").is_none());
        assert!(match_device_string("COM1").is_none());
    }
}
