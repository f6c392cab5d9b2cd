//! Programmer label mapping for board families that need external
//! programming hardware.
//!
//! The megaavr (UPDI) family cannot be flashed through an ordinary
//! USB-to-serial bridge; uploads there go through a hardware programmer
//! whose human-facing label must be translated to the toolchain's internal
//! programmer id.

use crate::domain::board::BoardProfileId;

/// Fixed table from human-facing programmer labels to toolchain programmer
/// ids. Process-wide, read-only.
const PROGRAMMERS: &[(&str, &str)] = &[
    // Canonical labels.
    ("Atmel-ICE UPDI", "atmelice_updi"),
    ("Curiosity Nano", "cusiositynano"),
    ("JTAG2UPDI", "jtag2updi"),
    ("JTAGICE3 UPDI", "jtagice3_updi"),
    ("microUPDI/Uno Wifi", "xplainedmini"),
    ("MPLAB SNAP UPDI", "snap_updi"),
    ("PICkit4 UPDI", "pickit4_updi"),
    ("PICkit5 UPDI", "pickit5_updi"),
    ("SerialUPDI (115200 baud)", "serialupdi_115200"),
    ("SerialUPDI (230400 baud)", "serialupdi_230400"),
    ("SerialUPDI (460800 baud)", "serialupdi_460800"),
    ("SerialUPDI (57600 baud)", "serialupdi_57600"),
    ("Xplained Pro", "xplainedmini"),
    // Short aliases.
    ("SerialUPDI", "serialupdi_115200"),
    ("UPDI", "serialupdi_115200"),
    ("Serial", "serialupdi_115200"),
    ("Atmel-ICE", "atmelice_updi"),
    ("Curiosity", "cusiositynano"),
    ("JTAG2", "jtag2updi"),
    ("JTAGICE3", "jtagice3_updi"),
    ("microUPDI", "xplainedmini"),
    ("MPLAB SNAP", "snap_updi"),
    ("PICkit4", "pickit4_updi"),
    ("PICkit5", "pickit5_updi"),
    ("Xplained", "xplainedmini"),
    // Legacy ids accepted as-is from older configurations.
    ("atmel_ice", "atmelice_updi"),
    ("curiosity_nano", "cusiositynano"),
    ("jtag2updi", "jtag2updi"),
    ("jtagice3", "jtagice3_updi"),
    ("microupdi", "xplainedmini"),
    ("mplab_snap", "snap_updi"),
    ("pickit4", "pickit4_updi"),
    ("pickit5", "pickit5_updi"),
    ("serialupdi", "serialupdi_115200"),
    ("xplained_pro", "xplainedmini"),
];

/// Map a human-facing programmer label to the toolchain's programmer id.
///
/// Unmapped labels return `None`; callers degrade to "no programmer
/// argument" rather than failing the upload.
pub fn resolve(label: &str) -> Option<&'static str> {
    PROGRAMMERS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(label.trim()))
        .map(|(_, cli_id)| *cli_id)
}

/// Whether uploads to this profile's family go through an external
/// hardware programmer.
pub fn family_requires_programmer(profile: &BoardProfileId) -> bool {
    profile.vendor().eq_ignore_ascii_case("MegaCoreX")
        && profile.arch().eq_ignore_ascii_case("megaavr")
}

/// Curated remediation lines shown when an upload to a UPDI-programmed
/// family fails.
pub fn updi_guidance() -> &'static [&'static str] {
    &[
        "ATmega4809-family parts require UPDI programming",
        "Regular USB-to-serial converters (CH340, CP2102) cannot program them",
        "Known compatible UPDI programmers:",
        "  - SerialUPDI adapter (DIY or commercial)",
        "  - Atmel-ICE with UPDI support",
        "  - Curiosity Nano",
        "  - JTAG2UPDI (Arduino Nano as programmer)",
        "  - PICkit4 with UPDI support",
        "For DIY SerialUPDI, flash an Arduino Nano with jtag2updi firmware and \
         connect the UPDI pin (usually pin 6) to the programmer",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_labels_resolve() {
        assert_eq!(resolve("Atmel-ICE UPDI"), Some("atmelice_updi"));
        assert_eq!(resolve("SerialUPDI (230400 baud)"), Some("serialupdi_230400"));
        assert_eq!(resolve("JTAG2UPDI"), Some("jtag2updi"));
    }

    #[test]
    fn test_aliases_resolve_to_same_ids() {
        assert_eq!(resolve("SerialUPDI"), Some("serialupdi_115200"));
        assert_eq!(resolve("UPDI"), Some("serialupdi_115200"));
        assert_eq!(resolve("pickit4"), Some("pickit4_updi"));
        assert_eq!(resolve("xplained_pro"), Some("xplainedmini"));
    }

    #[test]
    fn test_unknown_label_degrades_to_none() {
        assert_eq!(resolve("My Imaginary Programmer"), None);
        assert_eq!(resolve(""), None);
    }

    #[test]
    fn test_lookup_ignores_case_and_whitespace() {
        assert_eq!(resolve("  serialupdi  "), Some("serialupdi_115200"));
        assert_eq!(resolve("ATMEL-ICE"), Some("atmelice_updi"));
    }

    #[test]
    fn test_family_requires_programmer() {
        let updi: BoardProfileId = "MegaCoreX:megaavr:4809".parse().unwrap();
        let uno: BoardProfileId = "arduino:avr:uno".parse().unwrap();
        let esp: BoardProfileId = "esp32:esp32:esp32".parse().unwrap();
        assert!(family_requires_programmer(&updi));
        assert!(!family_requires_programmer(&uno));
        assert!(!family_requires_programmer(&esp));
    }
}
