//! Compatibility gate for upload jobs.
//!
//! Evaluates a (selected, detected) profile pair against a
//! [`CompatibilityRuleSet`] to produce a [`GateDecision`] — the allow/block
//! decision that halts an upload before any destructive step. Blocking here
//! is the system's core hardware-protection function, not an error path.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::domain::board::BoardProfileId;

/// An immutable mapping from a selected profile to the set of detected
/// profiles it may be legally flashed alongside.
///
/// Profiles without an explicit entry fall back to the same-family rule
/// (shared vendor and architecture segments). Read-only after construction;
/// safe to share across concurrent validations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompatibilityRuleSet {
    rules: HashMap<BoardProfileId, Vec<BoardProfileId>>,
}

/// A one-directional relation found in a rule set: `from` accepts `to`, but
/// `to` has an explicit entry that does not accept `from`.
///
/// Some of these are intentional (a parent board kept as a safe default);
/// they are surfaced as warnings rather than mirrored automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetryGap {
    pub from: BoardProfileId,
    pub to: BoardProfileId,
}

impl std::fmt::Display for SymmetryGap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' accepts '{}' but not the reverse",
            self.from, self.to
        )
    }
}

impl CompatibilityRuleSet {
    /// An empty rule set: every decision falls through to the same-family
    /// rule.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// The built-in rule table for the supported board families.
    pub fn builtin() -> Self {
        fn id(s: &str) -> BoardProfileId {
            let mut parts = s.split(':');
            BoardProfileId::new(
                parts.next().unwrap_or_default(),
                parts.next().unwrap_or_default(),
                parts.next().unwrap_or_default(),
            )
        }
        fn ids(list: &[&str]) -> Vec<BoardProfileId> {
            list.iter().map(|s| id(s)).collect()
        }

        let mut rules = HashMap::new();

        // Classic AVR boards.
        rules.insert(
            id("arduino:avr:uno"),
            ids(&[
                "arduino:avr:uno",
                "arduino:avr:nano",
                "arduino:avr:mega",
                "arduino:avr:leonardo",
            ]),
        );
        rules.insert(
            id("arduino:avr:nano"),
            ids(&["arduino:avr:nano", "arduino:avr:uno"]),
        );
        rules.insert(
            id("arduino:avr:mega"),
            ids(&["arduino:avr:mega", "arduino:avr:uno"]),
        );
        rules.insert(
            id("arduino:avr:leonardo"),
            ids(&["arduino:avr:leonardo", "arduino:avr:uno"]),
        );

        // MegaCoreX (UPDI-programmed) parts.
        rules.insert(
            id("MegaCoreX:megaavr:4809"),
            ids(&[
                "MegaCoreX:megaavr:4809",
                "MegaCoreX:megaavr:4808",
                "MegaCoreX:megaavr:3208",
            ]),
        );
        rules.insert(
            id("MegaCoreX:megaavr:4808"),
            ids(&["MegaCoreX:megaavr:4808", "MegaCoreX:megaavr:4809"]),
        );
        rules.insert(
            id("MegaCoreX:megaavr:3208"),
            ids(&["MegaCoreX:megaavr:3208", "MegaCoreX:megaavr:4809"]),
        );

        // ESP32 variants.
        rules.insert(
            id("esp32:esp32:esp32"),
            ids(&[
                "esp32:esp32:esp32",
                "esp32:esp32:esp32s3",
                "esp32:esp32:esp32c3",
            ]),
        );
        rules.insert(
            id("esp32:esp32:esp32s3"),
            ids(&["esp32:esp32:esp32s3", "esp32:esp32:esp32"]),
        );
        rules.insert(
            id("esp32:esp32:esp32c3"),
            ids(&["esp32:esp32:esp32c3", "esp32:esp32:esp32"]),
        );

        // ESP8266 variants.
        rules.insert(
            id("esp8266:esp8266:nodemcuv2"),
            ids(&["esp8266:esp8266:nodemcuv2", "esp8266:esp8266:esp01"]),
        );
        rules.insert(
            id("esp8266:esp8266:esp01"),
            ids(&["esp8266:esp8266:esp01", "esp8266:esp8266:nodemcuv2"]),
        );

        Self { rules }
    }

    /// Add or replace an explicit entry (builder pattern).
    pub fn with_rule(
        mut self,
        selected: BoardProfileId,
        accepts: Vec<BoardProfileId>,
    ) -> Self {
        self.rules.insert(selected, accepts);
        self
    }

    /// Explicit allow-list for a selected profile, if one exists.
    pub fn entry(&self, selected: &BoardProfileId) -> Option<&[BoardProfileId]> {
        self.rules.get(selected).map(Vec::as_slice)
    }

    /// Report every one-directional accepts relation in the table.
    ///
    /// Gaps are only reported between profiles that both carry explicit
    /// entries; the same-family fallback keeps implicit pairs reachable.
    pub fn symmetry_gaps(&self) -> Vec<SymmetryGap> {
        let mut gaps = Vec::new();
        for (selected, accepts) in &self.rules {
            for detected in accepts {
                if detected == selected {
                    continue;
                }
                if let Some(reverse) = self.rules.get(detected) {
                    if !reverse.contains(selected) {
                        gaps.push(SymmetryGap {
                            from: selected.clone(),
                            to: detected.clone(),
                        });
                    }
                }
            }
        }
        gaps
    }
}

impl Default for CompatibilityRuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The gate's allow/block decision plus a human-readable rationale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateDecision {
    pub allowed: bool,
    pub rationale: String,
}

/// Validate a selected profile against a detected one.
///
/// Rules, in priority order: an unknown detection always passes with a
/// warning rationale (inconclusive identity must not strand the user); an
/// explicit rule-set entry decides by membership; otherwise shared
/// vendor/architecture segments decide; otherwise block with the most
/// specific rationale available.
pub fn validate(
    rules: &CompatibilityRuleSet,
    selected: &BoardProfileId,
    detected: &BoardProfileId,
) -> GateDecision {
    if detected.is_unknown() {
        return GateDecision {
            allowed: true,
            rationale: "detected board could not be identified; proceeding, but the upload \
                        may fail if the hardware does not match the selected profile"
                .to_string(),
        };
    }

    let allowed = match rules.entry(selected) {
        Some(accepts) => accepts.contains(detected),
        None => selected.same_family(detected),
    };

    if allowed {
        GateDecision {
            allowed: true,
            rationale: format!("detected '{detected}' is compatible with selected '{selected}'"),
        }
    } else {
        GateDecision {
            allowed: false,
            rationale: block_rationale(selected, detected),
        }
    }
}

/// Build the rationale for a block decision: always names both families,
/// adds curated cross-family guidance when one exists, and recommends the
/// profile matching the detected hardware when the catalog knows it.
fn block_rationale(selected: &BoardProfileId, detected: &BoardProfileId) -> String {
    let mut rationale = format!(
        "selected profile '{}' ({} family) is not suitable for the detected '{}' ({} family) \
         hardware; this upload is blocked to prevent damage to the board",
        selected,
        selected.family(),
        detected,
        detected.family(),
    );

    match cross_family_guidance(selected, detected) {
        Some(guidance) => {
            rationale.push_str(". ");
            rationale.push_str(guidance);
        }
        None => {
            rationale.push_str(". Select the board profile that matches your connected hardware");
        }
    }

    if let Some(label) = catalog::recommended_label(detected) {
        rationale.push_str(&format!(" (recommended: '{label}')"));
    }

    rationale
}

/// Curated guidance for the cross-family mismatches users actually hit,
/// keyed by the (selected, detected) family pair.
fn cross_family_guidance(
    selected: &BoardProfileId,
    detected: &BoardProfileId,
) -> Option<&'static str> {
    const GUIDANCE: &[(&str, &str, &str)] = &[
        (
            "arduino:avr",
            "esp32:esp32",
            "AVR firmware cannot run on an ESP32; ESP32 boards need ESP32-specific code and \
             libraries. Select 'ESP32 Dev Module' as your board profile",
        ),
        (
            "arduino:avr",
            "esp8266:esp8266",
            "AVR firmware cannot run on an ESP8266; ESP8266 boards need ESP8266-specific code \
             and libraries. Select 'NodeMCU 1.0' or another ESP8266 profile",
        ),
        (
            "esp32:esp32",
            "arduino:avr",
            "ESP32 firmware cannot run on an AVR Arduino; select 'Arduino Uno' or the matching \
             Arduino profile",
        ),
        (
            "esp8266:esp8266",
            "arduino:avr",
            "ESP8266 firmware cannot run on an AVR Arduino; select 'Arduino Uno' or the \
             matching Arduino profile",
        ),
        (
            "MegaCoreX:megaavr",
            "arduino:avr",
            "MegaCoreX firmware targets the ATmega4809 family and cannot run on a classic AVR \
             Arduino; select the matching Arduino profile",
        ),
        (
            "arduino:avr",
            "MegaCoreX:megaavr",
            "classic AVR firmware cannot run on an ATmega4809-family part; select 'ATmega4809' \
             as your board profile",
        ),
    ];

    let sel = selected.family();
    let det = detected.family();
    GUIDANCE
        .iter()
        .find(|(s, d, _)| {
            let (sv, sa) = s.split_once(':').unwrap_or((*s, ""));
            let (dv, da) = d.split_once(':').unwrap_or((*d, ""));
            sel.vendor().eq_ignore_ascii_case(sv)
                && sel.arch().eq_ignore_ascii_case(sa)
                && det.vendor().eq_ignore_ascii_case(dv)
                && det.arch().eq_ignore_ascii_case(da)
        })
        .map(|(_, _, msg)| *msg)
}
