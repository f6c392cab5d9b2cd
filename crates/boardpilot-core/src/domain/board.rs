//! Board profile identifiers and resolved board identities.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::BoardpilotError;

/// A fully-qualified board profile identifier: `vendor:arch:variant`
/// (e.g. `arduino:avr:uno`, `MegaCoreX:megaavr:4809`).
///
/// Segment case is preserved for display but ignored for equality and
/// hashing, so `MegaCoreX:megaavr:4809` and `megacorex:megaavr:4809` name
/// the same profile. The `unknown` sentinel stands in for a board whose
/// identity could not be resolved.
#[derive(Debug, Clone)]
pub struct BoardProfileId {
    vendor: String,
    arch: String,
    variant: String,
}

impl BoardProfileId {
    /// Build a profile id from its three segments.
    pub fn new(
        vendor: impl Into<String>,
        arch: impl Into<String>,
        variant: impl Into<String>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            arch: arch.into(),
            variant: variant.into(),
        }
    }

    /// The sentinel for an unidentifiable board.
    pub fn unknown() -> Self {
        Self {
            vendor: String::new(),
            arch: String::new(),
            variant: String::new(),
        }
    }

    /// Whether this is the `unknown` sentinel.
    pub fn is_unknown(&self) -> bool {
        self.vendor.is_empty()
    }

    /// Vendor/package namespace segment.
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Architecture family segment.
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Board variant segment.
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// The (vendor, architecture) family this profile belongs to.
    pub fn family(&self) -> Family {
        Family {
            vendor: self.vendor.clone(),
            arch: self.arch.clone(),
        }
    }

    /// Whether two profiles share vendor and architecture segments.
    pub fn same_family(&self, other: &BoardProfileId) -> bool {
        !self.is_unknown() && !other.is_unknown() && self.family() == other.family()
    }
}

impl PartialEq for BoardProfileId {
    fn eq(&self, other: &Self) -> bool {
        self.vendor.eq_ignore_ascii_case(&other.vendor)
            && self.arch.eq_ignore_ascii_case(&other.arch)
            && self.variant.eq_ignore_ascii_case(&other.variant)
    }
}

impl Eq for BoardProfileId {}

impl Hash for BoardProfileId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for segment in [&self.vendor, &self.arch, &self.variant] {
            for b in segment.bytes() {
                state.write_u8(b.to_ascii_lowercase());
            }
            state.write_u8(b':');
        }
    }
}

impl fmt::Display for BoardProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "unknown")
        } else {
            write!(f, "{}:{}:{}", self.vendor, self.arch, self.variant)
        }
    }
}

impl FromStr for BoardProfileId {
    type Err = BoardpilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("unknown") {
            return Ok(Self::unknown());
        }
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(vendor), Some(arch), Some(variant), None)
                if !vendor.is_empty() && !arch.is_empty() && !variant.is_empty() =>
            {
                Ok(Self::new(vendor, arch, variant))
            }
            _ => Err(BoardpilotError::InvalidProfileId(s.to_string())),
        }
    }
}

impl Serialize for BoardProfileId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BoardProfileId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The (vendor, architecture) pair shared by related board variants.
#[derive(Debug, Clone)]
pub struct Family {
    vendor: String,
    arch: String,
}

impl Family {
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }
}

impl PartialEq for Family {
    fn eq(&self, other: &Self) -> bool {
        self.vendor.eq_ignore_ascii_case(&other.vendor)
            && self.arch.eq_ignore_ascii_case(&other.arch)
    }
}

impl Eq for Family {}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vendor, self.arch)
    }
}

/// How a board identity was derived.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Profile extracted from the toolchain's structured board-list output.
    Structured,
    /// Profile derived from OS device-property strings for the endpoint.
    OsFallback,
    /// Profile guessed from the endpoint's port name alone.
    Heuristic,
    /// Nothing matched; profile is the `unknown` sentinel.
    Unresolved,
}

/// One physically detected endpoint's resolved identity.
///
/// Created fresh on every detection pass and owned by the caller that
/// requested detection; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardIdentity {
    /// Serial endpoint name (unique among concurrently enumerated endpoints).
    pub port_name: String,

    /// Resolved profile id, or the `unknown` sentinel.
    pub profile: BoardProfileId,

    /// Human-facing board name (e.g. "Arduino UNO").
    pub display_name: String,

    /// Vendor string as reported by the detection source.
    pub vendor: String,

    /// Product string as reported by the detection source.
    pub product: String,

    /// How this identity was derived.
    pub confidence: Confidence,
}

impl BoardIdentity {
    /// An unresolved identity for a port nothing matched.
    pub fn unresolved(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            profile: BoardProfileId::unknown(),
            display_name: "Unknown Board".to_string(),
            vendor: "Unknown Vendor".to_string(),
            product: "Unknown Product".to_string(),
            confidence: Confidence::Unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_well_formed_profile() {
        let id: BoardProfileId = "arduino:avr:uno".parse().unwrap();
        assert_eq!(id.vendor(), "arduino");
        assert_eq!(id.arch(), "avr");
        assert_eq!(id.variant(), "uno");
        assert_eq!(id.to_string(), "arduino:avr:uno");
    }

    #[test]
    fn parse_unknown_sentinel() {
        let id: BoardProfileId = "unknown".parse().unwrap();
        assert!(id.is_unknown());
        assert_eq!(id.to_string(), "unknown");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("arduino:avr".parse::<BoardProfileId>().is_err());
        assert!("a:b:c:d".parse::<BoardProfileId>().is_err());
        assert!("::".parse::<BoardProfileId>().is_err());
    }

    #[test]
    fn equality_ignores_case() {
        let a: BoardProfileId = "MegaCoreX:megaavr:4809".parse().unwrap();
        let b: BoardProfileId = "megacorex:MEGAAVR:4809".parse().unwrap();
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn display_preserves_case() {
        let id: BoardProfileId = "MegaCoreX:megaavr:4809".parse().unwrap();
        assert_eq!(id.to_string(), "MegaCoreX:megaavr:4809");
    }

    #[test]
    fn family_equality() {
        let uno: BoardProfileId = "arduino:avr:uno".parse().unwrap();
        let mega: BoardProfileId = "arduino:avr:mega".parse().unwrap();
        let esp: BoardProfileId = "esp32:esp32:esp32".parse().unwrap();
        assert!(uno.same_family(&mega));
        assert!(!uno.same_family(&esp));
        assert!(!uno.same_family(&BoardProfileId::unknown()));
        assert_eq!(uno.family().to_string(), "arduino:avr");
    }

    #[test]
    fn serde_roundtrip_as_string() {
        let id: BoardProfileId = "esp32:esp32:esp32s3".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"esp32:esp32:esp32s3\"");
        let back: BoardProfileId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
