use core::fmt;
use core::str::FromStr;

use crate::error::{FixError, Result};
use crate::irq::TerminatorPolicy;

/// Legacy devices whose fixed IRQs collide with the HPET's legacy replacement routing.
pub const DEFAULT_LEGACY_DEVICES: [&str; 4] = ["TMR", "TIMR", "IPIC", "RTC"];

/// IRQs claimed by the supplementary HPET `_CRS`.
pub const DEFAULT_TARGET_IRQS: [u8; 3] = [0, 8, 11];

/// A 4-character ACPI name segment, e.g. `_CRS`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodTag([u8; 4]);

impl MethodTag {
    pub const CRS: Self = Self(*b"_CRS");
    pub const XCRS: Self = Self(*b"XCRS");

    pub fn new(name: &str) -> Result<Self> {
        let bytes: [u8; 4] = name
            .as_bytes()
            .try_into()
            .map_err(|_| FixError::InvalidMethodTag(name.to_string()))?;
        if !bytes
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'_')
        {
            return Err(FixError::InvalidMethodTag(name.to_string()));
        }
        Ok(Self(bytes))
    }

    /// Parses the 8-hex-digit ASCII encoding, e.g. `5F435253`.
    pub fn from_hex(hex_tag: &str) -> Result<Self> {
        let bytes = hex::decode(hex_tag).map_err(|_| FixError::InvalidMethodTag(hex_tag.into()))?;
        let name =
            String::from_utf8(bytes).map_err(|_| FixError::InvalidMethodTag(hex_tag.into()))?;
        Self::new(&name)
    }

    pub fn name(&self) -> &str {
        // Validated as ASCII in every constructor.
        core::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub fn bytes(&self) -> [u8; 4] {
        self.0
    }

    pub fn hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Debug for MethodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodTag({})", self.name())
    }
}

impl fmt::Display for MethodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts either the name (`_CRS`) or its 8-hex-digit ASCII encoding (`5F435253`).
impl FromStr for MethodTag {
    type Err = FixError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() == 8 {
            Self::from_hex(s)
        } else {
            Self::new(s)
        }
    }
}

#[derive(Clone, Debug)]
pub struct FixConfig {
    /// Name of the timer device in the listing (`Device (HPET)`).
    pub device: String,
    /// Reserved resource method that gets renamed so the supplementary table wins.
    pub method: MethodTag,
    pub renamed_method: MethodTag,

    /// IRQs the new `_CRS` asserts; these bits are cleared from legacy devices.
    pub target_irqs: Vec<u8>,
    /// Devices that get IRQ patches. Any other device that asserts a target IRQ is only reported.
    pub legacy_devices: Vec<String>,

    /// Upper bound on how often the rename pattern may occur in the table.
    pub max_occurrences: usize,
    pub terminators: TerminatorPolicy,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            device: "HPET".to_string(),
            method: MethodTag::CRS,
            renamed_method: MethodTag::XCRS,

            target_irqs: DEFAULT_TARGET_IRQS.to_vec(),
            legacy_devices: DEFAULT_LEGACY_DEVICES.iter().map(|d| d.to_string()).collect(),

            max_occurrences: 2,
            terminators: TerminatorPolicy::default(),
        }
    }
}

impl FixConfig {
    pub fn is_legacy(&self, device: &str) -> bool {
        self.legacy_devices.iter().any(|d| d == device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_tags_encode_as_ascii_hex() {
        assert_eq!(MethodTag::CRS.hex(), "5F435253");
        assert_eq!(MethodTag::XCRS.hex(), "58435253");
        assert_eq!(MethodTag::from_hex("58435253").unwrap(), MethodTag::XCRS);
        assert_eq!(MethodTag::new("_CRS").unwrap().name(), "_CRS");
    }

    #[test]
    fn parses_names_and_hex_encodings() {
        assert_eq!("_CRS".parse::<MethodTag>().unwrap(), MethodTag::CRS);
        assert_eq!("58435253".parse::<MethodTag>().unwrap(), MethodTag::XCRS);
        assert_eq!("5f435253".parse::<MethodTag>().unwrap(), MethodTag::CRS);
        assert!("XCRS0".parse::<MethodTag>().is_err());
        assert!("5F43525".parse::<MethodTag>().is_err());
    }

    #[test]
    fn rejects_malformed_tags() {
        assert!(MethodTag::new("_CR").is_err());
        assert!(MethodTag::new("_crs").is_err());
        assert!(MethodTag::from_hex("5F4352").is_err());
        assert!(MethodTag::from_hex("ZZ435253").is_err());
    }

    #[test]
    fn default_config_matches_hpet_fix() {
        let cfg = FixConfig::default();
        assert_eq!(cfg.device, "HPET");
        assert_eq!(cfg.target_irqs, vec![0, 8, 11]);
        assert!(cfg.is_legacy("RTC"));
        assert!(cfg.is_legacy("TMR"));
        assert!(!cfg.is_legacy("GFX0"));
        assert_eq!(cfg.max_occurrences, 2);
    }
}
