//! Source for the supplementary `SSDT-HPET` table that replaces the renamed `_CRS`.

use crate::config::FixConfig;
use crate::error::{FixError, Result};

pub const SSDT_HPET_DSL: &str = "SSDT-HPET.dsl";
pub const SSDT_HPET_AML: &str = "SSDT-HPET.aml";

/// HPET MMIO window advertised by the supplementary `_CRS`.
pub const HPET_BASE: u32 = 0xFED0_0000;
pub const HPET_LENGTH: u32 = 0x0000_0400;

/// Guesses the LPC bridge the HPET lives under from the decompiled DSDT text.
pub fn detect_scope(dsdt_text: &str) -> Option<&'static str> {
    if dsdt_text.contains("PCI0.LPCB") {
        Some("LPCB")
    } else if dsdt_text.contains("PCI0.LPC") {
        Some("LPC")
    } else {
        None
    }
}

pub fn validate_scope(scope: &str) -> Result<&str> {
    if scope.is_empty() || scope.chars().any(char::is_whitespace) {
        return Err(FixError::InvalidScope(scope.to_string()));
    }
    Ok(scope)
}

/// Checks that `name` is a single ACPI name segment, as `Device (...)` requires.
pub fn validate_device(name: &str) -> Result<&str> {
    let valid = (1..=4).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
    if !valid {
        return Err(FixError::InvalidDevice(name.to_string()));
    }
    Ok(name)
}

/// Renders `SSDT-HPET.dsl`, which declares `\_SB.PCI0.<scope>.<device>.<method>` with the
/// target IRQs. The DSDT's own method must be renamed for this one to take effect.
pub fn render_ssdt(scope: &str, cfg: &FixConfig) -> Result<String> {
    let scope = validate_scope(scope)?;
    let device = validate_device(&cfg.device)?;
    let method = cfg.method;
    let renamed = cfg.renamed_method;
    let irqs: Vec<String> = cfg.target_irqs.iter().map(u8::to_string).collect();
    let irqs = irqs.join(",");

    Ok(format!(
        r#"//
// Supplementary {device} {method}
// Requires the {device} {method} to {renamed} rename
//
DefinitionBlock ("", "SSDT", 2, "hack", "HPET", 0x00000000)
{{
    External (_SB_.PCI0.{scope}, DeviceObj)
    External (_SB_.PCI0.{scope}.{device}, DeviceObj)

    Name (\_SB.PCI0.{scope}.{device}.{method}, ResourceTemplate ()
    {{
        IRQNoFlags ()
            {{{irqs}}}
        Memory32Fixed (ReadWrite,
            0x{HPET_BASE:08X},         // Address Base
            0x{HPET_LENGTH:08X},         // Address Length
            )
    }})
}}
"#
    ))
}
