use core::fmt;

use tracing::{debug, info, warn};

use crate::error::{FixError, Result};
use crate::index::{index_device_irqs, DeviceIrqIndex, DeviceIrqs};
use crate::irq::run_patch;
use crate::listing::Listing;
use crate::patch::Patch;
use crate::resolver::rename_patch;
use crate::FixConfig;

/// A non-legacy device asserting one of the target IRQs. Reported only, never patched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub device: String,
    pub irqs: Vec<u8>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let irqs: Vec<String> = self.irqs.iter().map(u8::to_string).collect();
        write!(f, "{} also asserts IRQ {}", self.device, irqs.join(","))
    }
}

/// A legacy IRQ run that needed a patch but matched none of the known terminators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRun {
    pub device: String,
    pub run: String,
    pub find: String,
}

impl fmt::Display for SkippedRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "missing IRQ patch ending for {} ({}, {}); skipped",
            self.device, self.run, self.find
        )
    }
}

#[derive(Clone, Debug)]
pub struct Analysis {
    /// Listing index of the first hex line of the device's resource method.
    pub crs_line: usize,
    /// Rename first, then IRQ patches in device encounter order. Never empty.
    patches: Vec<Patch>,
    pub conflicts: Vec<Conflict>,
    pub skipped: Vec<SkippedRun>,
    pub devices: DeviceIrqIndex,
}

impl Analysis {
    /// Every patch, rename first.
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn rename(&self) -> &Patch {
        // Only `analyze` builds an `Analysis`, and it always pushes the rename first.
        &self.patches[0]
    }

    pub fn irq_patches(&self) -> &[Patch] {
        &self.patches[1..]
    }
}

fn legacy_patches(
    device: &DeviceIrqs,
    table: &[u8],
    cfg: &FixConfig,
    patches: &mut Vec<Patch>,
    skipped: &mut Vec<SkippedRun>,
) -> Result<()> {
    for run in &device.runs {
        let planned = run_patch(run, &cfg.target_irqs);
        if !planned.changed {
            debug!(device = %device.name, run = %planned.text, "no target IRQs in run");
            continue;
        }

        let Some(terminator) = cfg.terminators.resolve(&run.to_wire(), table) else {
            let skip = SkippedRun {
                device: device.name.clone(),
                run: planned.text,
                find: planned.find,
            };
            warn!("{skip}");
            skipped.push(skip);
            continue;
        };

        let patch = Patch::new(
            format!("{} IRQ {} Null Patch", device.name, planned.text),
            format!("{}{}", planned.find, terminator.hex()),
            format!("{}{}", planned.replace, terminator.hex()),
        )?;
        info!(find = patch.find(), replace = patch.replace(), "{}", patch.label());
        patches.push(patch);
    }
    Ok(())
}

/// Derives the rename and IRQ patches for `cfg.device` from a listing and its compiled table.
pub fn analyze(listing: &Listing, table: &[u8], cfg: &FixConfig) -> Result<Analysis> {
    let crs_line = listing
        .find_resource_method(&cfg.device, cfg.method.name())
        .ok_or_else(|| {
            FixError::NotFound(format!(
                "{} {} (no hex data follows Method ({}) in Device ({}))",
                cfg.device,
                cfg.method,
                cfg.method,
                cfg.device
            ))
        })?;
    info!(index = crs_line, "found {} {}", cfg.device, cfg.method);

    let rename = rename_patch(listing, crs_line, table, cfg)?;
    info!(find = rename.find(), replace = rename.replace(), "{}", rename.label());

    let devices = index_device_irqs(listing);
    let mut patches = vec![rename];
    let mut conflicts = Vec::new();
    let mut skipped = Vec::new();

    for device in devices.iter() {
        if cfg.is_legacy(&device.name) {
            legacy_patches(device, table, cfg, &mut patches, &mut skipped)?;
            continue;
        }
        if device.name == cfg.device {
            continue;
        }

        let mask = device.mask();
        let irqs: Vec<u8> = cfg
            .target_irqs
            .iter()
            .copied()
            .filter(|&irq| mask.contains(irq))
            .collect();
        if !irqs.is_empty() {
            let conflict = Conflict {
                device: device.name.clone(),
                irqs,
            };
            warn!("{conflict}");
            conflicts.push(conflict);
        }
    }

    Ok(Analysis {
        crs_line,
        patches,
        conflicts,
        skipped,
        devices,
    })
}
