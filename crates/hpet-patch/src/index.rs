//! Per-device index of `IRQNoFlags` assignments found in a listing.

use core::fmt;

use crate::irq::{IrqGroup, IrqMask, IrqRun};
use crate::listing::{declared_name, is_hex_line, Listing};

const IRQ_MARKER: &str = "IRQNoFlags";

/// Every `IRQNoFlags` group attributed to one device, split into runs of adjacent statements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceIrqs {
    pub name: String,
    pub runs: Vec<IrqRun>,
}

impl DeviceIrqs {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            runs: Vec::new(),
        }
    }

    /// Union of all IRQs the device asserts.
    pub fn mask(&self) -> IrqMask {
        IrqMask::from_irqs(self.runs.iter().flat_map(IrqRun::irqs))
    }
}

/// Renders runs joined by `-` and groups within a run joined by `:`.
impl fmt::Display for DeviceIrqs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, run) in self.runs.iter().enumerate() {
            if idx > 0 {
                f.write_str("-")?;
            }
            write!(f, "{run}")?;
        }
        Ok(())
    }
}

/// Devices in the order they were first seen with an IRQ group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceIrqIndex {
    devices: Vec<DeviceIrqs>,
}

impl DeviceIrqIndex {
    pub fn get(&self, name: &str) -> Option<&DeviceIrqs> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceIrqs> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn push_group(&mut self, device: &str, group: IrqGroup, in_row: bool) {
        let idx = match self.devices.iter().position(|d| d.name == device) {
            Some(idx) => idx,
            None => {
                self.devices.push(DeviceIrqs::new(device));
                self.devices.len() - 1
            }
        };
        let entry = &mut self.devices[idx];
        match entry.runs.last_mut() {
            Some(run) if in_row => run.groups.push(group),
            _ => entry.runs.push(IrqRun {
                groups: vec![group],
            }),
        }
    }
}

/// Parse state threaded through the fold over listing lines.
#[derive(Clone, Debug, Default)]
struct IndexState {
    /// Most recently declared device. Block nesting is not tracked.
    device: Option<String>,
    /// An `IRQNoFlags` marker was seen and its `{...}` literal has not been consumed yet.
    pending: bool,
    /// The last structural line closed a group, so the next group joins the same run.
    in_row: bool,
}

fn brace_literal(line: &str) -> Option<&str> {
    let start = line.find('{')? + 1;
    let len = line[start..].find('}')?;
    Some(&line[start..start + len])
}

impl IndexState {
    fn record(&mut self, index: &mut DeviceIrqIndex, literal: &str) {
        if let Some(device) = &self.device {
            index.push_group(device, IrqGroup::parse(literal), self.in_row);
            self.in_row = true;
        }
    }

    fn step(mut self, index: &mut DeviceIrqIndex, line: &str) -> Self {
        if is_hex_line(line) || line.trim().is_empty() {
            return self;
        }

        if self.pending {
            self.pending = false;
            if let Some(literal) = brace_literal(line) {
                self.record(index, literal);
                return self;
            }
        }

        if let Some(name) = declared_name(line, "Device") {
            self.device = Some(name.to_string());
            self.in_row = false;
            return self;
        }

        if let Some(pos) = line.find(IRQ_MARKER) {
            if self.device.is_some() {
                match brace_literal(&line[pos..]) {
                    Some(literal) => self.record(index, literal),
                    None => self.pending = true,
                }
            }
            return self;
        }

        self.in_row = false;
        self
    }
}

/// Walks the listing once and collects every device's `IRQNoFlags` groups.
///
/// Hex and blank lines are transparent. Any other structural line between two `IRQNoFlags`
/// statements splits them into separate runs.
pub fn index_device_irqs(listing: &Listing) -> DeviceIrqIndex {
    let (index, _state) = listing.lines().iter().fold(
        (DeviceIrqIndex::default(), IndexState::default()),
        |(mut index, state), line| {
            let state = state.step(&mut index, line);
            (index, state)
        },
    );
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(text: &str) -> DeviceIrqIndex {
        index_device_irqs(&Listing::new(text))
    }

    #[test]
    fn adjacent_statements_share_a_run() {
        let idx = index(
            "Device (RTC)\n\
             IRQNoFlags ()\n\
             {0}\n\
             00000100: 22 01 00\n\
             \n\
             IRQNoFlags ()\n\
             {8}\n\
             00000103: 22 00 01\n",
        );
        let rtc = idx.get("RTC").unwrap();
        assert_eq!(rtc.runs.len(), 1);
        assert_eq!(rtc.to_string(), "0:8");
        assert_eq!(rtc.mask().bits(), 0x0101);
    }

    #[test]
    fn intervening_structural_line_splits_runs() {
        let idx = index(
            "Device (RTC)\n\
             IRQNoFlags ()\n\
             {0}\n\
             IO (Decode16, 0x0070, 0x0070, 0x01, 0x08)\n\
             IRQNoFlags ()\n\
             {8}\n",
        );
        assert_eq!(idx.get("RTC").unwrap().to_string(), "0-8");
    }

    #[test]
    fn empty_group_is_kept_explicitly() {
        let idx = index("Device (IPIC)\nIRQNoFlags ()\n{}\nIRQNoFlags ()\n{2}\n");
        let ipic = idx.get("IPIC").unwrap();
        assert_eq!(ipic.to_string(), "{}:2");
        assert!(ipic.runs[0].groups[0].mask.is_empty());
    }

    #[test]
    fn devices_keep_first_encounter_order() {
        let idx = index(
            "Device (TMR)\nIRQNoFlags ()\n{0}\n\
             Device (RTC)\nIRQNoFlags ()\n{8}\n\
             Device (TMR)\nIRQNoFlags ()\n{2}\n",
        );
        let names: Vec<_> = idx.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["TMR", "RTC"]);
        // A new `Device` line always starts a new run, even for a name seen before.
        assert_eq!(idx.get("TMR").unwrap().to_string(), "0-2");
    }

    #[test]
    fn marker_outside_any_device_is_ignored() {
        let idx = index("IRQNoFlags ()\n{0}\nDevice (PS2K)\nName (_HID, 0)\n");
        assert!(idx.is_empty());
    }

    #[test]
    fn inline_literal_and_devices_without_irqs() {
        let idx = index("Device (GFX0)\nIRQNoFlags () {11}\nDevice (LPCB)\nName (_ADR, 0)\n");
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.get("GFX0").unwrap().to_string(), "11");
        assert!(idx.get("LPCB").is_none());
    }
}
