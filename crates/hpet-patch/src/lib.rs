//! HPET `_CRS` fix-up patch generation.
//!
//! Given a mixed `iasl -l` listing of a DSDT and the compiled table itself, this crate derives the
//! byte patches a bootloader needs to:
//! - rename the HPET's `_CRS` to `XCRS` so a supplementary SSDT can provide its own resources, and
//! - clear the HPET's IRQs from the `IRQNoFlags` descriptors of legacy devices (PIT, RTC, PIC).
//!
//! The analysis is pure and synchronous; reading inputs, invoking `iasl`, and writing outputs are
//! left to the caller (see the `fix_hpet` tool).

pub mod analyze;
pub mod config;
pub mod error;
pub mod index;
pub mod irq;
pub mod listing;
pub mod patch;
pub mod resolver;
pub mod sink;
pub mod ssdt;

pub use analyze::{analyze, Analysis, Conflict, SkippedRun};
pub use config::{FixConfig, MethodTag, DEFAULT_LEGACY_DEVICES, DEFAULT_TARGET_IRQS};
pub use error::{FixError, Result};
pub use index::{index_device_irqs, DeviceIrqIndex, DeviceIrqs};
pub use irq::{IrqGroup, IrqMask, IrqRun, Terminator, TerminatorPolicy};
pub use listing::Listing;
pub use patch::Patch;
