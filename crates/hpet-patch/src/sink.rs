//! Bootloader patch documents (OpenCore and Clover `config.plist` fragments).
//!
//! Both formats describe the same patches; they differ only in field names and in how the
//! supplementary SSDT is declared.

use std::io::Write;

use plist::Data;
use serde::Serialize;

use crate::patch::Patch;
use crate::ssdt::SSDT_HPET_AML;

pub const OC_PLIST: &str = "patches_OC.plist";
pub const CLOVER_PLIST: &str = "patches_Clover.plist";

const SSDT_COMMENT: &str = "HPET _CRS (Needs _CRS to XCRS Rename)";

fn zero_signature() -> Data {
    Data::new(vec![0; 4])
}

/// OpenCore `ACPI > Patch` entry: applies anywhere, to every occurrence.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OcPatch {
    pub comment: String,
    pub count: u32,
    pub enabled: bool,
    pub find: Data,
    pub limit: u32,
    pub mask: Data,
    pub oem_table_id: Data,
    pub replace: Data,
    pub replace_mask: Data,
    pub skip: u32,
    pub table_length: u32,
    pub table_signature: Data,
}

impl From<&Patch> for OcPatch {
    fn from(patch: &Patch) -> Self {
        Self {
            comment: patch.label().to_string(),
            count: 0,
            enabled: true,
            find: Data::new(patch.find_bytes()),
            limit: 0,
            mask: Data::new(Vec::new()),
            oem_table_id: zero_signature(),
            replace: Data::new(patch.replace_bytes()),
            replace_mask: Data::new(Vec::new()),
            skip: 0,
            table_length: 0,
            table_signature: zero_signature(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OcAdd {
    pub comment: String,
    pub enabled: bool,
    pub path: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OcAcpi {
    pub add: Vec<OcAdd>,
    pub patch: Vec<OcPatch>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OcDocument {
    #[serde(rename = "ACPI")]
    pub acpi: OcAcpi,
}

impl OcDocument {
    pub fn new(patches: &[Patch]) -> Self {
        Self {
            acpi: OcAcpi {
                add: vec![OcAdd {
                    comment: SSDT_COMMENT.to_string(),
                    enabled: true,
                    path: SSDT_HPET_AML.to_string(),
                }],
                patch: patches.iter().map(OcPatch::from).collect(),
            },
        }
    }
}

/// Clover `ACPI > DSDT > Patches` entry.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CloverPatch {
    pub comment: String,
    pub disabled: bool,
    pub find: Data,
    pub replace: Data,
}

impl From<&Patch> for CloverPatch {
    fn from(patch: &Patch) -> Self {
        Self {
            comment: patch.label().to_string(),
            disabled: false,
            find: Data::new(patch.find_bytes()),
            replace: Data::new(patch.replace_bytes()),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CloverDsdt {
    pub patches: Vec<CloverPatch>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CloverAcpi {
    #[serde(rename = "DSDT")]
    pub dsdt: CloverDsdt,
    pub sorted_order: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CloverDocument {
    #[serde(rename = "ACPI")]
    pub acpi: CloverAcpi,
}

impl CloverDocument {
    pub fn new(patches: &[Patch]) -> Self {
        Self {
            acpi: CloverAcpi {
                dsdt: CloverDsdt {
                    patches: patches.iter().map(CloverPatch::from).collect(),
                },
                sorted_order: vec![SSDT_HPET_AML.to_string()],
            },
        }
    }
}

/// Serializes `doc` as an XML plist.
pub fn write_xml<W: Write, T: Serialize>(writer: W, doc: &T) -> Result<(), plist::Error> {
    plist::to_writer_xml(writer, doc)
}
