//! Host-side driver for the HPET `_CRS` fix.
//!
//! Locates the DSDT, obtains a mixed listing for it (either supplied or produced with `iasl`),
//! runs the `hpet-patch` analysis, and writes `SSDT-HPET.dsl` plus OpenCore and Clover patch
//! plists into an output directory.

pub mod iasl;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use hpet_patch::sink::{self, CloverDocument, OcDocument, CLOVER_PLIST, OC_PLIST};
use hpet_patch::ssdt::{self, SSDT_HPET_DSL};
use hpet_patch::{analyze, Analysis, FixConfig, Listing};
use serde::Serialize;
use tracing::info;

use crate::iasl::Iasl;

const DSDT_AML: &str = "DSDT.aml";

/// Options for one run of the tool.
#[derive(Debug, Clone)]
pub struct RunOpts {
    /// `DSDT.aml`, or a folder of dumped tables containing one.
    pub dsdt: PathBuf,
    /// Pre-generated mixed listing. When absent, `iasl` produces one.
    pub listing: Option<PathBuf>,
    pub out_dir: PathBuf,
    /// LPC bridge name the HPET lives under. Detected from the listing when absent.
    pub scope: Option<String>,
    pub iasl: Iasl,
    /// Whether to compile `SSDT-HPET.dsl` with `iasl`. `None` compiles only when `iasl` is
    /// already needed to produce the listing.
    pub compile: Option<bool>,
    pub config: FixConfig,
}

impl RunOpts {
    pub fn compiles_ssdt(&self) -> bool {
        self.compile.unwrap_or(self.listing.is_none())
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub analysis: Analysis,
    pub scope: String,
    pub outputs: Vec<PathBuf>,
}

/// Where the DSDT came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsdtSource {
    pub dsdt: PathBuf,
    /// Set when the user passed a folder of dumped tables; SSDTs in it help `iasl` resolve
    /// externals.
    pub origin: Option<PathBuf>,
}

pub fn locate_dsdt(path: &Path) -> Result<DsdtSource> {
    if path.is_dir() {
        let dsdt = path.join(DSDT_AML);
        if !dsdt.is_file() {
            bail!("could not locate {DSDT_AML} in {}", path.display());
        }
        return Ok(DsdtSource {
            dsdt,
            origin: Some(path.to_path_buf()),
        });
    }

    if !path.is_file() {
        bail!("could not find {}", path.display());
    }
    let is_dsdt = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.eq_ignore_ascii_case(DSDT_AML));
    if !is_dsdt {
        bail!("{} must be a {DSDT_AML}", path.display());
    }
    Ok(DsdtSource {
        dsdt: path.to_path_buf(),
        origin: None,
    })
}

/// Whether a file from a table dump folder should be staged next to the DSDT.
fn is_stageable_table(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    !lower.starts_with('.') && !lower.starts_with("ssdt-x") && lower.ends_with(".aml")
}

/// Copies the DSDT (and any companion SSDTs) into `temp`. Returns the staged DSDT and SSDTs.
pub fn stage_tables(source: &DsdtSource, temp: &Path) -> Result<(PathBuf, Vec<PathBuf>)> {
    let staged_dsdt = temp.join(DSDT_AML);
    fs::copy(&source.dsdt, &staged_dsdt)
        .with_context(|| format!("copy {} to {}", source.dsdt.display(), temp.display()))?;

    let mut ssdts = Vec::new();
    if let Some(origin) = &source.origin {
        let mut names = Vec::new();
        for entry in fs::read_dir(origin)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if is_stageable_table(name) && name.to_ascii_lowercase().starts_with("ssdt") {
                names.push(name.to_string());
            }
        }
        names.sort();

        for name in names {
            let dest = temp.join(&name);
            fs::copy(origin.join(&name), &dest)
                .with_context(|| format!("copy {name} to {}", temp.display()))?;
            info!("staged {name}");
            ssdts.push(dest);
        }
    }

    Ok((staged_dsdt, ssdts))
}

fn read_listing_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read listing {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn produce_listing(source: &DsdtSource, iasl: &Iasl) -> Result<String> {
    if !iasl.is_available() {
        bail!("`iasl` not found; install ACPICA or pass --listing");
    }

    let temp = tempfile::Builder::new()
        .prefix("fix-hpet-")
        .tempdir()
        .context("create temp dir")?;
    let (dsdt, ssdts) = stage_tables(source, temp.path())?;

    info!("creating a mixed listing file");
    let listing = iasl
        .decompile_listing(temp.path(), &dsdt, &ssdts)
        .with_context(|| format!("failed to decompile {}", source.dsdt.display()))?;
    read_listing_text(&listing)
}

fn write_plist<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    sink::write_xml(BufWriter::new(file), doc)
        .map_err(|e| anyhow!("write {}: {e}", path.display()))
}

pub fn run(opts: &RunOpts) -> Result<RunReport> {
    let source = locate_dsdt(&opts.dsdt)?;
    let table =
        fs::read(&source.dsdt).with_context(|| format!("read {}", source.dsdt.display()))?;

    let text = match &opts.listing {
        Some(path) => read_listing_text(path)?,
        None => produce_listing(&source, &opts.iasl)?,
    };

    info!("locating {} in the listing", opts.config.device);
    let listing = Listing::new(&text);
    let analysis = analyze(&listing, &table, &opts.config)
        .with_context(|| format!("analyze {}", source.dsdt.display()))?;

    let scope = match &opts.scope {
        Some(scope) => scope.clone(),
        None => ssdt::detect_scope(&text)
            .map(str::to_string)
            .context("could not locate LPCB or LPC in the DSDT; pass --scope with the device HPET is attached to")?,
    };
    let dsl = ssdt::render_ssdt(&scope, &opts.config)?;

    fs::create_dir_all(&opts.out_dir)
        .with_context(|| format!("create {}", opts.out_dir.display()))?;
    let mut outputs = Vec::new();

    let dsl_path = opts.out_dir.join(SSDT_HPET_DSL);
    info!("writing {SSDT_HPET_DSL} with scope _SB.PCI0.{scope}");
    fs::write(&dsl_path, dsl).with_context(|| format!("write {}", dsl_path.display()))?;
    outputs.push(dsl_path.clone());

    if opts.compiles_ssdt() {
        let aml = opts
            .iasl
            .compile(&dsl_path)
            .with_context(|| format!("failed to compile {SSDT_HPET_DSL}"))?;
        outputs.push(aml);
    }

    let oc_path = opts.out_dir.join(OC_PLIST);
    write_plist(&oc_path, &OcDocument::new(analysis.patches()))?;
    outputs.push(oc_path);

    let clover_path = opts.out_dir.join(CLOVER_PLIST);
    write_plist(&clover_path, &CloverDocument::new(analysis.patches()))?;
    outputs.push(clover_path);

    Ok(RunReport {
        analysis,
        scope,
        outputs,
    })
}
