//! Thin wrapper around the ACPICA `iasl` compiler/disassembler.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;

/// One-line status followed by whichever of stdout/stderr had content, trailing blank lines
/// trimmed.
fn failure_message(program: &Path, output: &Output) -> String {
    let mut msg = format!("`{}` failed ({})", program.display(), output.status);
    for (stream, bytes) in [("stdout", &output.stdout), ("stderr", &output.stderr)] {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_end();
        if !text.is_empty() {
            msg.push_str(&format!("\n{stream}:\n{text}"));
        }
    }
    msg
}

#[derive(Debug, Clone)]
pub struct Iasl {
    program: PathBuf,
}

impl Iasl {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(
            Command::new(&self.program).arg("-v").output(),
            Err(err) if err.kind() == io::ErrorKind::NotFound
        )
    }

    fn run<S: AsRef<OsStr>>(&self, current_dir: &Path, args: &[S]) -> Result<()> {
        debug!(program = %self.program.display(), dir = %current_dir.display(), "running iasl");
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(current_dir)
            .output()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;
        if !output.status.success() {
            bail!(failure_message(&self.program, &output));
        }
        Ok(())
    }

    /// Disassembles `dsdt` (resolving externals against `ssdts`) into a mixed listing and returns
    /// the path of the generated `.dsl`.
    ///
    /// All tables must already live in `dir`.
    pub fn decompile_listing(&self, dir: &Path, dsdt: &Path, ssdts: &[PathBuf]) -> Result<PathBuf> {
        let mut args: Vec<&OsStr> = vec![
            OsStr::new("-da"),
            OsStr::new("-dl"),
            OsStr::new("-l"),
        ];
        args.push(dsdt.file_name().context("DSDT path has no file name")?);
        for ssdt in ssdts {
            args.push(ssdt.file_name().context("SSDT path has no file name")?);
        }
        self.run(dir, args.as_slice())?;

        let listing = dsdt.with_extension("dsl");
        if !listing.exists() {
            return Err(anyhow!(
                "iasl did not produce {} (temp dir: {})",
                listing.display(),
                dir.display()
            ));
        }
        Ok(listing)
    }

    /// Compiles `dsl` next to itself and returns the `.aml` path.
    pub fn compile(&self, dsl: &Path) -> Result<PathBuf> {
        let dir = dsl.parent().unwrap_or_else(|| Path::new("."));
        let name = dsl.file_name().context("DSL path has no file name")?;
        self.run(dir, &[name])?;

        let aml = dsl.with_extension("aml");
        if !aml.exists() {
            bail!("iasl did not produce {}", aml.display());
        }
        Ok(aml)
    }
}
