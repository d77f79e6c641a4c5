use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fix_hpet::iasl::Iasl;
use fix_hpet::{run, RunOpts};
use hpet_patch::{FixConfig, MethodTag, DEFAULT_TARGET_IRQS};

#[derive(Debug, Parser)]
#[command(name = "fix_hpet")]
#[command(about = "Generate OpenCore/Clover patches and SSDT-HPET for the HPET IRQ fix")]
struct Cli {
    /// DSDT.aml, or a folder of dumped ACPI tables containing one.
    #[arg(long)]
    dsdt: PathBuf,

    /// Pre-generated mixed listing (`iasl -l`) of the DSDT. Skips running iasl.
    #[arg(long)]
    listing: Option<PathBuf>,

    /// Output directory.
    #[arg(long, default_value = "Results")]
    out: PathBuf,

    /// Device HPET is attached to (e.g. LPCB). Detected from the listing when omitted.
    #[arg(long)]
    scope: Option<String>,

    /// IRQs to free for the HPET.
    #[arg(
        long,
        value_delimiter = ',',
        value_parser = clap::value_parser!(u8).range(0..=15),
        default_values_t = DEFAULT_TARGET_IRQS
    )]
    irqs: Vec<u8>,

    /// Extra legacy device whose IRQs are nulled, on top of TMR, TIMR, IPIC and RTC. Repeatable.
    #[arg(long = "legacy")]
    legacy: Vec<String>,

    /// Name of the HPET device in the DSDT.
    #[arg(long, default_value = "HPET")]
    device: String,

    /// Resource method to replace, as a name (`_CRS`) or 8 hex digits (`5F435253`).
    #[arg(long, default_value = "_CRS")]
    method: MethodTag,

    /// New name for the DSDT's copy of the method, as a name or 8 hex digits.
    #[arg(long, default_value = "XCRS")]
    renamed_method: MethodTag,

    /// Largest number of matches a patch's find pattern may have in the DSDT.
    #[arg(long, default_value_t = 2)]
    max_occurrences: usize,

    /// iasl binary to run.
    #[arg(long, default_value = "iasl")]
    iasl: PathBuf,

    /// Compile SSDT-HPET.dsl with iasl. This is the default unless --listing is given.
    #[arg(long, overrides_with = "no_compile")]
    compile: bool,

    /// Only write SSDT-HPET.dsl, even when iasl is available.
    #[arg(long, overrides_with = "compile")]
    no_compile: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn to_opts(&self) -> RunOpts {
        let mut config = FixConfig {
            device: self.device.clone(),
            method: self.method,
            renamed_method: self.renamed_method,
            target_irqs: self.irqs.clone(),
            max_occurrences: self.max_occurrences,
            ..FixConfig::default()
        };
        for device in &self.legacy {
            if !config.is_legacy(device) {
                config.legacy_devices.push(device.clone());
            }
        }

        RunOpts {
            dsdt: self.dsdt.clone(),
            listing: self.listing.clone(),
            out_dir: self.out.clone(),
            scope: self.scope.clone(),
            iasl: Iasl::new(&self.iasl),
            compile: match (self.compile, self.no_compile) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            config,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let report = run(&cli.to_opts())?;

    for patch in report.analysis.patches() {
        println!("{}:", patch.label());
        println!("  Find:    {}", patch.find());
        println!("  Replace: {}", patch.replace());
    }
    for skipped in &report.analysis.skipped {
        eprintln!("warning: {skipped}");
    }
    for conflict in &report.analysis.conflicts {
        eprintln!("warning: {conflict}; it may need its own fix");
    }

    println!("scope: _SB.PCI0.{}", report.scope);
    for output in &report.outputs {
        println!("wrote: {}", output.display());
    }
    println!(
        "summary: {} patch(es), {} skipped run(s), {} conflict(s)",
        report.analysis.patches().len(),
        report.analysis.skipped.len(),
        report.analysis.conflicts.len()
    );

    Ok(())
}
