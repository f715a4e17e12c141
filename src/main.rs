use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use payroll_reconcile::{logging, run, Conversion, PipelineConfig, SourceFiles};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "payroll-reconcile")]
#[command(about = "Reconcile census, payroll and benefits-statement exports into one import table")]
#[command(version)]
struct Cli {
    /// Log debug detail (every name-match attempt)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the conversion and write the output CSV
    Convert {
        #[command(flatten)]
        sources: SourceArgs,

        /// Directory the output CSV is written to
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Also write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Run the conversion and print the summary without writing anything
    Preview {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Census export (CSV)
    #[arg(long)]
    census: PathBuf,

    /// Payroll export (CSV)
    #[arg(long)]
    payroll: PathBuf,

    /// Benefits statement with legal names and SSNs (HTML)
    #[arg(long)]
    identity_document: PathBuf,

    /// Contribution mapping and pipeline settings (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl SourceArgs {
    fn load(&self) -> Result<(SourceFiles, PipelineConfig)> {
        let config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        let sources = SourceFiles {
            census: self.census.clone(),
            payroll: self.payroll.clone(),
            identity_document: self.identity_document.clone(),
        };
        Ok((sources, config))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match cli.command {
        Commands::Convert {
            sources,
            output_dir,
            report,
        } => run_convert(&sources, &output_dir, report.as_deref()),
        Commands::Preview { sources } => run_preview(&sources),
    }
}

fn convert(args: &SourceArgs) -> Result<(Conversion, PipelineConfig)> {
    let (sources, config) = args.load()?;
    let conversion = run(&sources, &config).context("Conversion failed; no output written")?;
    Ok((conversion, config))
}

fn run_convert(args: &SourceArgs, output_dir: &Path, report: Option<&Path>) -> Result<()> {
    let (conversion, config) = convert(args)?;

    let output_path = conversion
        .write_outputs(output_dir, &config.output_prefix, report)
        .with_context(|| format!("Failed to write output into {}", output_dir.display()))?;

    print_summary(&conversion);
    println!("✓ Output: {}", output_path.display());
    if let Some(report_path) = report {
        println!("✓ Report: {}", report_path.display());
    }
    Ok(())
}

fn run_preview(args: &SourceArgs) -> Result<()> {
    let (conversion, config) = convert(args)?;
    print_summary(&conversion);
    println!("Would write: {}", conversion.file_name(&config.output_prefix));
    Ok(())
}

fn print_summary(conversion: &Conversion) {
    println!("{}", conversion.report.summary());
    if !conversion.report.unresolved_names.is_empty() {
        println!("⚠️  Unresolved names (SSN pairing is a best guess):");
        for name in &conversion.report.unresolved_names {
            println!("   - {}", name);
        }
    }
}
