//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use folio_core::assembler::{self, AssembleOutcome};
use folio_core::pipeline::{self, OutputLayout, RunConfig, RunResult};
use folio_core::processor::ProgressReporter;
use folio_shared::{AppConfig, TransformKind, init_config, load_config, validate_config};
use folio_transform::{BridgeConfig, BridgeModel, Passthrough, SentenceChunked, TransformPort};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Folio: transform long documents block by block, resumably.
#[derive(Parser)]
#[command(
    name = "folio",
    version,
    about = "Transform a DOCX in checkpointed blocks and assemble the result.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Output directory override shared by most commands.
#[derive(clap::Args)]
pub(crate) struct OutputArgs {
    /// Directory holding blocks, checkpoint and final document.
    #[arg(short, long, env = "FOLIO_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Process a document, resuming from the last checkpoint.
    Run {
        /// Source DOCX.
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,

        /// Pages per block (overrides config).
        #[arg(long, env = "FOLIO_PAGES_PER_BLOCK")]
        pages_per_block: Option<usize>,

        /// Words per page (overrides config).
        #[arg(long, env = "FOLIO_WORDS_PER_PAGE")]
        words_per_page: Option<usize>,

        /// Discard the checkpoint and block artifacts first.
        #[arg(long)]
        fresh: bool,

        /// Copy text unchanged instead of calling the model.
        #[arg(long)]
        passthrough: bool,

        /// Rename the final document to `<input stem>_<timestamp>.docx`.
        #[arg(long)]
        relabel: bool,
    },

    /// Assemble the final document from the blocks already on disk.
    Assemble {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show the checkpoint and the blocks on disk.
    Status {
        #[command(flatten)]
        output: OutputArgs,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete the checkpoint and all block artifacts.
    Reset {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List assembled documents.
    List {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "folio=info",
        1 => "folio=debug",
        _ => "folio=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            input,
            output,
            pages_per_block,
            words_per_page,
            fresh,
            passthrough,
            relabel,
        } => cmd_run(RunArgs {
            input,
            output_dir: output.output_dir,
            pages_per_block,
            words_per_page,
            fresh,
            passthrough,
            relabel,
        }),
        Command::Assemble { output } => cmd_assemble(output.output_dir),
        Command::Status { output, json } => cmd_status(output.output_dir, json),
        Command::Reset { output } => cmd_reset(output.output_dir),
        Command::List { output } => cmd_list(output.output_dir),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Load the config file and fold in command-line overrides.
fn resolve_config(words_per_page: Option<usize>, pages_per_block: Option<usize>) -> Result<AppConfig> {
    let mut config = load_config()?;
    if let Some(words) = words_per_page {
        config.blocks.words_per_page = words;
    }
    if let Some(pages) = pages_per_block {
        config.blocks.pages_per_block = pages;
    }
    validate_config(&config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

struct RunArgs {
    input: PathBuf,
    output_dir: Option<PathBuf>,
    pages_per_block: Option<usize>,
    words_per_page: Option<usize>,
    fresh: bool,
    passthrough: bool,
    relabel: bool,
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let config = resolve_config(args.words_per_page, args.pages_per_block)?;

    if !args.input.is_file() {
        return Err(eyre!("input document '{}' not found", args.input.display()));
    }

    let layout = OutputLayout::from_config(&config, args.output_dir);
    let mut run_config = RunConfig::from_config(&config, args.input.clone(), layout);
    run_config.fresh = args.fresh;

    info!(
        input = %args.input.display(),
        output = %run_config.layout.output_dir.display(),
        threshold = run_config.sizing.threshold(),
        "processing document"
    );

    let mut transform = ActiveTransform::start(&config, args.passthrough)?;
    let reporter = CliProgress::new();

    let result = pipeline::run(&run_config, transform.port(), &reporter);
    reporter.finish();
    if let Err(e) = transform.shutdown() {
        warn!(error = %e, "transform shutdown failed");
    }

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            if e.is_recoverable() {
                eprintln!();
                eprintln!("  Progress has been saved. Run the same command again to resume.");
                eprintln!();
            }
            return Err(e.into());
        }
    };

    print_run_summary(&result);

    if args.relabel {
        if let AssembleOutcome::Produced(report) = &result.outcome {
            let stem = args
                .input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".into());
            let target = pipeline::relabel_final(
                &report.final_path,
                &stem,
                chrono::Local::now().naive_local(),
            )?;
            println!("  Saved as: {}", target.display());
            println!();
        }
    }

    Ok(())
}

fn print_run_summary(result: &RunResult) {
    let summary = &result.summary;
    println!();
    println!("  Run complete!");
    if !summary.resumed_from.is_start() {
        println!("  Resumed:    {}", summary.resumed_from);
    }
    println!("  Blocks:     {}", summary.blocks_written);
    println!("  Paragraphs: {}", summary.paragraphs_transformed);
    println!("  Checkpoint: {}", summary.final_checkpoint);
    if let AssembleOutcome::Produced(report) = &result.outcome {
        println!("  Output:     {}", report.final_path.display());
        if !report.cover_included {
            println!("  Cover:      (none)");
        }
    }
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

/// The transform selected by config or flags.
enum ActiveTransform {
    Bridge(SentenceChunked<BridgeModel>),
    Passthrough(Passthrough),
}

impl ActiveTransform {
    fn start(config: &AppConfig, force_passthrough: bool) -> Result<Self> {
        if force_passthrough || config.transform.kind == TransformKind::Passthrough {
            info!("using passthrough transform");
            return Ok(Self::Passthrough(Passthrough));
        }

        let bridge = BridgeModel::spawn(&BridgeConfig {
            command: config.transform.command.clone(),
            args: config.transform.args.clone(),
            working_dir: config.transform.working_dir.clone(),
            model: config.transform.model.clone(),
        })?;
        Ok(Self::Bridge(SentenceChunked::new(bridge)))
    }

    fn port(&mut self) -> &mut dyn TransformPort {
        match self {
            Self::Bridge(port) => port,
            Self::Passthrough(port) => port,
        }
    }

    fn shutdown(self) -> folio_shared::Result<()> {
        match self {
            Self::Bridge(port) => port.into_inner().shutdown(),
            Self::Passthrough(_) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using indicatif spinners.
struct CliProgress {
    spinner: ProgressBar,
    block: AtomicU32,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("template is compile-time constant")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self {
            spinner,
            block: AtomicU32::new(0),
        }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn block_started(&self, number: u32, paragraphs: usize) {
        self.block.store(number, Ordering::Relaxed);
        self.spinner
            .set_message(format!("Block {number} [0/{paragraphs}]"));
    }

    fn paragraph_transformed(&self, current: usize, total: usize) {
        let number = self.block.load(Ordering::Relaxed);
        self.spinner
            .set_message(format!("Block {number} [{current}/{total}]"));
    }

    fn block_committed(&self, number: u32, path: &Path) {
        self.spinner
            .println(format!("  ✓ block {number} → {}", path.display()));
    }
}

// ---------------------------------------------------------------------------
// Other commands
// ---------------------------------------------------------------------------

fn cmd_assemble(output_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let layout = OutputLayout::from_config(&config, output_dir);
    let source = pipeline::front_matter_source(&config);

    info!(output = %layout.output_dir.display(), "assembling from stored blocks");

    match assembler::assemble(
        &layout.block_store(),
        &source,
        true,
        &layout.assemble_options(),
    )? {
        AssembleOutcome::Produced(report) => {
            println!();
            println!("  Final document assembled!");
            println!("  Blocks:     {}", report.block_count);
            println!("  Paragraphs: {}", report.paragraph_count);
            println!("  Path:       {}", report.final_path.display());
            println!();
        }
        AssembleOutcome::Skipped => println!("Nothing assembled."),
    }
    Ok(())
}

fn cmd_status(output_dir: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config()?;
    let layout = OutputLayout::from_config(&config, output_dir);
    let status = pipeline::status(&layout)?;

    if json {
        let value = serde_json::json!({
            "output_dir": layout.output_dir.display().to_string(),
            "checkpoint": status.checkpoint.to_string(),
            "blocks": status.blocks,
            "final_document": status.final_document.as_ref().map(|p| p.display().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  Output:     {}", layout.output_dir.display());
    if status.checkpoint.is_start() {
        println!("  Checkpoint: (none)");
    } else {
        println!("  Checkpoint: {}", status.checkpoint);
    }
    match (status.blocks.first(), status.blocks.last()) {
        (Some(first), Some(last)) => {
            println!("  Blocks:     {} ({first}..={last})", status.blocks.len())
        }
        _ => println!("  Blocks:     0"),
    }
    if let Some(path) = &status.final_document {
        println!("  Final:      {}", path.display());
    }
    println!();
    Ok(())
}

fn cmd_reset(output_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let layout = OutputLayout::from_config(&config, output_dir);
    let report = pipeline::reset(&layout)?;
    println!(
        "Removed {} block(s){}.",
        report.blocks_removed,
        if report.had_checkpoint {
            " and the checkpoint"
        } else {
            ""
        }
    );
    Ok(())
}

fn cmd_list(output_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let layout = OutputLayout::from_config(&config, output_dir);
    let documents = pipeline::list_final_documents(&layout.output_dir)?;

    if documents.is_empty() {
        println!("No assembled documents in {}", layout.output_dir.display());
        return Ok(());
    }
    for path in documents {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
