//! End-to-end `run` pipeline: load → process blocks → assemble.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use tracing::{error, info, instrument, warn};

use folio_shared::{AppConfig, BlockSizing, Checkpoint, FolioError, Result, checkpoint_path};
use folio_storage::{BlockStore, CheckpointStore, FileCheckpointStore, parse_block_number};
use folio_transform::TransformPort;

use crate::assembler::{self, AssembleOptions, AssembleOutcome, FrontMatterSource};
use crate::document::load_paragraphs;
use crate::processor::{self, ProcessOptions, ProcessSummary, ProgressReporter};

/// Where a run keeps its state and results.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub output_dir: PathBuf,
    /// Checkpoint file, relative to `output_dir` unless absolute.
    pub checkpoint_file: String,
    pub final_file: String,
}

impl OutputLayout {
    pub fn from_config(config: &AppConfig, output_dir: Option<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir)),
            checkpoint_file: config.defaults.checkpoint_file.clone(),
            final_file: config.defaults.final_file.clone(),
        }
    }

    pub fn block_store(&self) -> BlockStore {
        BlockStore::new(&self.output_dir)
    }

    pub fn checkpoint_store(&self) -> FileCheckpointStore {
        FileCheckpointStore::new(checkpoint_path(&self.output_dir, &self.checkpoint_file))
    }

    pub fn final_path(&self) -> PathBuf {
        self.output_dir.join(&self.final_file)
    }

    pub fn assemble_options(&self) -> AssembleOptions {
        AssembleOptions {
            output_dir: self.output_dir.clone(),
            final_file: self.final_file.clone(),
        }
    }
}

/// Configuration for the `run` pipeline.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Source DOCX.
    pub input: PathBuf,
    pub layout: OutputLayout,
    pub sizing: BlockSizing,
    pub max_unit_length: usize,
    /// Drop the checkpoint and all block artifacts before starting.
    pub fresh: bool,
    pub front_matter: FrontMatterSource,
}

impl RunConfig {
    pub fn from_config(config: &AppConfig, input: PathBuf, layout: OutputLayout) -> Self {
        Self {
            input,
            layout,
            sizing: BlockSizing::from(config),
            max_unit_length: config.transform.max_unit_length,
            fresh: false,
            front_matter: front_matter_source(config),
        }
    }
}

/// Front matter locations from the config file.
pub fn front_matter_source(config: &AppConfig) -> FrontMatterSource {
    let cover = &config.front_matter.cover_image;
    FrontMatterSource {
        descriptor: PathBuf::from(&config.front_matter.descriptor),
        cover_image: (!cover.is_empty()).then(|| PathBuf::from(cover)),
    }
}

/// Result of the `run` pipeline.
#[derive(Debug)]
pub struct RunResult {
    pub summary: ProcessSummary,
    pub outcome: AssembleOutcome,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Run the full pipeline.
///
/// 1. Load the source paragraphs
/// 2. Process every block after the checkpoint
/// 3. Assemble the final document, gated on step 2 succeeding
///
/// When processing fails the assembler is still consulted (and declines), and
/// the processing error is returned.
#[instrument(skip_all, fields(input = %config.input.display(), output = %config.layout.output_dir.display()))]
pub fn run(
    config: &RunConfig,
    transform: &mut dyn TransformPort,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    let blocks = config.layout.block_store();
    let mut checkpoints = config.layout.checkpoint_store();

    info!(
        threshold = config.sizing.threshold(),
        fresh = config.fresh,
        "starting run"
    );

    if config.fresh {
        progress.phase("Resetting previous progress");
        reset_stores(&blocks, &mut checkpoints)?;
    }

    progress.phase("Loading document");
    let options = ProcessOptions {
        threshold: config.sizing.threshold(),
        max_unit_length: config.max_unit_length,
    };
    let processed = load_paragraphs(&config.input).and_then(|paragraphs| {
        processor::process(
            &paragraphs,
            transform,
            &mut checkpoints,
            &blocks,
            &options,
            progress,
        )
    });

    progress.phase("Assembling final document");
    let summary = match processed {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "processing failed, progress kept for the next run");
            assembler::assemble(
                &blocks,
                &config.front_matter,
                false,
                &config.layout.assemble_options(),
            )?;
            return Err(e);
        }
    };

    let outcome = assembler::assemble(
        &blocks,
        &config.front_matter,
        true,
        &config.layout.assemble_options(),
    )?;

    let elapsed = start.elapsed();
    info!(
        blocks = summary.blocks_written,
        elapsed_ms = elapsed.as_millis(),
        "run complete"
    );

    Ok(RunResult {
        summary,
        outcome,
        elapsed,
    })
}

/// What [`reset`] removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    pub blocks_removed: usize,
    pub had_checkpoint: bool,
}

/// Forget all progress: the checkpoint and every block artifact.
///
/// The final document, if any, is left alone.
pub fn reset(layout: &OutputLayout) -> Result<ResetReport> {
    let blocks = layout.block_store();
    let mut checkpoints = layout.checkpoint_store();
    reset_stores(&blocks, &mut checkpoints)
}

fn reset_stores(blocks: &BlockStore, checkpoints: &mut FileCheckpointStore) -> Result<ResetReport> {
    let had_checkpoint = checkpoints.path().exists();
    // Checkpoint first: a crash in between must not leave it pointing past
    // artifacts that no longer exist.
    checkpoints.clear()?;
    let blocks_removed = blocks.clear()?;
    info!(blocks_removed, had_checkpoint, "progress reset");
    Ok(ResetReport {
        blocks_removed,
        had_checkpoint,
    })
}

/// Snapshot of an output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatus {
    pub checkpoint: Checkpoint,
    /// Block numbers found on disk, ascending.
    pub blocks: Vec<u32>,
    /// The final document, if one has been assembled.
    pub final_document: Option<PathBuf>,
}

/// Current checkpoint plus what is on disk.
pub fn status(layout: &OutputLayout) -> Result<RunStatus> {
    let checkpoint = layout.checkpoint_store().read();
    let blocks = layout
        .block_store()
        .discover()?
        .into_iter()
        .map(|b| b.number)
        .collect();
    let final_path = layout.final_path();

    Ok(RunStatus {
        checkpoint,
        blocks,
        final_document: final_path.is_file().then_some(final_path),
    })
}

/// Rename an assembled document to `<source_stem>_<YYYYmmdd_HHMMSS>.docx`.
pub fn relabel_final(
    final_path: &Path,
    source_stem: &str,
    timestamp: NaiveDateTime,
) -> Result<PathBuf> {
    if !final_path.is_file() {
        return Err(FolioError::validation(format!(
            "no final document at {}",
            final_path.display()
        )));
    }

    let name = format!("{source_stem}_{}.docx", timestamp.format("%Y%m%d_%H%M%S"));
    let target = final_path.with_file_name(name);
    if target.exists() {
        warn!(path = %target.display(), "replacing existing document");
    }

    std::fs::rename(final_path, &target).map_err(|e| FolioError::io(&target, e))?;
    info!(from = %final_path.display(), to = %target.display(), "final document relabeled");
    Ok(target)
}

/// Documents in `output_dir` that are not block artifacts, sorted by name.
pub fn list_final_documents(output_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(FolioError::io(output_dir, e)),
    };

    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FolioError::io(output_dir, e))?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if name.starts_with('.') || !name.ends_with(".docx") || parse_block_number(&name).is_some()
        {
            continue;
        }
        documents.push(entry.path());
    }

    documents.sort();
    Ok(documents)
}
