//! Final document assembler.
//!
//! Merges the block artifacts of a finished run into one document:
//!
//! ```text
//! [cover picture, page break]     (only when the cover is usable)
//! title 1 .. title n               (each at its own point size)
//! page break
//! block 1 paragraphs .. block N paragraphs
//! footer: PAGE field
//! ```
//!
//! A `manifest.json` describing the inputs is written next to the result.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use folio_docx::DocxBuilder;
use folio_shared::{FolioError, FrontMatter, FrontMatterDescriptor, Result};
use folio_storage::{BlockStore, StoredBlock};

/// Cover pictures are scaled to this width.
pub const COVER_WIDTH_INCHES: f64 = 8.0;

/// Where the front matter comes from.
#[derive(Debug, Clone)]
pub struct FrontMatterSource {
    /// JSON file with the `titles` list. Required.
    pub descriptor: PathBuf,
    /// Cover image. Optional; a missing file only costs the cover page.
    pub cover_image: Option<PathBuf>,
}

impl FrontMatterSource {
    /// Load the titles and check whether the cover exists.
    pub fn load(&self) -> Result<FrontMatter> {
        let content = std::fs::read_to_string(&self.descriptor).map_err(|e| {
            FolioError::front_matter(format!(
                "cannot read titles descriptor {}: {e}",
                self.descriptor.display()
            ))
        })?;
        let descriptor: FrontMatterDescriptor = serde_json::from_str(&content).map_err(|e| {
            FolioError::front_matter(format!(
                "invalid titles descriptor {}: {e}",
                self.descriptor.display()
            ))
        })?;

        if descriptor.titles.is_empty() {
            return Err(FolioError::front_matter(format!(
                "titles descriptor {} lists no titles",
                self.descriptor.display()
            )));
        }

        let cover_image = match &self.cover_image {
            Some(path) if path.is_file() => Some(path.clone()),
            Some(path) => {
                warn!(path = %path.display(), "cover image not found, assembling without cover");
                None
            }
            None => None,
        };

        Ok(FrontMatter {
            titles: descriptor.titles,
            cover_image,
        })
    }
}

/// Where the final document goes.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub output_dir: PathBuf,
    /// File name of the final document inside `output_dir`.
    pub final_file: String,
}

/// Metadata for one block that went into the final document.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BlockMeta {
    pub number: u32,
    pub file: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub paragraphs: usize,
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AssemblyManifest {
    pub run_id: String,
    pub assembled_at: DateTime<Utc>,
    pub final_file: String,
    pub titles: usize,
    pub cover_image: Option<String>,
    pub blocks: Vec<BlockMeta>,
}

/// Output from a successful assembly.
#[derive(Debug, Clone)]
pub struct AssembleReport {
    pub final_path: PathBuf,
    pub block_count: usize,
    pub paragraph_count: usize,
    pub cover_included: bool,
    pub manifest: AssemblyManifest,
}

/// What [`assemble`] did.
#[derive(Debug, Clone)]
pub enum AssembleOutcome {
    /// The run did not succeed; nothing was written.
    Skipped,
    Produced(AssembleReport),
}

impl AssembleOutcome {
    pub fn is_produced(&self) -> bool {
        matches!(self, Self::Produced(_))
    }
}

/// Assemble the final document, if `run_succeeded`.
///
/// With the gate closed this is a no-op that returns [`AssembleOutcome::Skipped`].
#[instrument(skip_all, fields(dir = %blocks.dir().display(), run_succeeded = run_succeeded))]
pub fn assemble(
    blocks: &BlockStore,
    front_matter: &FrontMatterSource,
    run_succeeded: bool,
    options: &AssembleOptions,
) -> Result<AssembleOutcome> {
    if !run_succeeded {
        info!("run did not complete, final document not assembled");
        return Ok(AssembleOutcome::Skipped);
    }

    let front = front_matter.load()?;
    let stored = blocks.discover()?;
    check_contiguous(&stored)?;

    info!(blocks = stored.len(), titles = front.titles.len(), "assembling final document");

    let mut doc = DocxBuilder::new();
    let cover_included = add_cover(&mut doc, front.cover_image.as_deref());

    for title in &front.titles {
        doc.sized_paragraph(&title.text, title.size);
    }
    doc.page_break();

    let mut metas = Vec::with_capacity(stored.len());
    let mut paragraph_count = 0;
    for block in &stored {
        let artifact = blocks.load(block)?;
        for paragraph in &artifact.paragraphs {
            doc.paragraph(&paragraph.text, paragraph.style.as_deref());
        }
        paragraph_count += artifact.paragraphs.len();
        metas.push(block_meta(block, artifact.paragraphs.len())?);
    }
    doc.page_number_footer();

    std::fs::create_dir_all(&options.output_dir)
        .map_err(|e| FolioError::io(&options.output_dir, e))?;
    let final_path = options.output_dir.join(&options.final_file);
    let temp = options.output_dir.join(format!(".{}.tmp", options.final_file));

    // Write to temp file first
    doc.write(&temp)?;

    // Atomic rename
    std::fs::rename(&temp, &final_path).map_err(|e| FolioError::io(&final_path, e))?;

    let manifest = AssemblyManifest {
        run_id: uuid::Uuid::now_v7().to_string(),
        assembled_at: Utc::now(),
        final_file: options.final_file.clone(),
        titles: front.titles.len(),
        cover_image: front
            .cover_image
            .as_ref()
            .filter(|_| cover_included)
            .map(|p| p.display().to_string()),
        blocks: metas,
    };
    write_json(&options.output_dir.join("manifest.json"), &manifest)?;

    info!(
        path = %final_path.display(),
        blocks = stored.len(),
        paragraphs = paragraph_count,
        cover = cover_included,
        "final document assembled"
    );

    Ok(AssembleOutcome::Produced(AssembleReport {
        final_path,
        block_count: stored.len(),
        paragraph_count,
        cover_included,
        manifest,
    }))
}

/// Block numbers must run 1, 2, .., N with nothing missing.
fn check_contiguous(stored: &[StoredBlock]) -> Result<()> {
    for (expected, block) in (1u32..).zip(stored) {
        if block.number != expected {
            return Err(FolioError::validation(format!(
                "block {expected} is missing (found block {} at {})",
                block.number,
                block.path.display()
            )));
        }
    }
    Ok(())
}

/// Add the cover picture and its page break. Returns whether it was added.
fn add_cover(doc: &mut DocxBuilder, cover: Option<&Path>) -> bool {
    let Some(path) = cover else {
        return false;
    };
    match doc.picture(path, COVER_WIDTH_INCHES) {
        Ok(doc) => {
            doc.page_break();
            true
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cover image unusable, assembling without cover");
            false
        }
    }
}

fn block_meta(block: &StoredBlock, paragraphs: usize) -> Result<BlockMeta> {
    let bytes = std::fs::read(&block.path).map_err(|e| FolioError::io(&block.path, e))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let hash = format!("{:x}", hasher.finalize());

    Ok(BlockMeta {
        number: block.number,
        file: block
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        sha256: hash,
        size_bytes: bytes.len() as u64,
        paragraphs,
    })
}

/// Write a JSON file (pretty-printed).
fn write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| FolioError::validation(format!("JSON serialization failed: {e}")))?;
    std::fs::write(path, json).map_err(|e| FolioError::io(path, e))?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}
