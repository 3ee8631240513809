//! Block processor: segment → transform → persist → checkpoint.
//!
//! A block's checkpoint is only advanced once its artifact is on disk. A crash
//! anywhere inside a block leaves the previous checkpoint in place and the
//! block is redone from its first paragraph on the next run.

use std::path::Path;

use tracing::{error, info, instrument};

use folio_shared::{ArtifactParagraph, Block, BlockArtifact, Checkpoint, Paragraph, Result};
use folio_storage::{BlockStore, CheckpointStore};
use folio_transform::TransformPort;

use crate::segmenter::Segmenter;

/// Knobs for one processing pass.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    /// Words a block must reach before it closes.
    pub threshold: usize,
    /// Largest input the transform may take in one piece.
    pub max_unit_length: usize,
}

/// What a processing pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub blocks_written: usize,
    pub paragraphs_transformed: usize,
    /// Checkpoint found when the pass started.
    pub resumed_from: Checkpoint,
    /// Checkpoint after the last committed block.
    pub final_checkpoint: Checkpoint,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a block's paragraphs are transformed.
    fn block_started(&self, number: u32, paragraphs: usize);
    /// Called after each paragraph of the current block.
    fn paragraph_transformed(&self, current: usize, total: usize);
    /// Called once a block's artifact and checkpoint are both durable.
    fn block_committed(&self, number: u32, path: &Path);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn block_started(&self, _number: u32, _paragraphs: usize) {}
    fn paragraph_transformed(&self, _current: usize, _total: usize) {}
    fn block_committed(&self, _number: u32, _path: &Path) {}
}

/// Process every block after the stored checkpoint.
///
/// Stops at the first failure. Blocks committed before the failure stay
/// committed.
#[instrument(skip_all, fields(paragraphs = paragraphs.len(), threshold = options.threshold))]
pub fn process(
    paragraphs: &[Paragraph],
    transform: &mut dyn TransformPort,
    checkpoints: &mut dyn CheckpointStore,
    blocks: &BlockStore,
    options: &ProcessOptions,
    progress: &dyn ProgressReporter,
) -> Result<ProcessSummary> {
    let resumed_from = checkpoints.read();
    if resumed_from.is_start() {
        info!("starting from the first paragraph");
    } else {
        info!(checkpoint = %resumed_from, "resuming from checkpoint");
    }

    let mut summary = ProcessSummary {
        blocks_written: 0,
        paragraphs_transformed: 0,
        resumed_from,
        final_checkpoint: resumed_from,
    };

    progress.phase("Transforming blocks");
    for block in Segmenter::new(paragraphs, resumed_from, options.threshold) {
        progress.block_started(block.number, block.paragraphs.len());

        let (artifact, transformed) =
            transform_block(&block, transform, options.max_unit_length, progress)?;
        let path = blocks.persist(&artifact)?;

        let checkpoint = Checkpoint::after(&block);
        checkpoints.write(checkpoint)?;

        info!(
            block = block.number,
            words = block.word_count,
            paragraphs = block.paragraphs.len(),
            %checkpoint,
            "block committed"
        );
        progress.block_committed(block.number, &path);

        summary.blocks_written += 1;
        summary.paragraphs_transformed += transformed;
        summary.final_checkpoint = checkpoint;
    }

    info!(
        blocks = summary.blocks_written,
        paragraphs = summary.paragraphs_transformed,
        checkpoint = %summary.final_checkpoint,
        "processing complete"
    );
    Ok(summary)
}

/// Transform one block's paragraphs. Blank paragraphs are copied as-is.
fn transform_block(
    block: &Block,
    transform: &mut dyn TransformPort,
    max_unit_length: usize,
    progress: &dyn ProgressReporter,
) -> Result<(BlockArtifact, usize)> {
    let total = block.paragraphs.len();
    let mut out = Vec::with_capacity(total);
    let mut transformed = 0;

    for (i, paragraph) in block.paragraphs.iter().enumerate() {
        let text = if paragraph.is_blank() {
            paragraph.text.clone()
        } else {
            transformed += 1;
            transform
                .transform(&paragraph.text, max_unit_length)
                .inspect_err(|e| {
                    error!(
                        block = block.number,
                        paragraph = paragraph.index,
                        error = %e,
                        "transform failed"
                    );
                })?
        };

        out.push(ArtifactParagraph {
            text,
            style: paragraph.style.clone(),
        });
        progress.paragraph_transformed(i + 1, total);
    }

    Ok((
        BlockArtifact {
            number: block.number,
            paragraphs: out,
        },
        transformed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use folio_shared::FolioError;
    use folio_storage::FileCheckpointStore;
    use folio_transform::Passthrough;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("folio-process-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn doc(word_counts: &[usize]) -> Vec<Paragraph> {
        word_counts
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let text = (0..n).map(|w| format!("p{i}w{w}")).collect::<Vec<_>>().join(" ");
                Paragraph::new(i, text, Some("Normal".into()))
            })
            .collect()
    }

    /// Uppercases, and fails once `fail_after` calls have succeeded.
    #[derive(Default)]
    struct Upper {
        calls: usize,
        fail_after: Option<usize>,
        seen: Vec<String>,
    }

    impl TransformPort for Upper {
        fn transform(&mut self, text: &str, _max: usize) -> Result<String> {
            if self.fail_after.is_some_and(|n| self.calls >= n) {
                return Err(FolioError::Transform("model went away".into()));
            }
            self.calls += 1;
            self.seen.push(text.to_string());
            Ok(text.to_uppercase())
        }
    }

    const OPTIONS: ProcessOptions = ProcessOptions {
        threshold: 10,
        max_unit_length: 512,
    };

    #[test]
    fn writes_every_block_and_final_checkpoint() {
        let tmp = temp_dir();
        let store = BlockStore::new(&tmp);
        let mut checkpoints = FileCheckpointStore::new(tmp.join("checkpoint.txt"));
        let paragraphs = doc(&[6, 6, 6, 6, 3]);

        let summary = process(
            &paragraphs,
            &mut Upper::default(),
            &mut checkpoints,
            &store,
            &OPTIONS,
            &SilentProgress,
        )
        .unwrap();

        assert_eq!(summary.blocks_written, 3);
        assert_eq!(summary.paragraphs_transformed, 5);
        assert_eq!(summary.resumed_from, Checkpoint::START);
        assert_eq!(summary.final_checkpoint.to_string(), "4,4");
        assert_eq!(checkpoints.read().to_string(), "4,4");

        let numbers: Vec<u32> = store.discover().unwrap().iter().map(|b| b.number).collect();
        assert_eq!(numbers, [1, 2, 3]);

        let first = store.load(&store.discover().unwrap()[0]).unwrap();
        assert_eq!(first.paragraphs[0].text, paragraphs[0].text.to_uppercase());
        assert_eq!(first.paragraphs[0].style.as_deref(), Some("Normal"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn failure_keeps_committed_blocks_and_checkpoint() {
        let tmp = temp_dir();
        let store = BlockStore::new(&tmp);
        let mut checkpoints = FileCheckpointStore::new(tmp.join("checkpoint.txt"));
        let paragraphs = doc(&[10, 10, 10, 10]);

        let mut failing = Upper {
            fail_after: Some(2),
            ..Default::default()
        };
        let err = process(
            &paragraphs,
            &mut failing,
            &mut checkpoints,
            &store,
            &OPTIONS,
            &SilentProgress,
        )
        .unwrap_err();

        assert!(matches!(err, FolioError::Transform(_)));
        assert_eq!(checkpoints.read().to_string(), "1,3");
        assert_eq!(store.discover().unwrap().len(), 2);
        assert!(!store.path_for(3).exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn resume_transforms_only_remaining_paragraphs() {
        let tmp = temp_dir();
        let store = BlockStore::new(&tmp);
        let mut checkpoints = FileCheckpointStore::new(tmp.join("checkpoint.txt"));
        let paragraphs = doc(&[10, 10, 10, 10]);

        let mut failing = Upper {
            fail_after: Some(1),
            ..Default::default()
        };
        assert!(
            process(&paragraphs, &mut failing, &mut checkpoints, &store, &OPTIONS, &SilentProgress)
                .is_err()
        );

        let mut healthy = Upper::default();
        let summary = process(
            &paragraphs,
            &mut healthy,
            &mut checkpoints,
            &store,
            &OPTIONS,
            &SilentProgress,
        )
        .unwrap();

        assert_eq!(summary.resumed_from.to_string(), "0,2");
        assert_eq!(summary.blocks_written, 3);
        assert_eq!(healthy.seen.len(), 3);
        assert_eq!(healthy.seen[0], paragraphs[1].text);
        assert_eq!(checkpoints.read().to_string(), "3,5");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn block_persisted_before_crash_is_rewritten_on_resume() {
        let paragraphs = doc(&[10, 10, 10, 10]);

        let single_dir = temp_dir();
        let single_store = BlockStore::new(&single_dir);
        let mut single_checkpoints = FileCheckpointStore::new(single_dir.join("checkpoint.txt"));
        process(
            &paragraphs,
            &mut Upper::default(),
            &mut single_checkpoints,
            &single_store,
            &OPTIONS,
            &SilentProgress,
        )
        .unwrap();

        let tmp = temp_dir();
        let store = BlockStore::new(&tmp);
        let mut checkpoints = FileCheckpointStore::new(tmp.join("checkpoint.txt"));
        let mut failing = Upper {
            fail_after: Some(1),
            ..Default::default()
        };
        assert!(
            process(&paragraphs, &mut failing, &mut checkpoints, &store, &OPTIONS, &SilentProgress)
                .is_err()
        );
        // Block 2 reached disk but the process died before its checkpoint.
        store
            .persist(&BlockArtifact {
                number: 2,
                paragraphs: vec![ArtifactParagraph {
                    text: "half written".into(),
                    style: None,
                }],
            })
            .unwrap();
        assert_eq!(checkpoints.read().to_string(), "0,2");

        let mut healthy = Upper::default();
        process(&paragraphs, &mut healthy, &mut checkpoints, &store, &OPTIONS, &SilentProgress)
            .unwrap();

        assert_eq!(healthy.seen[0], paragraphs[1].text);
        assert_eq!(checkpoints.read(), single_checkpoints.read());

        let resumed = store.discover().unwrap();
        let single = single_store.discover().unwrap();
        let numbers: Vec<u32> = resumed.iter().map(|b| b.number).collect();
        assert_eq!(numbers, single.iter().map(|b| b.number).collect::<Vec<_>>());
        for (ours, theirs) in resumed.iter().zip(&single) {
            assert_eq!(store.load(ours).unwrap(), single_store.load(theirs).unwrap());
        }

        let _ = std::fs::remove_dir_all(&tmp);
        let _ = std::fs::remove_dir_all(&single_dir);
    }

    #[test]
    fn blank_paragraphs_bypass_the_transform() {
        let tmp = temp_dir();
        let store = BlockStore::new(&tmp);
        let mut checkpoints = FileCheckpointStore::new(tmp.join("checkpoint.txt"));
        let paragraphs = vec![
            Paragraph::new(0, "hello world", Some("Heading1".into())),
            Paragraph::new(1, "   ", Some("Spacer".into())),
            Paragraph::new(2, "", None),
        ];

        let mut upper = Upper::default();
        let summary = process(
            &paragraphs,
            &mut upper,
            &mut checkpoints,
            &store,
            &OPTIONS,
            &SilentProgress,
        )
        .unwrap();

        assert_eq!(upper.seen, ["hello world"]);
        assert_eq!(summary.paragraphs_transformed, 1);

        let artifact = store.load(&store.discover().unwrap()[0]).unwrap();
        let texts: Vec<(&str, Option<&str>)> = artifact
            .paragraphs
            .iter()
            .map(|p| (p.text.as_str(), p.style.as_deref()))
            .collect();
        assert_eq!(
            texts,
            [
                ("HELLO WORLD", Some("Heading1")),
                ("   ", Some("Spacer")),
                ("", None)
            ]
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn completed_document_processes_nothing() {
        let tmp = temp_dir();
        let store = BlockStore::new(&tmp);
        let mut checkpoints = FileCheckpointStore::new(tmp.join("checkpoint.txt"));
        let paragraphs = doc(&[10, 10]);

        process(&paragraphs, &mut Passthrough, &mut checkpoints, &store, &OPTIONS, &SilentProgress)
            .unwrap();
        let again = process(
            &paragraphs,
            &mut Upper {
                fail_after: Some(0),
                ..Default::default()
            },
            &mut checkpoints,
            &store,
            &OPTIONS,
            &SilentProgress,
        )
        .unwrap();

        assert_eq!(again.blocks_written, 0);
        assert_eq!(again.resumed_from, again.final_checkpoint);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_document_writes_nothing() {
        let tmp = temp_dir();
        let store = BlockStore::new(&tmp);
        let mut checkpoints = FileCheckpointStore::new(tmp.join("checkpoint.txt"));

        let summary =
            process(&[], &mut Passthrough, &mut checkpoints, &store, &OPTIONS, &SilentProgress)
                .unwrap();

        assert_eq!(summary.blocks_written, 0);
        assert!(!tmp.join("checkpoint.txt").exists());
        assert!(store.discover().unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
