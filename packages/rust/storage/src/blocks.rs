//! Block artifact storage.
//!
//! Each block is one DOCX named `translated_block_<N>.docx`. Consumers order
//! artifacts by the parsed `<N>`, never by file name: lexical order would put
//! `translated_block_10` before `translated_block_2`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use folio_docx::DocxBuilder;
use folio_shared::{ArtifactParagraph, BlockArtifact, FolioError, Result};

const BLOCK_PREFIX: &str = "translated_block_";
const BLOCK_EXTENSION: &str = "docx";

static BLOCK_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^translated_block_(\d+)\.docx$").expect("block name pattern is valid")
});

/// File name for block `number`.
pub fn block_file_name(number: u32) -> String {
    format!("{BLOCK_PREFIX}{number}.{BLOCK_EXTENSION}")
}

/// Block number embedded in an artifact file name, if it is one.
pub fn parse_block_number(file_name: &str) -> Option<u32> {
    BLOCK_NAME
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// A block artifact found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlock {
    pub number: u32,
    pub path: PathBuf,
}

/// Block artifacts inside one output directory.
#[derive(Debug, Clone)]
pub struct BlockStore {
    dir: PathBuf,
}

impl BlockStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the artifact for block `number` lives at.
    pub fn path_for(&self, number: u32) -> PathBuf {
        self.dir.join(block_file_name(number))
    }

    /// Write `artifact` so that it becomes visible all at once.
    ///
    /// The document is written to a dot-prefixed temp file and renamed into
    /// place. An existing artifact for the same block is replaced.
    pub fn persist(&self, artifact: &BlockArtifact) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| FolioError::io(&self.dir, e))?;

        let mut doc = DocxBuilder::new();
        for paragraph in &artifact.paragraphs {
            doc.paragraph(&paragraph.text, paragraph.style.as_deref());
        }

        let target = self.path_for(artifact.number);
        let temp = self
            .dir
            .join(format!(".{}.tmp", block_file_name(artifact.number)));

        doc.write(&temp)?;
        std::fs::rename(&temp, &target).map_err(|e| FolioError::io(&target, e))?;

        debug!(
            block = artifact.number,
            paragraphs = artifact.paragraphs.len(),
            path = %target.display(),
            "persisted block artifact"
        );
        Ok(target)
    }

    /// All block artifacts, ordered by block number.
    pub fn discover(&self) -> Result<Vec<StoredBlock>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FolioError::io(&self.dir, e)),
        };

        let mut blocks = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FolioError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(number) = name.to_str().and_then(parse_block_number) else {
                continue;
            };
            blocks.push(StoredBlock {
                number,
                path: entry.path(),
            });
        }

        blocks.sort_by_key(|b| b.number);

        // `translated_block_2` and `translated_block_02` both parse to 2
        if let Some(pair) = blocks.windows(2).find(|w| w[0].number == w[1].number) {
            return Err(FolioError::validation(format!(
                "block {} stored twice: {} and {}",
                pair[0].number,
                pair[0].path.display(),
                pair[1].path.display()
            )));
        }

        debug!(dir = %self.dir.display(), count = blocks.len(), "discovered block artifacts");
        Ok(blocks)
    }

    /// Read an artifact back.
    pub fn load(&self, block: &StoredBlock) -> Result<BlockArtifact> {
        let document = folio_docx::read_document(&block.path)?;
        Ok(BlockArtifact {
            number: block.number,
            paragraphs: document
                .paragraphs
                .into_iter()
                .map(|p| ArtifactParagraph {
                    text: p.text,
                    style: p.style,
                })
                .collect(),
        })
    }

    /// Remove every block artifact. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let blocks = self.discover()?;
        for block in &blocks {
            std::fs::remove_file(&block.path).map_err(|e| FolioError::io(&block.path, e))?;
        }
        if !blocks.is_empty() {
            info!(dir = %self.dir.display(), removed = blocks.len(), "cleared block artifacts");
        }
        Ok(blocks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("folio-blocks-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn artifact(number: u32, texts: &[&str]) -> BlockArtifact {
        BlockArtifact {
            number,
            paragraphs: texts
                .iter()
                .map(|t| ArtifactParagraph {
                    text: (*t).to_string(),
                    style: Some("Normal".into()),
                })
                .collect(),
        }
    }

    #[test]
    fn names_roundtrip_through_parser() {
        assert_eq!(block_file_name(7), "translated_block_7.docx");
        assert_eq!(parse_block_number("translated_block_7.docx"), Some(7));
        assert_eq!(parse_block_number("translated_block_02.docx"), Some(2));
    }

    #[test]
    fn unrelated_names_are_ignored() {
        for name in [
            "checkpoint.txt",
            "final.docx",
            ".translated_block_3.docx.tmp",
            "translated_block_.docx",
            "translated_block_3.docx.bak",
            "old_translated_block_3.docx",
            "translated_block_x.docx",
        ] {
            assert_eq!(parse_block_number(name), None, "{name}");
        }
    }

    #[test]
    fn discover_orders_numerically() {
        let tmp = temp_dir();
        let store = BlockStore::new(&tmp);

        for n in [10, 2, 1, 11, 3, 9] {
            store.persist(&artifact(n, &["x"])).unwrap();
        }
        std::fs::write(tmp.join("checkpoint.txt"), "5,12").unwrap();

        let numbers: Vec<u32> = store.discover().unwrap().iter().map(|b| b.number).collect();
        assert_eq!(numbers, [1, 2, 3, 9, 10, 11]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn discover_missing_dir_is_empty() {
        let tmp = temp_dir();
        let store = BlockStore::new(tmp.join("does-not-exist"));
        assert!(store.discover().unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn duplicate_numbers_are_rejected() {
        let tmp = temp_dir();
        let store = BlockStore::new(&tmp);
        store.persist(&artifact(2, &["a"])).unwrap();
        std::fs::copy(tmp.join("translated_block_2.docx"), tmp.join("translated_block_02.docx"))
            .unwrap();

        let err = store.discover().unwrap_err();
        assert!(matches!(err, FolioError::Validation { .. }));
        assert!(!err.is_recoverable(), "re-running cannot clear a duplicate");
        assert!(err.to_string().contains("block 2 stored twice"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn persist_then_load() {
        let tmp = temp_dir();
        let store = BlockStore::new(&tmp);
        let original = BlockArtifact {
            number: 4,
            paragraphs: vec![
                ArtifactParagraph {
                    text: "Capítulo".into(),
                    style: Some("Heading1".into()),
                },
                ArtifactParagraph {
                    text: "   ".into(),
                    style: Some("BodyText".into()),
                },
            ],
        };

        let path = store.persist(&original).unwrap();
        assert_eq!(path, tmp.join("translated_block_4.docx"));

        let blocks = store.discover().unwrap();
        assert_eq!(store.load(&blocks[0]).unwrap(), original);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn clear_removes_only_blocks() {
        let tmp = temp_dir();
        let store = BlockStore::new(&tmp);
        store.persist(&artifact(1, &["a"])).unwrap();
        store.persist(&artifact(2, &["b"])).unwrap();
        std::fs::write(tmp.join("final.docx"), b"keep").unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.discover().unwrap().is_empty());
        assert!(tmp.join("final.docx").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
