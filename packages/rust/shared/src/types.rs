//! Core domain types for the block pipeline.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Paragraph
// ---------------------------------------------------------------------------

/// One paragraph of the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    /// Zero-based position in the source document.
    pub index: usize,
    /// Plain text content.
    pub text: String,
    /// Opaque style identifier, carried through unchanged.
    pub style: Option<String>,
}

impl Paragraph {
    pub fn new(index: usize, text: impl Into<String>, style: Option<String>) -> Self {
        Self {
            index,
            text: text.into(),
            style,
        }
    }

    /// Number of whitespace-delimited words.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A contiguous run of paragraphs processed and persisted as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// 1-based, gap-free block number.
    pub number: u32,
    /// Paragraphs in source order. Never empty.
    pub paragraphs: Vec<Paragraph>,
    /// Accumulated word count of the non-blank paragraphs.
    pub word_count: usize,
}

impl Block {
    /// Index of the last source paragraph in this block.
    pub fn last_index(&self) -> usize {
        self.paragraphs.last().map(|p| p.index).unwrap_or_default()
    }
}

/// A transformed paragraph inside a block artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactParagraph {
    pub text: String,
    pub style: Option<String>,
}

/// The durable output of transforming one [`Block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockArtifact {
    pub number: u32,
    pub paragraphs: Vec<ArtifactParagraph>,
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// Durable resume marker: `(last completed paragraph index, next block number)`.
///
/// Serialized as a single line `"<last_paragraph_index>,<next_block_number>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Index of the last paragraph of the last persisted block, or -1.
    pub last_paragraph_index: i64,
    /// Number the next block will receive.
    pub next_block_number: u32,
}

impl Checkpoint {
    /// Cold start: nothing processed, first block is 1.
    pub const START: Checkpoint = Checkpoint {
        last_paragraph_index: -1,
        next_block_number: 1,
    };

    /// Checkpoint recorded after `block` has been persisted.
    pub fn after(block: &Block) -> Self {
        Self {
            last_paragraph_index: block.last_index() as i64,
            next_block_number: block.number.saturating_add(1),
        }
    }

    /// Paragraphs with an index at or below this value are already done.
    pub fn resume_after(&self) -> Option<usize> {
        usize::try_from(self.last_paragraph_index).ok()
    }

    pub fn is_start(&self) -> bool {
        *self == Self::START
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::START
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.last_paragraph_index, self.next_block_number)
    }
}

/// Why a checkpoint record could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedCheckpoint(pub String);

impl fmt::Display for MalformedCheckpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed checkpoint record: {}", self.0)
    }
}

impl std::error::Error for MalformedCheckpoint {}

impl FromStr for Checkpoint {
    type Err = MalformedCheckpoint;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let malformed = || MalformedCheckpoint(s.to_string());

        let (idx, next) = s.trim().split_once(',').ok_or_else(malformed)?;
        let last_paragraph_index: i64 = idx.trim().parse().map_err(|_| malformed())?;
        let next_block_number: u32 = next.trim().parse().map_err(|_| malformed())?;

        // u32::MAX leaves no room to number the block after it.
        if last_paragraph_index < -1 || next_block_number == 0 || next_block_number == u32::MAX
        {
            return Err(malformed());
        }

        Ok(Self {
            last_paragraph_index,
            next_block_number,
        })
    }
}

// ---------------------------------------------------------------------------
// Front matter
// ---------------------------------------------------------------------------

/// One title line of the front matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleEntry {
    pub text: String,
    /// Font size in points.
    pub size: f32,
}

/// The `titles` descriptor file (`front_matter.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontMatterDescriptor {
    pub titles: Vec<TitleEntry>,
}

/// Front matter ready for assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    pub titles: Vec<TitleEntry>,
    /// Cover image, if one was found.
    pub cover_image: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_ignores_extra_whitespace() {
        let p = Paragraph::new(0, "  one\ttwo   three\n", None);
        assert_eq!(p.word_count(), 3);
        assert!(!p.is_blank());
        assert!(Paragraph::new(1, " \t\n", None).is_blank());
    }

    #[test]
    fn checkpoint_display_and_parse() {
        let cp = Checkpoint {
            last_paragraph_index: 247,
            next_block_number: 3,
        };
        assert_eq!(cp.to_string(), "247,3");
        assert_eq!("247,3".parse::<Checkpoint>(), Ok(cp));
        assert_eq!(" 247 , 3 \n".parse::<Checkpoint>(), Ok(cp));
    }

    #[test]
    fn checkpoint_start_parses() {
        let cp: Checkpoint = "-1,1".parse().unwrap();
        assert!(cp.is_start());
        assert_eq!(cp.resume_after(), None);
    }

    #[test]
    fn malformed_checkpoints_are_rejected() {
        for raw in ["", "5", "a,b", "1,2,3", "-7,2", "3,0", "3,-1", "0,4294967295"] {
            assert!(raw.parse::<Checkpoint>().is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn checkpoint_after_block() {
        let block = Block {
            number: 4,
            paragraphs: vec![
                Paragraph::new(10, "a", None),
                Paragraph::new(11, "b", None),
            ],
            word_count: 2,
        };
        let cp = Checkpoint::after(&block);
        assert_eq!(cp.last_paragraph_index, 11);
        assert_eq!(cp.next_block_number, 5);
        assert_eq!(cp.resume_after(), Some(11));
    }

    #[test]
    fn descriptor_deserialization() {
        let json = r#"{"titles":[{"text":"El Libro","size":28},{"text":"Autor","size":14.5}]}"#;
        let parsed: FrontMatterDescriptor = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed.titles.len(), 2);
        assert_eq!(parsed.titles[1].size, 14.5);
    }

    #[test]
    fn descriptor_without_titles_is_rejected() {
        let parsed: std::result::Result<FrontMatterDescriptor, _> =
            serde_json::from_str(r#"{"subtitle":"x"}"#);
        assert!(parsed.is_err());
    }
}
