//! Block segmentation.
//!
//! Groups the paragraph stream into blocks whose word count reaches a
//! threshold. Blank paragraphs ride along in whatever block is open but add
//! nothing to its count. The trailing group is always flushed, even when it is
//! short.

use std::slice;

use folio_shared::{Block, Checkpoint, Paragraph};

/// Lazy iterator over the blocks still to be processed.
#[derive(Debug, Clone)]
pub struct Segmenter<'a> {
    paragraphs: slice::Iter<'a, Paragraph>,
    resume_after: Option<usize>,
    threshold: usize,
    next_number: u32,
}

impl<'a> Segmenter<'a> {
    /// Segment `paragraphs`, skipping everything at or before the checkpoint.
    pub fn new(paragraphs: &'a [Paragraph], checkpoint: Checkpoint, threshold: usize) -> Self {
        Self {
            paragraphs: paragraphs.iter(),
            resume_after: checkpoint.resume_after(),
            threshold,
            next_number: checkpoint.next_block_number,
        }
    }

    fn is_done(&self, paragraph: &Paragraph) -> bool {
        self.resume_after.is_some_and(|last| paragraph.index <= last)
    }

    fn close(&mut self, paragraphs: Vec<Paragraph>, word_count: usize) -> Block {
        let number = self.next_number;
        self.next_number = self.next_number.saturating_add(1);
        Block {
            number,
            paragraphs,
            word_count,
        }
    }
}

impl Iterator for Segmenter<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let mut current = Vec::new();
        let mut word_count = 0;

        while let Some(paragraph) = self.paragraphs.next() {
            if self.is_done(paragraph) {
                continue;
            }

            if !paragraph.is_blank() {
                word_count += paragraph.word_count();
            }
            current.push(paragraph.clone());

            if word_count >= self.threshold {
                return Some(self.close(current, word_count));
            }
        }

        if current.is_empty() {
            None
        } else {
            Some(self.close(current, word_count))
        }
    }
}
