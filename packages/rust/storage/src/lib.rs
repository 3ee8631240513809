//! Durable state for the block pipeline.
//!
//! - [`CheckpointStore`] / [`FileCheckpointStore`]: the single
//!   `(last_paragraph_index, next_block_number)` record.
//! - [`BlockStore`]: block artifacts in the output directory, named so their
//!   block number can be parsed back and ordered numerically.
//!
//! **Access rules:** the block processor is the only writer of both. The
//! assembler only reads block artifacts. One run per output directory.

mod blocks;
mod checkpoint;

pub use blocks::{BlockStore, StoredBlock, block_file_name, parse_block_number};
pub use checkpoint::{CheckpointStore, FileCheckpointStore};
