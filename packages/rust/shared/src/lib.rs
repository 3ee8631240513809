//! Shared types, error model, and configuration for Folio.
//!
//! This crate is the foundation depended on by all other Folio crates.
//! It provides:
//! - [`FolioError`]: the unified error type
//! - Domain types ([`Paragraph`], [`Block`], [`BlockArtifact`], [`Checkpoint`], [`FrontMatter`])
//! - Configuration ([`AppConfig`], [`BlockSizing`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BlockSizing, BlocksConfig, DefaultsConfig, FrontMatterConfig, TransformConfig,
    TransformKind, checkpoint_path, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_config,
};
pub use error::{FolioError, Result};
pub use types::{
    ArtifactParagraph, Block, BlockArtifact, Checkpoint, FrontMatter, FrontMatterDescriptor,
    MalformedCheckpoint, Paragraph, TitleEntry,
};
