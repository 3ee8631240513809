//! Core pipeline orchestration for Folio.
//!
//! This crate ties together segmentation, transformation, checkpointed block
//! persistence and final assembly into end-to-end workflows (e.g., [`pipeline::run`]).

pub mod assembler;
pub mod document;
pub mod pipeline;
pub mod processor;
pub mod segmenter;
