//! Minimal WordprocessingML (DOCX) codec.
//!
//! Reads the top-level body paragraphs of a document (text + style) and
//! writes the small subset of DOCX the pipeline emits: styled paragraphs,
//! sized title runs, page breaks, one inline picture, and a footer carrying
//! a `PAGE` field.
//!
//! DOCX files are ZIP archives; parsing goes through `zip` + `quick-xml`.

mod reader;
mod writer;

pub use reader::{DocxDocument, DocxParagraph, read_document, read_document_bytes};
pub use writer::DocxBuilder;

/// WordprocessingML main namespace.
pub(crate) const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
/// Office document relationships namespace.
pub(crate) const NS_R: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
