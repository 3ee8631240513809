//! Source document loading.

use std::path::Path;

use tracing::{info, instrument};

use folio_shared::{FolioError, Paragraph, Result};

/// Read the body paragraphs of the DOCX at `path`, numbered from 0.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_paragraphs(path: &Path) -> Result<Vec<Paragraph>> {
    if !path.exists() {
        return Err(FolioError::document(format!(
            "input document not found: {}",
            path.display()
        )));
    }

    let document = folio_docx::read_document(path)?;
    let paragraphs: Vec<Paragraph> = document
        .paragraphs
        .into_iter()
        .enumerate()
        .map(|(index, p)| Paragraph::new(index, p.text, p.style))
        .collect();

    let words: usize = paragraphs.iter().map(Paragraph::word_count).sum();
    info!(paragraphs = paragraphs.len(), words, "loaded source document");
    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_docx::DocxBuilder;

    #[test]
    fn paragraphs_are_indexed_in_body_order() {
        let tmp = std::env::temp_dir().join(format!("folio-doc-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&tmp).unwrap();
        let path = tmp.join("input.docx");

        DocxBuilder::new()
            .paragraph("Chapter one", Some("Heading1"))
            .paragraph("", None)
            .paragraph("It was a dark night.", Some("Normal"))
            .write(&path)
            .unwrap();

        let paragraphs = load_paragraphs(&path).unwrap();
        assert_eq!(paragraphs.len(), 3);
        assert_eq!(paragraphs[0].index, 0);
        assert_eq!(paragraphs[0].style.as_deref(), Some("Heading1"));
        assert!(paragraphs[1].is_blank());
        assert_eq!(paragraphs[2].index, 2);
        assert_eq!(paragraphs[2].word_count(), 5);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_input_is_a_document_error() {
        let err = load_paragraphs(Path::new("/no/such/folio/input.docx")).unwrap_err();
        assert!(matches!(err, FolioError::Document { .. }));
    }
}
