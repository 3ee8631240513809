//! DOCX body reader.
//!
//! Only top-level body paragraphs are returned. Paragraphs inside tables and
//! text boxes are not part of the reading order the pipeline works on.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;
use zip::result::ZipError;

use folio_shared::{FolioError, Result};

/// One body paragraph as found in `word/document.xml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocxParagraph {
    /// Concatenated run text (`w:tab` → `\t`, `w:br` → `\n`).
    pub text: String,
    /// `w:pStyle` value.
    pub style: Option<String>,
    /// Run font size in points (last `w:sz` seen).
    pub font_size: Option<f32>,
    /// Contains a hard page break.
    pub page_break: bool,
    /// Contains a drawing or picture.
    pub picture: bool,
}

/// The parts of a DOCX the pipeline cares about.
#[derive(Debug, Clone, Default)]
pub struct DocxDocument {
    pub paragraphs: Vec<DocxParagraph>,
    /// Some footer part holds a `PAGE` field.
    pub page_number_footer: bool,
}

/// Read a DOCX file from disk.
pub fn read_document(path: &Path) -> Result<DocxDocument> {
    let file = File::open(path).map_err(|e| FolioError::io(path, e))?;
    read_archive(file, &path.display().to_string())
}

/// Read a DOCX held in memory.
pub fn read_document_bytes(bytes: &[u8]) -> Result<DocxDocument> {
    read_archive(Cursor::new(bytes), "<memory>")
}

fn read_archive<R: Read + Seek>(source: R, label: &str) -> Result<DocxDocument> {
    let mut archive = ZipArchive::new(source)
        .map_err(|e| FolioError::document(format!("{label}: not a DOCX archive: {e}")))?;

    let document_xml = read_entry(&mut archive, "word/document.xml", label)?
        .ok_or_else(|| FolioError::document(format!("{label}: missing word/document.xml")))?;
    let paragraphs = parse_body(&document_xml, label)?;

    let footer_parts: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("word/footer") && name.ends_with(".xml"))
        .map(String::from)
        .collect();

    let mut page_number_footer = false;
    for part in footer_parts {
        if let Some(xml) = read_entry(&mut archive, &part, label)? {
            if has_page_field(&xml, label)? {
                page_number_footer = true;
                break;
            }
        }
    }

    tracing::debug!(
        source = label,
        paragraphs = paragraphs.len(),
        page_number_footer,
        "read DOCX"
    );

    Ok(DocxDocument {
        paragraphs,
        page_number_footer,
    })
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    label: &str,
) -> Result<Option<String>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(FolioError::document(format!("{label}: cannot open {name}: {e}")));
        }
    };

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| FolioError::document(format!("{label}: cannot read {name}: {e}")))?;
    Ok(Some(content))
}

fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Walk `word/document.xml` and collect top-level body paragraphs.
fn parse_body(xml: &str, label: &str) -> Result<Vec<DocxParagraph>> {
    let mut reader = Reader::from_str(xml);

    let mut paragraphs = Vec::new();
    let mut current: Option<DocxParagraph> = None;
    let mut table_depth = 0usize;
    let mut nested_depth = 0usize;
    let mut in_text = false;
    let mut in_p_pr = false;
    let mut run_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:p" if table_depth == 0 => {
                    if current.is_some() {
                        nested_depth += 1;
                    } else {
                        current = Some(DocxParagraph::default());
                    }
                }
                b"w:t" => in_text = true,
                b"w:pPr" => in_p_pr = true,
                b"w:r" => run_depth += 1,
                b"w:drawing" | b"w:pict" => {
                    if let Some(p) = current.as_mut() {
                        p.picture = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"w:p" && table_depth == 0 && current.is_none() {
                    paragraphs.push(DocxParagraph::default());
                } else if nested_depth == 0 {
                    if let Some(p) = current.as_mut() {
                        if in_p_pr {
                            apply_paragraph_property(p, &e);
                        } else if run_depth > 0 {
                            apply_run_element(p, &e);
                        }
                    }
                }
            }
            Ok(Event::Text(t)) if in_text && nested_depth == 0 => {
                if let Some(p) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| FolioError::document(format!("{label}: bad text: {e}")))?;
                    p.text.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth = table_depth.saturating_sub(1),
                b"w:p" if table_depth == 0 => {
                    if nested_depth > 0 {
                        nested_depth -= 1;
                    } else if let Some(p) = current.take() {
                        paragraphs.push(p);
                    }
                }
                b"w:t" => in_text = false,
                b"w:pPr" => in_p_pr = false,
                b"w:r" => run_depth = run_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FolioError::document(format!(
                    "{label}: malformed document.xml at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// Only the style is taken from `w:pPr`; tab stops and paragraph-mark run
/// properties there say nothing about the visible text.
fn apply_paragraph_property(p: &mut DocxParagraph, e: &BytesStart) {
    if e.name().as_ref() == b"w:pStyle" {
        p.style = attr(e, b"w:val");
    }
}

fn apply_run_element(p: &mut DocxParagraph, e: &BytesStart) {
    match e.name().as_ref() {
        b"w:sz" => {
            if let Some(half_points) = attr(e, b"w:val").and_then(|v| v.parse::<f32>().ok()) {
                p.font_size = Some(half_points / 2.0);
            }
        }
        b"w:tab" => p.text.push('\t'),
        b"w:br" | b"w:cr" => match attr(e, b"w:type").as_deref() {
            Some("page") => p.page_break = true,
            Some("column") => {}
            _ => p.text.push('\n'),
        },
        b"w:drawing" | b"w:pict" => p.picture = true,
        _ => {}
    }
}

/// Whether a footer part contains a `PAGE` field, complex or simple.
fn has_page_field(xml: &str, label: &str) -> Result<bool> {
    let mut reader = Reader::from_str(xml);
    let mut in_instr = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:instrText" => in_instr = true,
                b"w:fldSimple" => {
                    if attr(&e, b"w:instr").is_some_and(|i| i.trim().starts_with("PAGE")) {
                        return Ok(true);
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_instr => {
                let text = t
                    .unescape()
                    .map_err(|e| FolioError::document(format!("{label}: bad footer text: {e}")))?;
                if text.trim().starts_with("PAGE") {
                    return Ok(true);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:instrText" => in_instr = false,
            Ok(Event::Eof) => return Ok(false),
            Err(e) => {
                return Err(FolioError::document(format!(
                    "{label}: malformed footer: {e}"
                )));
            }
            _ => {}
        }
    }
}
