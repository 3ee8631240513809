//! DOCX writer.
//!
//! Builds `word/document.xml` incrementally and packages it with the
//! relationship, style, footer and media parts. Entry timestamps are fixed so
//! the same content always produces the same bytes.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use std::path::Path;

use quick_xml::escape::escape;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use folio_shared::{FolioError, Result};

use crate::{NS_R, NS_W};

/// English Metric Units per inch.
const EMU_PER_INCH: f64 = 914_400.0;

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const REL_FOOTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const FOOTER_REL_ID: &str = "rIdFooter1";

/// An embedded image part.
struct Media {
    rel_id: String,
    part_name: String,
    extension: String,
    bytes: Vec<u8>,
}

/// Incremental DOCX document builder.
#[derive(Default)]
pub struct DocxBuilder {
    body: String,
    styles: BTreeSet<String>,
    media: Vec<Media>,
    page_numbers: bool,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a paragraph with an optional paragraph style.
    pub fn paragraph(&mut self, text: &str, style: Option<&str>) -> &mut Self {
        self.body.push_str("<w:p>");
        if let Some(style) = style {
            self.styles.insert(style.to_string());
            let _ = write!(
                self.body,
                r#"<w:pPr><w:pStyle w:val="{}"/></w:pPr>"#,
                escape(style)
            );
        }
        if !text.is_empty() {
            self.body.push_str("<w:r>");
            push_run_text(&mut self.body, text);
            self.body.push_str("</w:r>");
        }
        self.body.push_str("</w:p>");
        self
    }

    /// Append a paragraph whose run is set at `points` size.
    pub fn sized_paragraph(&mut self, text: &str, points: f32) -> &mut Self {
        let half_points = (points * 2.0).round().max(1.0) as u32;
        let _ = write!(
            self.body,
            r#"<w:p><w:r><w:rPr><w:sz w:val="{half_points}"/><w:szCs w:val="{half_points}"/></w:rPr>"#
        );
        push_run_text(&mut self.body, text);
        self.body.push_str("</w:r></w:p>");
        self
    }

    /// Append a hard page break.
    pub fn page_break(&mut self) -> &mut Self {
        self.body
            .push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
        self
    }

    /// Append an inline picture `width_inches` wide, keeping its aspect ratio.
    pub fn picture(&mut self, path: &Path, width_inches: f64) -> Result<&mut Self> {
        let bytes = std::fs::read(path).map_err(|e| FolioError::io(path, e))?;
        let (px_w, px_h) = image::image_dimensions(path).map_err(|e| {
            FolioError::document(format!("cannot decode image {}: {e}", path.display()))
        })?;
        if px_w == 0 || px_h == 0 {
            return Err(FolioError::document(format!(
                "image {} has zero size",
                path.display()
            )));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "png".into());

        let index = self.media.len() + 1;
        let rel_id = format!("rIdImage{index}");
        let part_name = format!("media/image{index}.{extension}");

        let cx = (width_inches * EMU_PER_INCH).round() as u64;
        let cy = (cx as f64 * f64::from(px_h) / f64::from(px_w)).round() as u64;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("image{index}"));

        let _ = write!(
            self.body,
            concat!(
                r#"<w:p><w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0">"#,
                r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{index}" name="Picture {index}"/>"#,
                r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
                r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                r#"<pic:pic><pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rel_id}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
                r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
                r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
            ),
            cx = cx,
            cy = cy,
            index = index,
            name = escape(name.as_str()),
            rel_id = rel_id,
        );

        self.media.push(Media {
            rel_id,
            part_name,
            extension,
            bytes,
        });
        Ok(self)
    }

    /// Put a centered `PAGE` field in the footer of every page.
    pub fn page_number_footer(&mut self) -> &mut Self {
        self.page_numbers = true;
        self
    }

    /// Package the document into DOCX bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        let mut add = |name: &str, content: &[u8]| -> Result<()> {
            zip.start_file(name, options)
                .map_err(|e| FolioError::document(format!("zip entry {name}: {e}")))?;
            zip.write_all(content)
                .map_err(|e| FolioError::document(format!("zip write {name}: {e}")))
        };

        add("[Content_Types].xml", self.content_types().as_bytes())?;
        add("_rels/.rels", package_rels().as_bytes())?;
        add("word/document.xml", self.document_xml().as_bytes())?;
        add("word/_rels/document.xml.rels", self.document_rels().as_bytes())?;
        add("word/styles.xml", self.styles_xml().as_bytes())?;
        if self.page_numbers {
            add("word/footer1.xml", footer_xml().as_bytes())?;
        }
        for media in &self.media {
            add(&format!("word/{}", media.part_name), &media.bytes)?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| FolioError::document(format!("zip finish: {e}")))?;
        Ok(cursor.into_inner())
    }

    /// Write the document to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| FolioError::io(path, e))?;
        tracing::debug!(path = %path.display(), "wrote DOCX");
        Ok(())
    }

    fn content_types(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
        xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);

        let extensions: BTreeSet<&str> = self.media.iter().map(|m| m.extension.as_str()).collect();
        for ext in extensions {
            let _ = write!(
                xml,
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape(ext),
                image_content_type(ext)
            );
        }

        xml.push_str(r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#);
        xml.push_str(r#"<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#);
        if self.page_numbers {
            xml.push_str(r#"<Override PartName="/word/footer1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/>"#);
        }
        xml.push_str("</Types>");
        xml
    }

    fn document_xml(&self) -> String {
        let mut xml = String::from(XML_DECL);
        let _ = write!(
            xml,
            concat!(
                r#"<w:document xmlns:w="{w}" xmlns:r="{r}" "#,
                r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
                r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
                r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
                "<w:body>"
            ),
            w = NS_W,
            r = NS_R
        );
        xml.push_str(&self.body);

        xml.push_str("<w:sectPr>");
        if self.page_numbers {
            let _ = write!(
                xml,
                r#"<w:footerReference w:type="default" r:id="{FOOTER_REL_ID}"/>"#
            );
        }
        xml.push_str(r#"<w:pgSz w:w="12240" w:h="15840"/>"#);
        xml.push_str(r#"<w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/>"#);
        xml.push_str("</w:sectPr></w:body></w:document>");
        xml
    }

    fn document_rels(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        let _ = write!(
            xml,
            r#"<Relationship Id="rIdStyles" Type="{REL_STYLES}" Target="styles.xml"/>"#
        );
        if self.page_numbers {
            let _ = write!(
                xml,
                r#"<Relationship Id="{FOOTER_REL_ID}" Type="{REL_FOOTER}" Target="footer1.xml"/>"#
            );
        }
        for media in &self.media {
            let _ = write!(
                xml,
                r#"<Relationship Id="{}" Type="{REL_IMAGE}" Target="{}"/>"#,
                media.rel_id, media.part_name
            );
        }
        xml.push_str("</Relationships>");
        xml
    }

    fn styles_xml(&self) -> String {
        let mut xml = String::from(XML_DECL);
        let _ = write!(xml, r#"<w:styles xmlns:w="{NS_W}">"#);
        xml.push_str(r#"<w:docDefaults><w:rPrDefault><w:rPr><w:sz w:val="22"/><w:szCs w:val="22"/></w:rPr></w:rPrDefault></w:docDefaults>"#);
        xml.push_str(r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#);
        for style in self.styles.iter().filter(|s| s.as_str() != "Normal") {
            let id = escape(style.as_str());
            let _ = write!(
                xml,
                r#"<w:style w:type="paragraph" w:customStyle="1" w:styleId="{id}"><w:name w:val="{id}"/><w:basedOn w:val="Normal"/><w:qFormat/></w:style>"#
            );
        }
        xml.push_str("</w:styles>");
        xml
    }
}

fn package_rels() -> String {
    format!(
        concat!(
            "{decl}",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
            "</Relationships>"
        ),
        decl = XML_DECL
    )
}

fn footer_xml() -> String {
    format!(
        concat!(
            "{decl}",
            r#"<w:ftr xmlns:w="{w}" xmlns:r="{r}"><w:p><w:pPr><w:jc w:val="center"/></w:pPr>"#,
            r#"<w:r><w:fldChar w:fldCharType="begin"/></w:r>"#,
            r#"<w:r><w:instrText xml:space="preserve"> PAGE </w:instrText></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="end"/></w:r>"#,
            "</w:p></w:ftr>"
        ),
        decl = XML_DECL,
        w = NS_W,
        r = NS_R
    )
}

fn image_content_type(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "image/png",
    }
}

/// Emit run content, mapping `\t` and `\n` back to `w:tab` / `w:br`.
fn push_run_text(out: &mut String, text: &str) {
    let mut segment = String::new();
    let flush = |out: &mut String, segment: &mut String| {
        if !segment.is_empty() {
            let _ = write!(
                out,
                r#"<w:t xml:space="preserve">{}</w:t>"#,
                escape(segment.as_str())
            );
            segment.clear();
        }
    };

    for ch in text.chars() {
        match ch {
            '\t' => {
                flush(out, &mut segment);
                out.push_str("<w:tab/>");
            }
            '\n' => {
                flush(out, &mut segment);
                out.push_str("<w:br/>");
            }
            '\r' => {}
            _ => segment.push(ch),
        }
    }
    flush(out, &mut segment);
}
