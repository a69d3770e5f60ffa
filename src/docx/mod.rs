//! OOXML document builder
//!
//! Consumes the ordered block stream and assembles a `.docx` package. The
//! body XML is assembled directly so externally-rendered OMML fragments can
//! be spliced in verbatim (the `m` namespace is declared on the document
//! root); a fallback math content renders as visible `[eq: …]` text.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::core::blocks::{Block, ListKind, MathContent, ResolvedCell, Run, RunStyle};
use crate::utils::error::{ConversionError, ConversionResult};

// ============================================================================
// Static package parts
// ============================================================================

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

const CONTENT_TYPES_XML: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
    "<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>",
    "<Default Extension=\"xml\" ContentType=\"application/xml\"/>",
    "<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>",
    "<Override PartName=\"/word/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml\"/>",
    "<Override PartName=\"/word/numbering.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml\"/>",
    "<Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>",
    "</Types>",
);

const ROOT_RELS_XML: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"word/document.xml\"/>",
    "<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/>",
    "</Relationships>",
);

const DOCUMENT_RELS_XML: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>",
    "<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering\" Target=\"numbering.xml\"/>",
    "</Relationships>",
);

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const M_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/math";

/// Bullet list = numId 1, numbered list = numId 2 (see `numbering_xml`)
const BULLET_NUM_ID: u32 = 1;
const DECIMAL_NUM_ID: u32 = 2;

// ============================================================================
// Body assembly
// ============================================================================

/// Render the full `word/document.xml` part for a block stream
pub fn document_xml(blocks: &[Block]) -> String {
    let mut xml = String::with_capacity(4096);
    xml.push_str(XML_DECL);
    let _ = write!(
        xml,
        "<w:document xmlns:w=\"{}\" xmlns:m=\"{}\"><w:body>",
        W_NS, M_NS
    );
    for block in blocks {
        xml.push_str(&block_xml(block));
    }
    xml.push_str(
        "<w:sectPr><w:pgSz w:w=\"11906\" w:h=\"16838\"/>\
         <w:pgMar w:top=\"1440\" w:right=\"1440\" w:bottom=\"1440\" w:left=\"1440\"/>\
         </w:sectPr>",
    );
    xml.push_str("</w:body></w:document>");
    xml
}

fn block_xml(block: &Block) -> String {
    match block {
        Block::Heading { level, text } => heading_xml(*level, text),
        Block::Paragraph { runs } => format!("<w:p>{}</w:p>", runs_xml(runs)),
        Block::ListItem { kind, runs } => list_item_xml(*kind, runs),
        Block::Table { rows, columns } => table_xml(rows, *columns),
        // The label, when present, was already emitted as a following
        // bracketed line during reinsertion
        Block::Equation { content, label: _ } => equation_xml(content),
    }
}

fn heading_xml(level: u8, text: &str) -> String {
    let level = level.clamp(1, 4);
    format!(
        "<w:p><w:pPr><w:pStyle w:val=\"Heading{}\"/></w:pPr>\
         <w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
        level,
        escape(text)
    )
}

fn list_item_xml(kind: ListKind, runs: &[Run]) -> String {
    let num_id = match kind {
        ListKind::Bullet => BULLET_NUM_ID,
        ListKind::Numbered => DECIMAL_NUM_ID,
    };
    format!(
        "<w:p><w:pPr><w:pStyle w:val=\"ListParagraph\"/>\
         <w:numPr><w:ilvl w:val=\"0\"/><w:numId w:val=\"{}\"/></w:numPr></w:pPr>{}</w:p>",
        num_id,
        runs_xml(runs)
    )
}

fn equation_xml(content: &MathContent) -> String {
    match content {
        MathContent::Rendered(fragment) => format!("<w:p>{}</w:p>", fragment.block_xml()),
        MathContent::Fallback(formula) => format!(
            "<w:p><w:r><w:t xml:space=\"preserve\">[eq: {}]</w:t></w:r></w:p>",
            escape(formula)
        ),
    }
}

fn runs_xml(runs: &[Run]) -> String {
    runs.iter().map(run_xml).collect()
}

fn run_xml(run: &Run) -> String {
    match run {
        Run::Text { text, style } => {
            let rpr = match style {
                RunStyle::Plain => String::new(),
                RunStyle::Subscript => {
                    "<w:rPr><w:vertAlign w:val=\"subscript\"/></w:rPr>".to_string()
                }
                RunStyle::Superscript => {
                    "<w:rPr><w:vertAlign w:val=\"superscript\"/></w:rPr>".to_string()
                }
                RunStyle::Bold => "<w:rPr><w:b/></w:rPr>".to_string(),
            };
            format!(
                "<w:r>{}<w:t xml:space=\"preserve\">{}</w:t></w:r>",
                rpr,
                escape(text)
            )
        }
        Run::Math(MathContent::Rendered(fragment)) => fragment.inline_xml(),
        Run::Math(MathContent::Fallback(formula)) => format!(
            "<w:r><w:t xml:space=\"preserve\">[eq: {}]</w:t></w:r>",
            escape(formula)
        ),
    }
}

fn table_xml(rows: &[Vec<ResolvedCell>], columns: usize) -> String {
    let mut xml = String::from(
        "<w:tbl><w:tblPr><w:tblStyle w:val=\"TableGrid\"/>\
         <w:tblW w:w=\"0\" w:type=\"auto\"/></w:tblPr><w:tblGrid>",
    );
    for _ in 0..columns {
        xml.push_str("<w:gridCol/>");
    }
    xml.push_str("</w:tblGrid>");

    for row in rows {
        xml.push_str("<w:tr>");
        let mut used = 0;
        for cell in row {
            xml.push_str("<w:tc><w:tcPr>");
            if cell.colspan > 1 {
                let _ = write!(xml, "<w:gridSpan w:val=\"{}\"/>", cell.colspan);
            }
            xml.push_str("</w:tcPr>");
            let _ = write!(xml, "<w:p>{}</w:p>", runs_xml(&cell.runs));
            xml.push_str("</w:tc>");
            used += cell.colspan;
        }
        // shorter rows leave trailing columns empty
        while used < columns {
            xml.push_str("<w:tc><w:tcPr/><w:p/></w:tc>");
            used += 1;
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    xml
}

// ============================================================================
// Supporting parts
// ============================================================================

fn styles_xml() -> String {
    let mut xml = String::from(XML_DECL);
    let _ = write!(xml, "<w:styles xmlns:w=\"{}\">", W_NS);
    xml.push_str(
        "<w:style w:type=\"paragraph\" w:default=\"1\" w:styleId=\"Normal\">\
         <w:name w:val=\"Normal\"/></w:style>",
    );
    for (level, size) in [(1u8, 32u8), (2, 28), (3, 26), (4, 24)] {
        let _ = write!(
            xml,
            "<w:style w:type=\"paragraph\" w:styleId=\"Heading{l}\">\
             <w:name w:val=\"heading {l}\"/><w:basedOn w:val=\"Normal\"/>\
             <w:pPr><w:outlineLvl w:val=\"{out}\"/></w:pPr>\
             <w:rPr><w:b/><w:sz w:val=\"{size}\"/></w:rPr></w:style>",
            l = level,
            out = level - 1,
            size = size
        );
    }
    xml.push_str(
        "<w:style w:type=\"paragraph\" w:styleId=\"ListParagraph\">\
         <w:name w:val=\"List Paragraph\"/><w:basedOn w:val=\"Normal\"/>\
         <w:pPr><w:ind w:left=\"720\"/></w:pPr></w:style>",
    );
    xml.push_str(
        "<w:style w:type=\"table\" w:styleId=\"TableGrid\">\
         <w:name w:val=\"Table Grid\"/>\
         <w:tblPr><w:tblBorders>\
         <w:top w:val=\"single\" w:sz=\"4\" w:space=\"0\"/>\
         <w:left w:val=\"single\" w:sz=\"4\" w:space=\"0\"/>\
         <w:bottom w:val=\"single\" w:sz=\"4\" w:space=\"0\"/>\
         <w:right w:val=\"single\" w:sz=\"4\" w:space=\"0\"/>\
         <w:insideH w:val=\"single\" w:sz=\"4\" w:space=\"0\"/>\
         <w:insideV w:val=\"single\" w:sz=\"4\" w:space=\"0\"/>\
         </w:tblBorders></w:tblPr></w:style>",
    );
    xml.push_str("</w:styles>");
    xml
}

fn numbering_xml() -> String {
    let mut xml = String::from(XML_DECL);
    let _ = write!(xml, "<w:numbering xmlns:w=\"{}\">", W_NS);
    xml.push_str(
        "<w:abstractNum w:abstractNumId=\"0\"><w:lvl w:ilvl=\"0\">\
         <w:start w:val=\"1\"/><w:numFmt w:val=\"bullet\"/>\
         <w:lvlText w:val=\"\u{F0B7}\"/><w:lvlJc w:val=\"left\"/>\
         <w:pPr><w:ind w:left=\"720\" w:hanging=\"360\"/></w:pPr>\
         <w:rPr><w:rFonts w:ascii=\"Symbol\" w:hAnsi=\"Symbol\"/></w:rPr>\
         </w:lvl></w:abstractNum>",
    );
    xml.push_str(
        "<w:abstractNum w:abstractNumId=\"1\"><w:lvl w:ilvl=\"0\">\
         <w:start w:val=\"1\"/><w:numFmt w:val=\"decimal\"/>\
         <w:lvlText w:val=\"%1.\"/><w:lvlJc w:val=\"left\"/>\
         <w:pPr><w:ind w:left=\"720\" w:hanging=\"360\"/></w:pPr>\
         </w:lvl></w:abstractNum>",
    );
    xml.push_str("<w:num w:numId=\"1\"><w:abstractNumId w:val=\"0\"/></w:num>");
    xml.push_str("<w:num w:numId=\"2\"><w:abstractNumId w:val=\"1\"/></w:num>");
    xml.push_str("</w:numbering>");
    xml
}

fn core_properties_xml() -> String {
    let stamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        "{}<cp:coreProperties \
         xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
         xmlns:dc=\"http://purl.org/dc/elements/1.1/\" \
         xmlns:dcterms=\"http://purl.org/dc/terms/\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\
         <dc:creator>texword</dc:creator>\
         <cp:lastModifiedBy>texword</cp:lastModifiedBy>\
         <dcterms:created xsi:type=\"dcterms:W3CDTF\">{stamp}</dcterms:created>\
         <dcterms:modified xsi:type=\"dcterms:W3CDTF\">{stamp}</dcterms:modified>\
         </cp:coreProperties>",
        XML_DECL,
        stamp = stamp
    )
}

// ============================================================================
// Package writing
// ============================================================================

/// Assemble the OOXML package for a block stream and write it to `path`
pub fn save_docx(blocks: &[Block], path: &Path) -> ConversionResult<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", ROOT_RELS_XML.to_string()),
        ("docProps/core.xml", core_properties_xml()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML.to_string()),
        ("word/styles.xml", styles_xml()),
        ("word/numbering.xml", numbering_xml()),
    ];
    for (name, content) in parts {
        zip.start_file(name, options)
            .map_err(|e| ConversionError::io(e.to_string()))?;
        zip.write_all(content.as_bytes())?;
    }

    zip.start_file("word/document.xml", options)
        .map_err(|e| ConversionError::io(e.to_string()))?;
    zip.write_all(document_xml(blocks).as_bytes())?;

    zip.finish()
        .map_err(|e| ConversionError::io(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::blocks::Block;
    use crate::render::MathFragment;

    fn rendered(text: &str) -> MathContent {
        MathContent::Rendered(MathFragment::classify(format!(
            "<m:oMathPara><m:oMath><m:r><m:t>{}</m:t></m:r></m:oMath></m:oMathPara>",
            text
        )))
    }

    #[test]
    fn test_heading_uses_style() {
        let xml = document_xml(&[Block::Heading {
            level: 2,
            text: "Results".into(),
        }]);
        assert!(xml.contains("<w:pStyle w:val=\"Heading2\"/>"));
        assert!(xml.contains(">Results</w:t>"));
    }

    #[test]
    fn test_heading_level_clamped() {
        let xml = document_xml(&[Block::Heading {
            level: 9,
            text: "Deep".into(),
        }]);
        assert!(xml.contains("Heading4"));
    }

    #[test]
    fn test_text_escaped() {
        let xml = document_xml(&[Block::plain_paragraph("a < b & c")]);
        assert!(xml.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_display_equation_spliced_verbatim() {
        let xml = document_xml(&[Block::Equation {
            content: rendered("x"),
            label: None,
        }]);
        assert!(xml.contains("<m:oMathPara><m:oMath>"));
        assert!(xml.contains("xmlns:m="));
    }

    #[test]
    fn test_fallback_equation_visible() {
        let xml = document_xml(&[Block::Equation {
            content: MathContent::Fallback("\\frac{a}{b}".into()),
            label: None,
        }]);
        assert!(xml.contains("[eq: \\frac{a}{b}]"));
    }

    #[test]
    fn test_inline_math_unwrapped_in_paragraph() {
        let xml = document_xml(&[Block::Paragraph {
            runs: vec![Run::plain("see "), Run::Math(rendered("y"))],
        }]);
        // Inline use must not nest an oMathPara inside the paragraph run flow
        assert!(xml.contains("<m:oMath><m:r><m:t>y</m:t></m:r></m:oMath>"));
        assert!(!xml.contains("<w:p><m:oMathPara>"));
    }

    #[test]
    fn test_subscript_run() {
        let xml = document_xml(&[Block::Paragraph {
            runs: vec![Run::styled("2", RunStyle::Subscript)],
        }]);
        assert!(xml.contains("<w:vertAlign w:val=\"subscript\"/>"));
    }

    #[test]
    fn test_table_gridspan_and_padding() {
        let rows = vec![
            vec![ResolvedCell {
                runs: vec![Run::plain("wide")],
                colspan: 2,
            }],
            vec![ResolvedCell {
                runs: vec![Run::plain("one")],
                colspan: 1,
            }],
        ];
        let xml = document_xml(&[Block::Table { rows, columns: 2 }]);
        assert!(xml.contains("<w:gridSpan w:val=\"2\"/>"));
        // second row padded with one empty cell
        assert_eq!(xml.matches("<w:tc>").count(), 3);
        assert_eq!(xml.matches("<w:gridCol/>").count(), 2);
    }

    #[test]
    fn test_list_items_reference_numbering() {
        let xml = document_xml(&[
            Block::ListItem {
                kind: ListKind::Bullet,
                runs: vec![Run::plain("a")],
            },
            Block::ListItem {
                kind: ListKind::Numbered,
                runs: vec![Run::plain("b")],
            },
        ]);
        assert!(xml.contains("<w:numId w:val=\"1\"/>"));
        assert!(xml.contains("<w:numId w:val=\"2\"/>"));
    }

    #[test]
    fn test_save_docx_package_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.docx");
        save_docx(&[Block::plain_paragraph("hello")], &path).unwrap();

        let file = File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        for expected in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/styles.xml",
            "word/numbering.xml",
            "docProps/core.xml",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }
}
