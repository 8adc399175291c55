// ABOUTME: WordprocessingML writer for reports and chat transcripts
// ABOUTME: A flat list of blocks rendered into document.xml with a minimal style sheet

use super::{xml_escape, zip_package, BRAND_COLOR, XML_HEADER};
use crate::error::Result;
use crate::tools::FileDescriptor;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// One top-level element of the document body
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Block {
    Heading { level: u8, text: String },
    Paragraph(String),
    Bullet(String),
    /// A single formatted run in its own paragraph
    Run {
        text: String,
        bold: bool,
        color: Option<&'static str>,
    },
    Table(Vec<Vec<String>>),
    /// Light separator line
    Rule,
}

/// Layout of a report: title, subtitle, body, sections, slides, table, chart data
pub(crate) fn blocks_for(descriptor: &FileDescriptor) -> Vec<Block> {
    let mut blocks = Vec::new();
    if !descriptor.title.is_empty() {
        blocks.push(Block::Heading {
            level: 1,
            text: descriptor.title.clone(),
        });
    }
    if let Some(subtitle) = &descriptor.subtitle {
        blocks.push(Block::Run {
            text: subtitle.clone(),
            bold: false,
            color: Some("666666"),
        });
    }
    if let Some(body) = &descriptor.body_text {
        blocks.extend(body.split('\n').map(|l| Block::Paragraph(l.to_string())));
    }
    for section in &descriptor.sections {
        blocks.push(Block::Heading {
            level: 2,
            text: section.heading.clone(),
        });
        blocks.extend(section.body.split('\n').map(|l| Block::Paragraph(l.to_string())));
    }
    for slide in &descriptor.slides {
        blocks.push(Block::Heading {
            level: 2,
            text: slide.title.clone(),
        });
        blocks.extend(slide.bullets.iter().map(|b| Block::Bullet(b.clone())));
        if let Some(footer) = &slide.footer {
            blocks.push(Block::Paragraph(footer.clone()));
        }
    }
    if !descriptor.table_rows.is_empty() {
        blocks.push(Block::Table(descriptor.table_rows.clone()));
    }
    if let Some(hint) = &descriptor.chart_hint {
        let rows = hint
            .labels
            .iter()
            .zip(&hint.values)
            .map(|(label, value)| vec![label.clone(), value.to_string()])
            .collect::<Vec<_>>();
        if !rows.is_empty() {
            blocks.push(Block::Table(rows));
        }
    }
    blocks
}

/// Package blocks as a .docx
pub(crate) fn build(blocks: &[Block]) -> Result<Vec<u8>> {
    let body: String = blocks.iter().map(render_block).collect();
    let document = format!(
        r#"{}<w:document xmlns:w="{}"><w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
        XML_HEADER, W_NS, body
    );

    zip_package(&[
        ("[Content_Types].xml".to_string(), content_types()),
        ("_rels/.rels".to_string(), root_rels()),
        ("word/document.xml".to_string(), document),
        ("word/_rels/document.xml.rels".to_string(), document_rels()),
        ("word/styles.xml".to_string(), styles()),
    ])
}

fn text_run(text: &str, props: &str) -> String {
    format!(
        r#"<w:r>{}<w:t xml:space="preserve">{}</w:t></w:r>"#,
        props,
        xml_escape(text)
    )
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Heading { level, text } => format!(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading{}"/></w:pPr>{}</w:p>"#,
            level,
            text_run(text, "")
        ),
        Block::Paragraph(text) => format!(
            r#"<w:p><w:pPr><w:spacing w:before="200"/></w:pPr>{}</w:p>"#,
            text_run(text, "")
        ),
        Block::Bullet(text) => format!(
            r#"<w:p><w:pPr><w:ind w:left="360" w:hanging="360"/></w:pPr>{}</w:p>"#,
            text_run(&format!("\u{2022} {}", text), "")
        ),
        Block::Run { text, bold, color } => {
            let mut props = String::from("<w:rPr>");
            if *bold {
                props.push_str("<w:b/>");
            }
            if let Some(color) = color {
                props.push_str(&format!(r#"<w:color w:val="{}"/>"#, color));
            }
            props.push_str("</w:rPr>");
            format!(
                r#"<w:p><w:pPr><w:spacing w:before="400"/></w:pPr>{}</w:p>"#,
                text_run(text, &props)
            )
        }
        Block::Table(rows) => render_table(rows),
        Block::Rule => format!(
            "<w:p>{}</w:p>",
            text_run(&"_".repeat(50), r#"<w:rPr><w:color w:val="EEEEEE"/></w:rPr>"#)
        ),
    }
}

fn render_table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let grid: String = (0..columns).map(|_| r#"<w:gridCol w:w="2000"/>"#).collect();
    let border = r#"w:val="single" w:sz="4" w:space="0" w:color="BFBFBF""#;
    let mut xml = format!(
        r#"<w:tbl><w:tblPr><w:tblW w:w="0" w:type="auto"/><w:tblBorders><w:top {b}/><w:left {b}/><w:bottom {b}/><w:right {b}/><w:insideH {b}/><w:insideV {b}/></w:tblBorders></w:tblPr><w:tblGrid>{g}</w:tblGrid>"#,
        b = border,
        g = grid
    );
    for (index, row) in rows.iter().enumerate() {
        xml.push_str("<w:tr>");
        for column in 0..columns {
            let text = row.get(column).map(String::as_str).unwrap_or("");
            // First row reads as a header
            let props = if index == 0 { "<w:rPr><w:b/></w:rPr>" } else { "" };
            xml.push_str(&format!(
                "<w:tc><w:p>{}</w:p></w:tc>",
                text_run(text, props)
            ));
        }
        xml.push_str("</w:tr>");
    }
    // Word requires a paragraph after a table
    xml.push_str("</w:tbl><w:p/>");
    xml
}

fn content_types() -> String {
    format!(
        r#"{}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#,
        XML_HEADER
    )
}

fn root_rels() -> String {
    format!(
        r#"{}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#,
        XML_HEADER
    )
}

fn document_rels() -> String {
    format!(
        r#"{}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
        XML_HEADER
    )
}

fn styles() -> String {
    format!(
        r#"{h}<w:styles xmlns:w="{ns}"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/><w:sz w:val="22"/></w:rPr></w:rPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:color w:val="{c}"/><w:sz w:val="36"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:spacing w:before="240" w:after="80"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:sz w:val="28"/></w:rPr></w:style></w:styles>"#,
        h = XML_HEADER,
        ns = W_NS,
        c = BRAND_COLOR
    )
}
