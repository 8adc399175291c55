// ABOUTME: SpreadsheetML writer producing a single-sheet workbook of inline strings
// ABOUTME: Missing tables yield a lone "No Data" cell

use super::{xml_escape, zip_package, XML_HEADER};
use crate::error::Result;
use crate::tools::FileDescriptor;

/// Name of the only worksheet
pub(crate) const SHEET_NAME: &str = "OPCO Data";

const NO_DATA: &str = "No Data";

/// Rows to write: the table, else chart data, else a "No Data" cell
pub(crate) fn rows_for(descriptor: &FileDescriptor) -> Vec<Vec<String>> {
    if !descriptor.table_rows.is_empty() {
        return descriptor.table_rows.clone();
    }
    if let Some(hint) = &descriptor.chart_hint {
        let rows: Vec<Vec<String>> = hint
            .labels
            .iter()
            .zip(&hint.values)
            .map(|(label, value)| vec![label.clone(), value.to_string()])
            .collect();
        if !rows.is_empty() {
            return rows;
        }
    }
    vec![vec![NO_DATA.to_string()]]
}

/// Column letters for a zero-based index: 0 -> A, 26 -> AA
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.iter().rev().collect()
}

pub(crate) fn build(rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut sheet_data = String::new();
    for (r, row) in rows.iter().enumerate() {
        sheet_data.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            sheet_data.push_str(&format!(
                r#"<c r="{}{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_name(c),
                r + 1,
                xml_escape(value)
            ));
        }
        sheet_data.push_str("</row>");
    }

    let sheet = format!(
        r#"{}<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
        XML_HEADER, sheet_data
    );
    let workbook = format!(
        r#"{}<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        XML_HEADER,
        xml_escape(SHEET_NAME)
    );
    let workbook_rels = format!(
        r#"{}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
        XML_HEADER
    );
    let root_rels = format!(
        r#"{}<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
        XML_HEADER
    );
    let content_types = format!(
        r#"{}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#,
        XML_HEADER
    );

    zip_package(&[
        ("[Content_Types].xml".to_string(), content_types),
        ("_rels/.rels".to_string(), root_rels),
        ("xl/workbook.xml".to_string(), workbook),
        ("xl/_rels/workbook.xml.rels".to_string(), workbook_rels),
        ("xl/worksheets/sheet1.xml".to_string(), sheet),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::extract::read_xlsx_sheets;
    use crate::models::{ChartKind, FileFormat};
    use crate::tools::ChartHint;

    #[test]
    fn test_column_name() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn test_empty_cells_keep_positions() {
        let bytes = build(&[vec!["a".into(), "".into(), "c".into()]]).unwrap();
        let sheets = read_xlsx_sheets(&bytes).unwrap();
        assert_eq!(sheets[0][0], vec!["a", "", "c"]);
    }

    #[test]
    fn test_special_characters_survive() {
        let bytes = build(&[vec!["R&D <x> \"q\"".into(), "  padded ".into()]]).unwrap();
        let sheets = read_xlsx_sheets(&bytes).unwrap();
        assert_eq!(sheets[0][0], vec!["R&D <x> \"q\"", "  padded "]);
    }

    #[test]
    fn test_chart_hint_used_without_table() {
        let mut descriptor = FileDescriptor::new(FileFormat::Xlsx, "x", "x");
        descriptor.chart_hint = Some(ChartHint {
            kind: ChartKind::Pie,
            labels: vec!["a".into()],
            values: vec![0.25],
        });
        assert_eq!(rows_for(&descriptor), vec![vec!["a", "0.25"]]);
    }
}
