// ABOUTME: Text extraction for uploaded files, dispatched by extension
// ABOUTME: Built-in extractors for plain text, DOCX, XLSX and PDF text layers (plain or Flate streams)

use crate::error::{BuddyError, Result};
use crate::models::PageImage;
use flate2::read::ZlibDecoder;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::OnceLock;

/// Families of uploads that share an extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Text,
    Pdf,
    Docx,
    Spreadsheet,
}

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "tsv", "json", "xml", "html", "htm", "log", "yaml", "yml",
    "toml", "ini", "rtf",
];

impl DocumentKind {
    /// Kind for a lowercase extension, or None when the extension is unknown
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            "xlsx" | "xlsm" | "xls" => Some(DocumentKind::Spreadsheet),
            e if TEXT_EXTENSIONS.contains(&e) => Some(DocumentKind::Text),
            _ => None,
        }
    }
}

/// Lowercase extension of a file name, if it has one
pub fn extension_of(name: &str) -> Option<String> {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Result of converting one upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub text: String,
    /// Rendered pages, for extractors that rasterize
    pub pages: Vec<PageImage>,
}

impl Extraction {
    pub fn text(text: String) -> Self {
        Self {
            text,
            pages: Vec::new(),
        }
    }
}

/// Converts raw upload bytes to text (and optionally page images)
pub trait Extractor: Send + Sync {
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<Extraction>;
}

/// UTF-8 passthrough (lossy)
pub struct TextExtractor;

impl Extractor for TextExtractor {
    fn extract(&self, _name: &str, bytes: &[u8]) -> Result<Extraction> {
        let text = String::from_utf8_lossy(bytes);
        Ok(Extraction::text(text.trim_start_matches('\u{feff}').to_string()))
    }
}

/// Raw paragraph text of `word/document.xml`
pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<Extraction> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| BuddyError::extraction(name, format!("not a DOCX package: {}", e)))?;
        let xml = read_entry(&mut archive, "word/document.xml")
            .map_err(|e| BuddyError::extraction(name, e))?;
        let text = docx_xml_to_text(&xml);
        if text.trim().is_empty() {
            return Err(BuddyError::extraction(name, "document has no text"));
        }
        Ok(Extraction::text(text))
    }
}

/// Every worksheet as tab-separated rows, sheets separated by a newline
pub struct XlsxExtractor;

impl Extractor for XlsxExtractor {
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<Extraction> {
        let sheets = read_xlsx_sheets(bytes).map_err(|e| BuddyError::extraction(name, e))?;
        let text = sheets
            .iter()
            .map(|rows| {
                rows.iter()
                    .map(|cells| cells.join("\t"))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(BuddyError::extraction(name, "workbook has no cell values"));
        }
        Ok(Extraction::text(text))
    }
}

/// Text-showing operators of plain and FlateDecode content streams. Other
/// filters need a host-registered extractor for `DocumentKind::Pdf`.
pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<Extraction> {
        if !bytes.starts_with(b"%PDF") {
            return Err(BuddyError::extraction(name, "missing %PDF header"));
        }
        let (text, undecoded) = pdf_text(bytes);
        if text.trim().is_empty() {
            let reason = if undecoded > 0 {
                format!(
                    "{} content stream(s) could not be decoded and no text layer",
                    undecoded
                )
            } else {
                "no text layer".to_string()
            };
            return Err(BuddyError::extraction(name, reason));
        }
        Ok(Extraction::text(text))
    }
}

// ============================================================================
// OOXML helpers
// ============================================================================

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    path: &str,
) -> std::result::Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("missing {}: {}", path, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("reading {}: {}", path, e))?;
    Ok(content)
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex"))
}

/// Decode the five XML entities and numeric character references
pub fn unescape_xml(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);").expect("static regex"));
    re.replace_all(text, |caps: &regex::Captures| {
        let entity = &caps[1];
        match entity {
            "amp" => "&".to_string(),
            "lt" => "<".to_string(),
            "gt" => ">".to_string(),
            "quot" => "\"".to_string(),
            "apos" => "'".to_string(),
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else {
                    entity[1..].parse::<u32>().ok()
                };
                code.and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_default()
            }
        }
    })
    .into_owned()
}

fn docx_xml_to_text(xml: &str) -> String {
    static BREAKS: OnceLock<Regex> = OnceLock::new();
    let breaks = BREAKS.get_or_init(|| {
        Regex::new(r"</w:p>|<w:br\s*/>|<w:cr\s*/>").expect("static regex")
    });
    static TABS: OnceLock<Regex> = OnceLock::new();
    let tabs = TABS.get_or_init(|| Regex::new(r"<w:tab\s*/>").expect("static regex"));

    let with_breaks = breaks.replace_all(xml, "\n");
    let with_tabs = tabs.replace_all(&with_breaks, "\t");
    let stripped = tag_re().replace_all(&with_tabs, "");
    unescape_xml(stripped.trim_end())
}

/// Text runs (`<t>`) inside one fragment, concatenated
fn text_runs(fragment: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>").expect("static regex"));
    re.captures_iter(fragment)
        .map(|c| unescape_xml(&c[1]))
        .collect()
}

/// Columns in a worksheet (A..XFD)
const MAX_COLUMNS: usize = 16_384;

/// Zero-based column of a cell reference such as "C7"; None past XFD
fn column_index(reference: &str) -> Option<usize> {
    let mut index = 0usize;
    let mut letters = 0;
    for c in reference.chars().take_while(|c| c.is_ascii_alphabetic()) {
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
        if index > MAX_COLUMNS {
            return None;
        }
        letters += 1;
    }
    if letters == 0 {
        return None;
    }
    Some(index - 1)
}

/// Read every worksheet of an XLSX package as rows of cell strings, in sheet order
pub fn read_xlsx_sheets(bytes: &[u8]) -> std::result::Result<Vec<Vec<Vec<String>>>, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| format!("not an XLSX package: {}", e))?;

    let shared: Vec<String> = match read_entry(&mut archive, "xl/sharedStrings.xml") {
        Ok(xml) => {
            static SI: OnceLock<Regex> = OnceLock::new();
            let si = SI.get_or_init(|| Regex::new(r"(?s)<si>(.*?)</si>").expect("static regex"));
            si.captures_iter(&xml).map(|c| text_runs(&c[1])).collect()
        }
        Err(_) => Vec::new(),
    };

    static SHEET_NAME: OnceLock<Regex> = OnceLock::new();
    let sheet_name = SHEET_NAME
        .get_or_init(|| Regex::new(r"^xl/worksheets/sheet(\d+)\.xml$").expect("static regex"));
    let mut sheet_paths: BTreeMap<u32, String> = BTreeMap::new();
    for name in archive.file_names() {
        if let Some(caps) = sheet_name.captures(name) {
            if let Ok(n) = caps[1].parse::<u32>() {
                sheet_paths.insert(n, name.to_string());
            }
        }
    }
    if sheet_paths.is_empty() {
        return Err("workbook has no worksheets".to_string());
    }

    static ROW: OnceLock<Regex> = OnceLock::new();
    let row_re = ROW
        .get_or_init(|| Regex::new(r"(?s)<row\b[^>]*?(?:/>|>(.*?)</row>)").expect("static regex"));
    static CELL: OnceLock<Regex> = OnceLock::new();
    let cell_re = CELL
        .get_or_init(|| Regex::new(r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)").expect("static regex"));
    static VALUE: OnceLock<Regex> = OnceLock::new();
    let value_re =
        VALUE.get_or_init(|| Regex::new(r"(?s)<v>(.*?)</v>").expect("static regex"));
    static ATTR: OnceLock<Regex> = OnceLock::new();
    let attr_re = ATTR
        .get_or_init(|| Regex::new(r#"\b(r|t)="([^"]*)""#).expect("static regex"));

    let mut sheets = Vec::new();
    for path in sheet_paths.values() {
        let xml = read_entry(&mut archive, path)?;
        let mut rows = Vec::new();
        for row in row_re.captures_iter(&xml) {
            let body = row.get(1).map(|m| m.as_str()).unwrap_or("");
            let mut cells: Vec<String> = Vec::new();
            for cell in cell_re.captures_iter(body) {
                let mut reference = None;
                let mut cell_type = "n".to_string();
                for attr in attr_re.captures_iter(&cell[1]) {
                    match &attr[1] {
                        "r" => reference = Some(attr[2].to_string()),
                        _ => cell_type = attr[2].to_string(),
                    }
                }
                let inner = cell.get(2).map(|m| m.as_str()).unwrap_or("");
                let raw_value = value_re
                    .captures(inner)
                    .map(|v| unescape_xml(&v[1]))
                    .unwrap_or_default();
                let value = match cell_type.as_str() {
                    "s" => raw_value
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared.get(i).cloned())
                        .unwrap_or_default(),
                    "inlineStr" => text_runs(inner),
                    _ => raw_value,
                };
                // Missing or out-of-range references continue the row
                let column = reference
                    .as_deref()
                    .and_then(column_index)
                    .unwrap_or(cells.len())
                    .min(MAX_COLUMNS);
                while cells.len() < column {
                    cells.push(String::new());
                }
                if column < cells.len() {
                    cells[column] = value;
                } else {
                    cells.push(value);
                }
            }
            rows.push(cells);
        }
        sheets.push(rows);
    }
    Ok(sheets)
}

// ============================================================================
// PDF text layer
// ============================================================================

/// Upper bound on one inflated stream
const MAX_STREAM_BYTES: u64 = 16 * 1024 * 1024;

/// Extract text from plain and FlateDecode content streams. Returns the text
/// and the number of candidate streams that could not be decoded.
fn pdf_text(bytes: &[u8]) -> (String, usize) {
    let mut lines: Vec<String> = Vec::new();
    let mut undecoded = 0;
    let mut cursor = 0;

    while let Some(start) = find(bytes, b"stream", cursor) {
        // "endstream" also contains "stream"
        if start >= 3 && &bytes[start - 3..start] == b"end" {
            cursor = start + 6;
            continue;
        }
        let mut data_start = start + 6;
        if bytes.get(data_start) == Some(&b'\r') {
            data_start += 1;
        }
        if bytes.get(data_start) == Some(&b'\n') {
            data_start += 1;
        }
        let Some(end) = find(bytes, b"endstream", data_start) else {
            break;
        };
        let head = &bytes[..start];
        let dict_start = rfind(head, b"obj")
            .or_else(|| rfind(head, b"<<"))
            .unwrap_or(0);
        let dictionary = &bytes[dict_start..start];
        let data = &bytes[data_start..end];
        if holds_text(dictionary) {
            if find(dictionary, b"/Filter", 0).is_none() {
                lines.extend(content_stream_lines(data));
            } else if let Some(inflated) = flate_decode(dictionary, data) {
                lines.extend(content_stream_lines(&inflated));
            } else {
                undecoded += 1;
            }
        }
        cursor = end + 9;
    }

    let text = lines
        .into_iter()
        .map(|l| l.trim_end().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (text, undecoded)
}

/// Streams that can carry text-showing operators
fn holds_text(dictionary: &[u8]) -> bool {
    const SKIP: &[&[u8]] = &[
        b"/Image",
        b"/FontFile",
        b"/Length1",
        b"/Metadata",
        b"/XRef",
        b"/ObjStm",
        b"/EmbeddedFile",
    ];
    !SKIP.iter().any(|marker| find(dictionary, marker, 0).is_some())
}

/// Inflate a stream whose only filter is FlateDecode
fn flate_decode(dictionary: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    const FILTERS: &[&[u8]] = &[
        b"/FlateDecode",
        b"/LZWDecode",
        b"/ASCII85Decode",
        b"/ASCIIHexDecode",
        b"/RunLengthDecode",
        b"/DCTDecode",
        b"/JPXDecode",
        b"/CCITTFaxDecode",
        b"/JBIG2Decode",
    ];
    let used: Vec<&[u8]> = FILTERS
        .iter()
        .copied()
        .filter(|f| find(dictionary, f, 0).is_some())
        .collect();
    if used != [FILTERS[0]] {
        return None;
    }
    let mut inflated = Vec::new();
    ZlibDecoder::new(data)
        .take(MAX_STREAM_BYTES)
        .read_to_end(&mut inflated)
        .ok()?;
    Some(inflated)
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Walk a content stream, collecting shown strings into lines
fn content_stream_lines(stream: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut pending: Vec<String> = Vec::new();
    let mut i = 0;

    while i < stream.len() {
        let b = stream[i];
        match b {
            b'(' => {
                let (s, next) = literal_string(stream, i);
                pending.push(s);
                i = next;
            }
            b'<' if stream.get(i + 1) == Some(&b'<') => i += 2,
            b'<' => {
                let (s, next) = hex_string(stream, i);
                pending.push(s);
                i = next;
            }
            b'%' => {
                while i < stream.len() && stream[i] != b'\n' && stream[i] != b'\r' {
                    i += 1;
                }
            }
            c if c.is_ascii_alphabetic() || c == b'\'' || c == b'"' || c == b'*' => {
                let op_start = i;
                while i < stream.len()
                    && (stream[i].is_ascii_alphanumeric()
                        || stream[i] == b'*'
                        || stream[i] == b'\''
                        || stream[i] == b'"')
                {
                    i += 1;
                }
                let op = &stream[op_start..i];
                match op {
                    b"Tj" | b"TJ" => line.push_str(&pending.concat()),
                    b"'" | b"\"" => {
                        lines.push(std::mem::take(&mut line));
                        line.push_str(&pending.concat());
                    }
                    b"Td" | b"TD" | b"T*" | b"ET" => {
                        if !line.is_empty() {
                            lines.push(std::mem::take(&mut line));
                        }
                    }
                    _ => {}
                }
                pending.clear();
            }
            _ => i += 1,
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Parse `( ... )` starting at `start`; returns the decoded string and the index after it
fn literal_string(stream: &[u8], start: usize) -> (String, usize) {
    let mut out = String::new();
    let mut depth = 0usize;
    let mut i = start;
    while i < stream.len() {
        let b = stream[i];
        match b {
            b'(' => {
                if depth > 0 {
                    out.push('(');
                }
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return (out, i);
                }
                out.push(')');
            }
            b'\\' => {
                let Some(&next) = stream.get(i + 1) else {
                    return (out, stream.len());
                };
                i += 2;
                match next {
                    b'n' => out.push('\n'),
                    b'r' => out.push('\r'),
                    b't' => out.push('\t'),
                    b'b' | b'f' => {}
                    b'0'..=b'7' => {
                        let mut code = (next - b'0') as u32;
                        let mut digits = 1;
                        while digits < 3 {
                            match stream.get(i) {
                                Some(d @ b'0'..=b'7') => {
                                    code = code * 8 + (d - b'0') as u32;
                                    i += 1;
                                    digits += 1;
                                }
                                _ => break,
                            }
                        }
                        if let Some(c) = char::from_u32(code & 0xff) {
                            out.push(c);
                        }
                    }
                    b'\r' | b'\n' => {}
                    other => out.push(other as char),
                }
            }
            other => {
                out.push(other as char);
                i += 1;
            }
        }
    }
    (out, i)
}

/// Parse `< ... >` hex string starting at `start`
fn hex_string(stream: &[u8], start: usize) -> (String, usize) {
    let mut digits = Vec::new();
    let mut i = start + 1;
    while i < stream.len() && stream[i] != b'>' {
        if stream[i].is_ascii_hexdigit() {
            digits.push(stream[i]);
        }
        i += 1;
    }
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }
    let out = digits
        .chunks(2)
        .filter_map(|pair| std::str::from_utf8(pair).ok())
        .filter_map(|hex| u8::from_str_radix(hex, 16).ok())
        .map(|byte| byte as char)
        .collect();
    (out, (i + 1).min(stream.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn package(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buffer);
            for (name, content) in entries {
                zip.start_file(*name, FileOptions::default()).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Report.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension_of("dir/notes.tar.md").as_deref(), Some("md"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of(".bashrc"), None);
    }

    #[test]
    fn test_kind_detection() {
        assert_eq!(DocumentKind::from_extension("xls"), Some(DocumentKind::Spreadsheet));
        assert_eq!(DocumentKind::from_extension("csv"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_extension("exe"), None);
    }

    #[test]
    fn test_text_extractor_strips_bom() {
        let bytes = "\u{feff}hello".as_bytes();
        assert_eq!(TextExtractor.extract("a.txt", bytes).unwrap().text, "hello");
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &amp; b &lt;c&gt; &#65;&#x42;"), "a & b <c> AB");
    }

    #[test]
    fn test_docx_paragraphs() {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>First &amp; foremost</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t><w:tab/><w:t>col</w:t></w:r></w:p></w:body></w:document>"#;
        let bytes = package(&[("word/document.xml", xml)]);
        let text = DocxExtractor.extract("a.docx", &bytes).unwrap().text;
        assert_eq!(text, "First & foremost\nSecond\tcol");
    }

    #[test]
    fn test_docx_rejects_non_zip() {
        let err = DocxExtractor.extract("a.docx", b"plain").unwrap_err();
        assert!(matches!(err, BuddyError::Extraction { .. }));
    }

    #[test]
    fn test_xlsx_shared_and_inline_strings() {
        let shared = r#"<sst><si><t>Name</t></si><si><r><t>Tot</t></r><r><t>al</t></r></si></sst>"#;
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
            <row r="2"/>
            <row r="3"><c r="A3" t="inlineStr"><is><t>x</t></is></c><c r="C3"><v>42</v></c></row>
        </sheetData></worksheet>"#;
        let bytes = package(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);
        let sheets = read_xlsx_sheets(&bytes).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0][0], vec!["Name", "Total"]);
        assert!(sheets[0][1].is_empty());
        assert_eq!(sheets[0][2], vec!["x", "", "42"]);

        let text = XlsxExtractor.extract("a.xlsx", &bytes).unwrap().text;
        assert_eq!(text, "Name\tTotal\n\nx\t\t42");
    }

    #[test]
    fn test_xlsx_sheets_in_numeric_order() {
        let one = r#"<worksheet><sheetData><row><c t="inlineStr"><is><t>one</t></is></c></row></sheetData></worksheet>"#;
        let ten = r#"<worksheet><sheetData><row><c t="inlineStr"><is><t>ten</t></is></c></row></sheetData></worksheet>"#;
        let two = r#"<worksheet><sheetData><row><c t="inlineStr"><is><t>two</t></is></c></row></sheetData></worksheet>"#;
        let bytes = package(&[
            ("xl/worksheets/sheet10.xml", ten),
            ("xl/worksheets/sheet1.xml", one),
            ("xl/worksheets/sheet2.xml", two),
        ]);
        let text = XlsxExtractor.extract("a.xlsx", &bytes).unwrap().text;
        assert_eq!(text, "one\ntwo\nten");
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("C7"), Some(2));
        assert_eq!(column_index("AA3"), Some(26));
        assert_eq!(column_index("XFD1"), Some(MAX_COLUMNS - 1));
        assert_eq!(column_index("XFE1"), None);
        assert_eq!(column_index("ZZZZZZZZZZZZZZZ1"), None);
        assert_eq!(column_index("7"), None);
    }

    #[test]
    fn test_xlsx_out_of_range_references_continue_the_row() {
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1"><v>1</v></c><c r="ZZZZZZZZZZZZZZZ1"><v>2</v></c><c r="ZZZZZZ1"><v>3</v></c></row>
        </sheetData></worksheet>"#;
        let bytes = package(&[("xl/worksheets/sheet1.xml", sheet)]);
        let sheets = read_xlsx_sheets(&bytes).unwrap();
        assert_eq!(sheets[0][0], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_pdf_uncompressed_text() {
        let pdf = b"%PDF-1.4\n1 0 obj\n<< /Length 60 >>\nstream\nBT /F1 12 Tf 20 800 Td (Hello \\(PDF\\)) Tj 0 -14 Td [(Wor) -20 (ld)] TJ ET\nendstream\nendobj\n%%EOF";
        let text = PdfExtractor.extract("a.pdf", pdf).unwrap().text;
        assert_eq!(text, "Hello (PDF)\nWorld");
    }

    #[test]
    fn test_pdf_hex_and_octal_strings() {
        let pdf = b"%PDF-1.4\n<< >>\nstream\nBT <48692021> Tj T* (caf\\351) Tj ET\nendstream\n";
        let text = PdfExtractor.extract("a.pdf", pdf).unwrap().text;
        assert_eq!(text, "Hi !\ncaf\u{e9}");
    }

    fn flate_pdf(content: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(content).unwrap();
        let stream = encoder.finish().unwrap();

        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.5\n4 0 obj\n");
        pdf.extend_from_slice(
            format!("<< /Length {} /Filter /FlateDecode >>\nstream\n", stream.len()).as_bytes(),
        );
        pdf.extend_from_slice(&stream);
        pdf.extend_from_slice(b"\nendstream\nendobj\n%%EOF");
        pdf
    }

    #[test]
    fn test_pdf_flate_content_stream() {
        let pdf = flate_pdf(b"BT /F1 12 Tf 72 720 Td (Quarterly revenue grew) Tj 0 -14 Td (by 4%) Tj ET");
        let text = PdfExtractor.extract("report.pdf", &pdf).unwrap().text;
        assert_eq!(text, "Quarterly revenue grew\nby 4%");
    }

    #[test]
    fn test_pdf_skips_image_streams() {
        let pdf = b"%PDF-1.5\n5 0 obj\n<< /Type /XObject /Subtype /Image /Filter /DCTDecode >>\nstream\n(x) Tj\nendstream\nendobj\n";
        match PdfExtractor.extract("scan.pdf", pdf).unwrap_err() {
            BuddyError::Extraction { reason, .. } => assert_eq!(reason, "no text layer"),
            other => panic!("Expected Extraction error, got {:?}", other),
        }
    }

    #[test]
    fn test_pdf_undecodable_stream_is_extraction_error() {
        let pdf = b"%PDF-1.5\n<< /Length 4 /Filter /FlateDecode >>\nstream\nxxxx\nendstream\n";
        match PdfExtractor.extract("scan.pdf", pdf).unwrap_err() {
            BuddyError::Extraction { name, reason } => {
                assert_eq!(name, "scan.pdf");
                assert!(reason.contains("could not be decoded"));
            }
            other => panic!("Expected Extraction error, got {:?}", other),
        }
    }

    #[test]
    fn test_pdf_requires_header() {
        assert!(PdfExtractor.extract("a.pdf", b"hello").is_err());
    }
}
