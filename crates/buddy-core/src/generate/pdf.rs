// ABOUTME: Minimal PDF writer: Helvetica text with word wrapping and automatic page breaks
// ABOUTME: Content streams stay uncompressed so generated reports remain text-searchable

use crate::tools::FileDescriptor;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 57.0;

/// Brand red and body gray as PDF fill colors
const TITLE_COLOR: &str = "0.792 0.024 0.027";
const HEADING_COLOR: &str = "0.2 0.2 0.2";
const BODY_COLOR: &str = "0.196 0.196 0.196";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Style {
    Title,
    Heading,
    Body,
}

impl Style {
    fn size(self) -> f32 {
        match self {
            Style::Title => 20.0,
            Style::Heading => 13.0,
            Style::Body => 10.0,
        }
    }

    fn color(self) -> &'static str {
        match self {
            Style::Title => TITLE_COLOR,
            Style::Heading => HEADING_COLOR,
            Style::Body => BODY_COLOR,
        }
    }

    fn leading(self) -> f32 {
        self.size() * 1.4
    }

    /// Characters per line, from Helvetica's average glyph width of about half an em
    fn wrap_width(self) -> usize {
        ((PAGE_WIDTH - 2.0 * MARGIN) / (self.size() * 0.5)) as usize
    }
}

/// Lines in reading order
fn lines_for(descriptor: &FileDescriptor) -> Vec<(Style, String)> {
    let mut lines = Vec::new();
    if !descriptor.title.is_empty() {
        lines.push((Style::Title, descriptor.title.clone()));
    }
    if let Some(subtitle) = &descriptor.subtitle {
        lines.push((Style::Heading, subtitle.clone()));
    }
    if let Some(body) = &descriptor.body_text {
        lines.extend(body.split('\n').map(|l| (Style::Body, l.to_string())));
    }
    for section in &descriptor.sections {
        lines.push((Style::Heading, section.heading.clone()));
        lines.extend(section.body.split('\n').map(|l| (Style::Body, l.to_string())));
    }
    for slide in &descriptor.slides {
        lines.push((Style::Heading, slide.title.clone()));
        lines.extend(slide.bullets.iter().map(|b| (Style::Body, format!("- {}", b))));
        if let Some(footer) = &slide.footer {
            lines.push((Style::Body, footer.clone()));
        }
    }
    for row in &descriptor.table_rows {
        lines.push((Style::Body, row.join(" | ")));
    }
    if let Some(hint) = &descriptor.chart_hint {
        for (label, value) in hint.labels.iter().zip(&hint.values) {
            lines.push((Style::Body, format!("{}: {}", label, value)));
        }
    }
    lines
}

/// Greedy word wrap; words longer than the width are split
pub(crate) fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current_len == 0 {
            word.len()
        } else {
            current_len + 1 + word.len()
        };
        if needed > width && current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }
    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Escape a string as a PDF literal in WinAnsi encoding, octal for non-ASCII
fn pdf_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('(');
    for c in text.chars() {
        let byte = match c {
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            c if (c as u32) < 0x20 => b' ',
            c if (c as u32) < 0x80 => c as u8,
            c if (0xA0..=0xFF).contains(&(c as u32)) => c as u32 as u8,
            _ => b'?',
        };
        match byte {
            b'(' | b')' | b'\\' => {
                out.push('\\');
                out.push(byte as char);
            }
            0x20..=0x7E => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03o}", byte)),
        }
    }
    out.push(')');
    out
}

/// Render the descriptor as a PDF document
pub(crate) fn build(descriptor: &FileDescriptor) -> Vec<u8> {
    let mut pages: Vec<String> = Vec::new();
    let mut stream = String::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    for (style, text) in lines_for(descriptor) {
        if style != Style::Body && !stream.is_empty() {
            y -= style.leading() * 0.5;
        }
        for line in wrap(&text, style.wrap_width()) {
            if y - style.leading() < MARGIN {
                pages.push(std::mem::take(&mut stream));
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= style.leading();
            if line.is_empty() {
                continue;
            }
            stream.push_str(&format!(
                "BT /F1 {} Tf {} rg {} {} Td {} Tj ET\n",
                style.size(),
                style.color(),
                MARGIN,
                y,
                pdf_literal(&line)
            ));
        }
    }
    pages.push(stream);

    // Objects: 1 catalog, 2 page tree, 3 font, then a page and its content per page
    let mut objects: Vec<String> = Vec::new();
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + i * 2).collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        page_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" "),
        pages.len()
    ));
    objects.push(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    );
    for (index, content) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            PAGE_WIDTH,
            PAGE_HEIGHT,
            page_ids[index] + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", index + 1, object));
    }
    let xref_at = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    out.into_bytes()
}
