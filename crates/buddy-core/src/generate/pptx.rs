// ABOUTME: PresentationML writer: a branded cover slide plus one slide per content entry
// ABOUTME: Emits the minimal master, layout and theme parts a 16:9 deck needs

use super::{xml_escape, zip_package, BRAND_COLOR, XML_HEADER};
use crate::error::Result;
use crate::tools::FileDescriptor;

const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const P_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// 16:9 slide size in EMU
const SLIDE_CX: i64 = 9_144_000;
const SLIDE_CY: i64 = 5_143_500;
const EMU_PER_INCH: f64 = 914_400.0;

/// Text of one content slide
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SlideContent {
    pub title: String,
    pub bullets: Vec<String>,
    pub footer: Option<String>,
}

/// Content slides, taken from the first populated source: slides, sections, body
/// text. A table adds one more slide.
pub(crate) fn slides_for(descriptor: &FileDescriptor) -> Vec<SlideContent> {
    let mut slides: Vec<SlideContent> = if !descriptor.slides.is_empty() {
        descriptor
            .slides
            .iter()
            .map(|s| SlideContent {
                title: s.title.clone(),
                bullets: s.bullets.clone(),
                footer: s.footer.clone(),
            })
            .collect()
    } else if !descriptor.sections.is_empty() {
        descriptor
            .sections
            .iter()
            .map(|s| SlideContent {
                title: s.heading.clone(),
                bullets: non_empty_lines(&s.body),
                footer: None,
            })
            .collect()
    } else if let Some(body) = &descriptor.body_text {
        vec![SlideContent {
            title: descriptor.title.clone(),
            bullets: non_empty_lines(body),
            footer: None,
        }]
    } else {
        Vec::new()
    };

    if !descriptor.table_rows.is_empty() {
        slides.push(SlideContent {
            title: descriptor.title.clone(),
            bullets: descriptor
                .table_rows
                .iter()
                .map(|row| row.join(" | "))
                .collect(),
            footer: None,
        });
    }
    slides
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH) as i64
}

pub(crate) fn build(descriptor: &FileDescriptor) -> Result<Vec<u8>> {
    let cover_title = if descriptor.title.is_empty() {
        "Briefing"
    } else {
        descriptor.title.as_str()
    };
    let mut slides = vec![cover_slide(cover_title, descriptor.subtitle.as_deref())];
    slides.extend(slides_for(descriptor).iter().map(content_slide));
    let count = slides.len();

    let office_kind = format!("{}/officeDocument", REL_TYPE);
    let layout_kind = format!("{}/slideLayout", REL_TYPE);
    let master_kind = format!("{}/slideMaster", REL_TYPE);
    let theme_kind = format!("{}/theme", REL_TYPE);
    let slide_rels = rels(&[(
        "rId1",
        layout_kind.as_str(),
        "../slideLayouts/slideLayout1.xml",
    )]);

    let mut parts = vec![
        ("[Content_Types].xml".to_string(), content_types(count)),
        (
            "_rels/.rels".to_string(),
            rels(&[("rId1", office_kind.as_str(), "ppt/presentation.xml")]),
        ),
        ("ppt/presentation.xml".to_string(), presentation(count)),
        ("ppt/_rels/presentation.xml.rels".to_string(), presentation_rels(count)),
        ("ppt/slideMasters/slideMaster1.xml".to_string(), slide_master()),
        (
            "ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(),
            rels(&[
                ("rId1", layout_kind.as_str(), "../slideLayouts/slideLayout1.xml"),
                ("rId2", theme_kind.as_str(), "../theme/theme1.xml"),
            ]),
        ),
        ("ppt/slideLayouts/slideLayout1.xml".to_string(), slide_layout()),
        (
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels".to_string(),
            rels(&[("rId1", master_kind.as_str(), "../slideMasters/slideMaster1.xml")]),
        ),
        ("ppt/theme/theme1.xml".to_string(), theme()),
    ];
    for (index, slide) in slides.into_iter().enumerate() {
        let n = index + 1;
        parts.push((format!("ppt/slides/slide{}.xml", n), slide));
        parts.push((format!("ppt/slides/_rels/slide{}.xml.rels", n), slide_rels.clone()));
    }
    zip_package(&parts)
}

struct TextStyle<'a> {
    size: u32,
    bold: bool,
    color: &'a str,
    centered: bool,
}

fn run(text: &str, style: &TextStyle) -> String {
    format!(
        r#"<a:r><a:rPr lang="en-US" sz="{}" b="{}" dirty="0"><a:solidFill><a:srgbClr val="{}"/></a:solidFill></a:rPr><a:t>{}</a:t></a:r>"#,
        style.size * 100,
        if style.bold { 1 } else { 0 },
        style.color,
        xml_escape(text)
    )
}

fn paragraph(text: &str, style: &TextStyle) -> String {
    let align = if style.centered { r#" algn="ctr""# } else { "" };
    format!(r#"<a:p><a:pPr{}/>{}</a:p>"#, align, run(text, style))
}

fn bullet(text: &str, style: &TextStyle) -> String {
    format!(
        r#"<a:p><a:pPr marL="285750" indent="-285750"><a:buFont typeface="Arial"/><a:buChar char="&#8226;"/></a:pPr>{}</a:p>"#,
        run(text, style)
    )
}

/// A positioned text box; `paragraphs` is already rendered DrawingML
fn text_box(id: u32, name: &str, rect: (f64, f64, f64, f64), paragraphs: &str) -> String {
    let (x, y, w, h) = rect;
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:normAutofit/></a:bodyPr><a:lstStyle/>{}</p:txBody></p:sp>"#,
        id,
        name,
        emu(x),
        emu(y),
        emu(w),
        emu(h),
        paragraphs
    )
}

fn slide(background: Option<&str>, shapes: &str) -> String {
    let bg = background
        .map(|color| {
            format!(
                r#"<p:bg><p:bgPr><a:solidFill><a:srgbClr val="{}"/></a:solidFill><a:effectLst/></p:bgPr></p:bg>"#,
                color
            )
        })
        .unwrap_or_default();
    format!(
        r#"{}<p:sld xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"><p:cSld>{}<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        XML_HEADER, A_NS, R_NS, P_NS, bg, shapes
    )
}

fn cover_slide(title: &str, subtitle: Option<&str>) -> String {
    let title_style = TextStyle {
        size: 44,
        bold: true,
        color: "FFFFFF",
        centered: true,
    };
    let mut shapes = text_box(2, "Title", (0.5, 1.5, 9.0, 2.0), &paragraph(title, &title_style));
    if let Some(subtitle) = subtitle {
        let style = TextStyle {
            size: 20,
            bold: false,
            color: "FFFFFF",
            centered: true,
        };
        shapes.push_str(&text_box(
            3,
            "Subtitle",
            (0.5, 3.6, 9.0, 0.8),
            &paragraph(subtitle, &style),
        ));
    }
    slide(Some(BRAND_COLOR), &shapes)
}

fn content_slide(content: &SlideContent) -> String {
    let title_style = TextStyle {
        size: 24,
        bold: true,
        color: BRAND_COLOR,
        centered: false,
    };
    let body_style = TextStyle {
        size: 16,
        bold: false,
        color: "333333",
        centered: false,
    };
    let mut shapes = text_box(
        2,
        "Title",
        (0.5, 0.4, 8.5, 0.9),
        &paragraph(&content.title, &title_style),
    );
    if !content.bullets.is_empty() {
        let body: String = content
            .bullets
            .iter()
            .map(|b| bullet(b, &body_style))
            .collect();
        shapes.push_str(&text_box(3, "Body", (0.5, 1.4, 8.5, 3.4), &body));
    }
    if let Some(footer) = &content.footer {
        let style = TextStyle {
            size: 10,
            bold: false,
            color: "888888",
            centered: false,
        };
        shapes.push_str(&text_box(
            4,
            "Footer",
            (0.5, 5.0, 8.5, 0.4),
            &paragraph(footer, &style),
        ));
    }
    slide(None, &shapes)
}

fn rels(entries: &[(&str, &str, &str)]) -> String {
    let body: String = entries
        .iter()
        .map(|(id, kind, target)| {
            format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
                id, kind, target
            )
        })
        .collect();
    format!(
        r#"{}<Relationships xmlns="{}">{}</Relationships>"#,
        XML_HEADER, REL_NS, body
    )
}

fn presentation(count: usize) -> String {
    let ids: String = (0..count)
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 2))
        .collect();
    format!(
        r#"{}<p:presentation xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{}</p:sldIdLst><p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
        XML_HEADER, A_NS, R_NS, P_NS, ids, SLIDE_CX, SLIDE_CY
    )
}

fn presentation_rels(count: usize) -> String {
    let master_kind = format!("{}/slideMaster", REL_TYPE);
    let slide_kind = format!("{}/slide", REL_TYPE);
    let theme_kind = format!("{}/theme", REL_TYPE);
    let slide_ids: Vec<(String, String)> = (0..count)
        .map(|i| (format!("rId{}", i + 2), format!("slides/slide{}.xml", i + 1)))
        .collect();
    let theme_id = format!("rId{}", count + 2);

    let mut entries: Vec<(&str, &str, &str)> =
        vec![("rId1", master_kind.as_str(), "slideMasters/slideMaster1.xml")];
    for (id, target) in &slide_ids {
        entries.push((id.as_str(), slide_kind.as_str(), target.as_str()));
    }
    entries.push((theme_id.as_str(), theme_kind.as_str(), "theme/theme1.xml"));
    rels(&entries)
}

fn content_types(count: usize) -> String {
    let slides: String = (1..=count)
        .map(|n| {
            format!(
                r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
                n
            )
        })
        .collect();
    format!(
        r#"{}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>{}</Types>"#,
        XML_HEADER, slides
    )
}

const EMPTY_TREE: &str = r#"<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree>"#;

fn slide_master() -> String {
    format!(
        r#"{}<p:sldMaster xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"><p:cSld>{}</p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#,
        XML_HEADER, A_NS, R_NS, P_NS, EMPTY_TREE
    )
}

fn slide_layout() -> String {
    format!(
        r#"{}<p:sldLayout xmlns:a="{}" xmlns:r="{}" xmlns:p="{}" type="blank" preserve="1"><p:cSld name="Blank">{}</p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        XML_HEADER, A_NS, R_NS, P_NS, EMPTY_TREE
    )
}

fn theme() -> String {
    let color = |name: &str, value: &str| format!(r#"<a:{n}><a:srgbClr val="{v}"/></a:{n}>"#, n = name, v = value);
    let colors = [
        ("dk1", "000000"),
        ("lt1", "FFFFFF"),
        ("dk2", "333333"),
        ("lt2", "EEEEEE"),
        ("accent1", BRAND_COLOR),
        ("accent2", "99A288"),
        ("accent3", "666666"),
        ("accent4", "BFBFBF"),
        ("accent5", "4F81BD"),
        ("accent6", "F79646"),
        ("hlink", "0563C1"),
        ("folHlink", "954F72"),
    ]
    .iter()
    .map(|&(n, v)| color(n, v))
    .collect::<String>();
    let fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#.repeat(3);
    let line = r#"<a:ln w="9525"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#.repeat(3);
    let effect = r#"<a:effectStyle><a:effectLst/></a:effectStyle>"#.repeat(3);
    let font = r#"<a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/>"#;
    format!(
        r#"{}<a:theme xmlns:a="{}" name="OPCO"><a:themeElements><a:clrScheme name="OPCO">{}</a:clrScheme><a:fontScheme name="OPCO"><a:majorFont>{f}</a:majorFont><a:minorFont>{f}</a:minorFont></a:fontScheme><a:fmtScheme name="OPCO"><a:fillStyleLst>{fill}</a:fillStyleLst><a:lnStyleLst>{line}</a:lnStyleLst><a:effectStyleLst>{effect}</a:effectStyleLst><a:bgFillStyleLst>{fill}</a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#,
        XML_HEADER,
        A_NS,
        colors,
        f = font,
        fill = fill,
        line = line,
        effect = effect
    )
}
